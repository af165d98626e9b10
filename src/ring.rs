//! Consistent-hash ring mapping a key to one of a fixed set of endpoints.
//!
//! Grounded in `src/ring.rs`: the same scheme (160 virtual nodes per
//! endpoint, `blake3`-hashed point names truncated to a 32-bit ring
//! position, `crc32fast` for key hashing, binary search with wraparound to
//! index 0). This crate documents the 32-bit ring explicitly as its
//! interop surface rather than the 128-bit space a hash like MD5 would
//! give — matching the teacher's existing choice instead of introducing a
//! new hash function for a spec that leaves this as "pick one and document
//! it".
//!
//! One correction relative to the teacher: the continuum here is sorted by
//! ring position after construction. A `binary_search_by` over an unsorted
//! continuum does not reliably find the nearest point, so the invariant the
//! search depends on (ascending `value`) is established explicitly instead
//! of assumed.

use crate::endpoint::Endpoint;

const POINTS_PER_SERVER: usize = 160;

struct Entry {
    value: u32,
    endpoint_index: usize,
}

/// Immutable once built. Maps a key deterministically to exactly one
/// endpoint index via consistent hashing.
pub struct Ring {
    endpoints: Vec<Endpoint>,
    continuum: Vec<Entry>,
}

impl Ring {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        let continuum = build_continuum(&endpoints);
        Ring {
            endpoints,
            continuum,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Deterministically resolve `key` to one of the constructed endpoints.
    ///
    /// Keys are hashed as raw bytes; a caller holding a `&str` key passes
    /// `key.as_bytes()`, which matches spec's "hash invalid UTF-8 as raw
    /// bytes" escape hatch trivially since no decoding happens here at all.
    pub fn endpoint_for(&self, key: &[u8]) -> &Endpoint {
        let index = self.endpoint_index_for(key);
        &self.endpoints[index]
    }

    fn endpoint_index_for(&self, key: &[u8]) -> usize {
        if self.endpoints.len() == 1 {
            return 0;
        }
        let hash = hash_key(key);
        match self.continuum.binary_search_by(|e| e.value.cmp(&hash)) {
            Ok(index) => self.continuum[index].endpoint_index,
            Err(index) if index == self.continuum.len() => self.continuum[0].endpoint_index,
            Err(index) => self.continuum[index].endpoint_index,
        }
    }
}

fn hash_key(key: &[u8]) -> u32 {
    crc32fast::hash(key)
}

fn build_continuum(endpoints: &[Endpoint]) -> Vec<Entry> {
    let mut continuum = Vec::with_capacity(endpoints.len() * POINTS_PER_SERVER);

    for (endpoint_index, endpoint) in endpoints.iter().enumerate() {
        for point in 0..POINTS_PER_SERVER {
            let name = format!("{}:{}", endpoint, point);
            let hash = blake3::hash(name.as_bytes()).to_string();
            let value = u32::from_str_radix(&hash[0..7], 16).expect("blake3 hex is well-formed");
            continuum.push(Entry {
                value,
                endpoint_index,
            });
        }
    }

    continuum.sort_by_key(|e| e.value);
    continuum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: u16) -> Vec<Endpoint> {
        (0..n).map(|i| Endpoint::new("host", 10000 + i)).collect()
    }

    #[test]
    fn single_endpoint_always_wins() {
        let ring = Ring::new(endpoints(1));
        assert_eq!(ring.endpoint_for(b"any-key"), &ring.endpoints()[0]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let ring = Ring::new(endpoints(5));
        let first = ring.endpoint_for(b"some-key").clone();
        let second = ring.endpoint_for(b"some-key").clone();
        assert_eq!(first, second);
    }

    #[test]
    fn continuum_is_sorted_ascending() {
        let ring = Ring::new(endpoints(3));
        let values: Vec<u32> = ring.continuum.iter().map(|e| e.value).collect();
        let mut sorted = values.clone();
        sorted.sort();
        assert_eq!(values, sorted);
    }

    #[test]
    fn distribution_uses_every_endpoint() {
        let ring = Ring::new(endpoints(4));
        let mut hit = [false; 4];
        for i in 0..2000 {
            let key = format!("key-{i}");
            let index = ring.endpoint_index_for(key.as_bytes());
            hit[index] = true;
        }
        assert!(hit.iter().all(|&h| h), "every endpoint should receive keys");
    }
}
