//! Pluggable value codec: the `marshal`/`unmarshal` pair bound to a
//! per-item client flag, plus the reference codec this crate ships with.
//!
//! The four reserved tags and their wire forms come straight from the
//! original implementation's `serialize` module (exercised by
//! `tests/test_serialize.py` in `examples/original_source/`): integers as
//! ASCII decimal, raw bytes as an identity mapping, text as UTF-8, and a
//! structured catch-all — `pickle` there, `serde_json` here, since the
//! tag is deliberately opaque per deployment.

use crate::error::DecodeError;

/// Client flag tag for raw opaque bytes.
pub const FLAG_BYTES: u32 = 0;
/// Client flag tag for UTF-8 text.
pub const FLAG_STR: u32 = 1;
/// Client flag tag for a signed 64-bit integer.
pub const FLAG_INT: u32 = 2;
/// Client flag tag for the structured-value catch-all.
pub const FLAG_STRUCTURED: u32 = 3;

/// Converts between an in-memory value and the `(bytes, flag)` pair stored
/// alongside a key. Implementations must be stateless and safe under
/// concurrent use — the same codec instance is shared across every
/// connection in a [`crate::client::Client`]/[`crate::client::BlockingClient`].
pub trait ValueCodec<T>: Send + Sync {
    fn marshal(&self, value: &T) -> (Vec<u8>, u32);
    fn unmarshal(&self, bytes: &[u8], flag: u32) -> Result<T, DecodeError>;
}

/// The reference codec: raw bytes, UTF-8 text, signed integers, and a
/// `serde_json` structured fallback, selected by `T`'s own shape via the
/// concrete impls below rather than runtime dispatch.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCodec;

impl ValueCodec<Vec<u8>> for DefaultCodec {
    fn marshal(&self, value: &Vec<u8>) -> (Vec<u8>, u32) {
        (value.clone(), FLAG_BYTES)
    }

    fn unmarshal(&self, bytes: &[u8], flag: u32) -> Result<Vec<u8>, DecodeError> {
        match flag {
            FLAG_BYTES => Ok(bytes.to_vec()),
            other => Err(DecodeError::UnknownFlag(other)),
        }
    }
}

impl ValueCodec<String> for DefaultCodec {
    fn marshal(&self, value: &String) -> (Vec<u8>, u32) {
        (value.as_bytes().to_vec(), FLAG_STR)
    }

    fn unmarshal(&self, bytes: &[u8], flag: u32) -> Result<String, DecodeError> {
        match flag {
            FLAG_STR => {
                std::str::from_utf8(bytes).map(str::to_owned).map_err(|_| DecodeError::InvalidUtf8)
            }
            other => Err(DecodeError::UnknownFlag(other)),
        }
    }
}

impl ValueCodec<i64> for DefaultCodec {
    fn marshal(&self, value: &i64) -> (Vec<u8>, u32) {
        let mut printed = itoa::Buffer::new();
        (printed.format(*value).as_bytes().to_vec(), FLAG_INT)
    }

    fn unmarshal(&self, bytes: &[u8], flag: u32) -> Result<i64, DecodeError> {
        match flag {
            FLAG_INT => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(DecodeError::InvalidInt),
            other => Err(DecodeError::UnknownFlag(other)),
        }
    }
}

impl ValueCodec<u64> for DefaultCodec {
    fn marshal(&self, value: &u64) -> (Vec<u8>, u32) {
        let mut printed = itoa::Buffer::new();
        (printed.format(*value).as_bytes().to_vec(), FLAG_INT)
    }

    fn unmarshal(&self, bytes: &[u8], flag: u32) -> Result<u64, DecodeError> {
        match flag {
            FLAG_INT => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or(DecodeError::InvalidInt),
            other => Err(DecodeError::UnknownFlag(other)),
        }
    }
}

/// A structured value serialized through `serde_json` under
/// `FLAG_STRUCTURED`. Wrap a caller type in this when it doesn't already
/// have a dedicated [`ValueCodec`] impl.
#[derive(Debug, Clone, PartialEq)]
pub struct Structured<T>(pub T);

impl<T> ValueCodec<Structured<T>> for DefaultCodec
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    fn marshal(&self, value: &Structured<T>) -> (Vec<u8>, u32) {
        let bytes = serde_json::to_vec(&value.0).expect("structured values must be serializable");
        (bytes, FLAG_STRUCTURED)
    }

    fn unmarshal(&self, bytes: &[u8], flag: u32) -> Result<Structured<T>, DecodeError> {
        match flag {
            FLAG_STRUCTURED => serde_json::from_slice(bytes)
                .map(Structured)
                .map_err(|e| DecodeError::Structured(e.to_string())),
            other => Err(DecodeError::UnknownFlag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() {
        let codec = DefaultCodec;
        let (bytes, flag) = ValueCodec::<Vec<u8>>::marshal(&codec, &vec![1, 2, 3]);
        assert_eq!(flag, FLAG_BYTES);
        assert_eq!(
            ValueCodec::<Vec<u8>>::unmarshal(&codec, &bytes, flag).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn str_round_trip() {
        let codec = DefaultCodec;
        let (bytes, flag) = ValueCodec::<String>::marshal(&codec, &"hello".to_string());
        assert_eq!(flag, FLAG_STR);
        assert_eq!(
            ValueCodec::<String>::unmarshal(&codec, &bytes, flag).unwrap(),
            "hello"
        );
    }

    #[test]
    fn int_round_trip() {
        let codec = DefaultCodec;
        let (bytes, flag) = ValueCodec::<i64>::marshal(&codec, &-42);
        assert_eq!(flag, FLAG_INT);
        assert_eq!(ValueCodec::<i64>::unmarshal(&codec, &bytes, flag).unwrap(), -42);
    }

    #[test]
    fn unmarshal_rejects_unknown_flag() {
        let codec = DefaultCodec;
        let err = ValueCodec::<Vec<u8>>::unmarshal(&codec, b"x", 99).unwrap_err();
        assert_eq!(err, DecodeError::UnknownFlag(99));
    }

    #[test]
    fn unmarshal_rejects_invalid_utf8_for_flag_str() {
        let codec = DefaultCodec;
        let err = ValueCodec::<String>::unmarshal(&codec, &[0xff, 0xfe], FLAG_STR).unwrap_err();
        assert_eq!(err, DecodeError::InvalidUtf8);
    }

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn structured_round_trip() {
        let codec = DefaultCodec;
        let value = Structured(Point { x: 1, y: 2 });
        let (bytes, flag) = ValueCodec::marshal(&codec, &value);
        assert_eq!(flag, FLAG_STRUCTURED);
        let decoded: Structured<Point> = ValueCodec::unmarshal(&codec, &bytes, flag).unwrap();
        assert_eq!(decoded, value);
    }
}
