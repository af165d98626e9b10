//! Cooperative (`tokio`) high-level client: `Ring` over per-endpoint
//! `CooperativePool`s.
//!
//! Grounded operation-by-operation in `examples/original_source/memcache/
//! experiment/async_meta_client.py`'s `AsyncMetaClient`, the async mirror
//! of `meta_client.py` — same flag construction and status mapping, every
//! I/O and pool-acquisition point suspended instead of blocked.

use std::collections::HashMap;

use crate::client::{
    build_append_command, build_arithmetic_command, build_cas_command, build_delete_command,
    build_gat_command, build_get_command, build_invalidate_command, build_store_command,
    build_touch_command, map_arithmetic_result, map_store_bool, parse_get_result, validate_key,
    ClientOptions, GetOptions, GetResult,
};
use crate::command::MetaCommand;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::pool::cooperative::CooperativePool;
use crate::ring::Ring;
use crate::value::{DefaultCodec, ValueCodec};

/// The cooperative execution surface: every operation suspends rather than
/// blocks, at TCP connect, each framed read/write, and pool acquisition.
/// Matches `examples/Shopify-async-memcached`'s unqualified `Client` naming
/// for its primary surface.
pub struct Client<C = DefaultCodec> {
    ring: Ring,
    pools: HashMap<Endpoint, CooperativePool>,
    codec: C,
}

impl Client<DefaultCodec> {
    pub fn new(endpoints: Vec<Endpoint>, options: ClientOptions) -> Self {
        Self::with_codec(endpoints, options, DefaultCodec)
    }
}

impl<C> Client<C> {
    pub fn with_codec(endpoints: Vec<Endpoint>, options: ClientOptions, codec: C) -> Self {
        let pools = endpoints
            .iter()
            .map(|endpoint| {
                let pool = CooperativePool::new(
                    endpoint.clone(),
                    options.credentials.clone(),
                    options.pool_size,
                    options.pool_timeout,
                );
                (endpoint.clone(), pool)
            })
            .collect();
        let ring = Ring::new(endpoints);
        Client { ring, pools, codec }
    }

    fn pool_for(&self, key: &[u8]) -> &CooperativePool {
        let endpoint = self.ring.endpoint_for(key);
        self.pools.get(endpoint).expect("every ring endpoint has a pool")
    }

    pub async fn execute_meta_command(&self, command: &MetaCommand) -> Result<crate::command::MetaResult, Error> {
        let mut pooled = self.pool_for(&command.key).acquire().await?;
        pooled.execute(command).await
    }

    pub async fn set<T>(&self, key: impl AsRef<[u8]>, value: &T, expire: Option<i64>) -> Result<(), Error>
    where
        C: ValueCodec<T>,
    {
        let key = key.as_ref();
        validate_key(key)?;
        let (raw, flags) = self.codec.marshal(value);
        let command = build_store_command(key, raw, flags, expire, None);
        let result = self.execute_meta_command(&command).await?;
        if result.rc == "HD" {
            Ok(())
        } else {
            Err(Error::Store {
                op: "set",
                rc: result.rc,
            })
        }
    }

    pub async fn add<T>(&self, key: impl AsRef<[u8]>, value: &T, expire: Option<i64>) -> Result<bool, Error>
    where
        C: ValueCodec<T>,
    {
        let key = key.as_ref();
        validate_key(key)?;
        let (raw, flags) = self.codec.marshal(value);
        let command = build_store_command(key, raw, flags, expire, Some("ME"));
        let result = self.execute_meta_command(&command).await?;
        map_store_bool("add", &result.rc, &["NS"])
    }

    pub async fn replace<T>(&self, key: impl AsRef<[u8]>, value: &T, expire: Option<i64>) -> Result<bool, Error>
    where
        C: ValueCodec<T>,
    {
        let key = key.as_ref();
        validate_key(key)?;
        let (raw, flags) = self.codec.marshal(value);
        let command = build_store_command(key, raw, flags, expire, Some("MR"));
        let result = self.execute_meta_command(&command).await?;
        map_store_bool("replace", &result.rc, &["NS"])
    }

    pub async fn append<T>(&self, key: impl AsRef<[u8]>, value: &T, vivify_ttl: Option<i64>) -> Result<bool, Error>
    where
        C: ValueCodec<T>,
    {
        let key = key.as_ref();
        validate_key(key)?;
        let (raw, flags) = self.codec.marshal(value);
        let command = build_append_command(key, raw, flags, vivify_ttl, false);
        let result = self.execute_meta_command(&command).await?;
        map_store_bool("append", &result.rc, &["NS"])
    }

    pub async fn prepend<T>(&self, key: impl AsRef<[u8]>, value: &T, vivify_ttl: Option<i64>) -> Result<bool, Error>
    where
        C: ValueCodec<T>,
    {
        let key = key.as_ref();
        validate_key(key)?;
        let (raw, flags) = self.codec.marshal(value);
        let command = build_append_command(key, raw, flags, vivify_ttl, true);
        let result = self.execute_meta_command(&command).await?;
        map_store_bool("prepend", &result.rc, &["NS"])
    }

    pub async fn cas<T>(
        &self,
        key: impl AsRef<[u8]>,
        value: &T,
        cas_token: u64,
        expire: Option<i64>,
    ) -> Result<bool, Error>
    where
        C: ValueCodec<T>,
    {
        let key = key.as_ref();
        validate_key(key)?;
        let (raw, flags) = self.codec.marshal(value);
        let command = build_cas_command(key, raw, flags, cas_token, expire);
        let result = self.execute_meta_command(&command).await?;
        map_store_bool("cas", &result.rc, &["EX", "NF"])
    }

    pub async fn get<T>(&self, key: impl AsRef<[u8]>, opts: GetOptions) -> Result<Option<GetResult<T>>, Error>
    where
        C: ValueCodec<T>,
    {
        let key = key.as_ref();
        validate_key(key)?;
        let command = build_get_command(key, &opts);
        let result = self.execute_meta_command(&command).await?;
        parse_get_result(&result.rc, &result.flags, result.value.as_deref(), &opts, &self.codec)
    }

    pub async fn gat<T>(&self, key: impl AsRef<[u8]>, expire: i64) -> Result<Option<T>, Error>
    where
        C: ValueCodec<T>,
    {
        let key = key.as_ref();
        validate_key(key)?;
        let command = build_gat_command(key, expire);
        let result = self.execute_meta_command(&command).await?;
        match result.value {
            None => Ok(None),
            Some(bytes) => {
                let client_flags = result.flag(b'f').map(crate::parser::parse_flag_u32).transpose()?.unwrap_or(0);
                Ok(Some(self.codec.unmarshal(&bytes, client_flags)?))
            }
        }
    }

    pub async fn touch(&self, key: impl AsRef<[u8]>, expire: i64) -> Result<bool, Error> {
        let key = key.as_ref();
        validate_key(key)?;
        let command = build_touch_command(key, expire);
        let result = self.execute_meta_command(&command).await?;
        Ok(result.rc != "EN")
    }

    /// One round-trip per key; missing keys are omitted from the map.
    pub async fn get_many<T>(
        &self,
        keys: impl IntoIterator<Item = impl AsRef<[u8]>>,
    ) -> Result<HashMap<String, GetResult<T>>, Error>
    where
        C: ValueCodec<T>,
    {
        let mut out = HashMap::new();
        for key in keys {
            let key_bytes = key.as_ref();
            if let Some(result) = self.get::<T>(key_bytes, GetOptions::default()).await? {
                let key_str = String::from_utf8_lossy(key_bytes).into_owned();
                out.insert(key_str, result);
            }
        }
        Ok(out)
    }

    pub async fn delete(&self, key: impl AsRef<[u8]>, cas_token: Option<u64>) -> Result<bool, Error> {
        let key = key.as_ref();
        validate_key(key)?;
        let command = build_delete_command(key, cas_token);
        let result = self.execute_meta_command(&command).await?;
        map_store_bool("delete", &result.rc, &["NF", "EX"])
    }

    pub async fn invalidate(
        &self,
        key: impl AsRef<[u8]>,
        stale_ttl: Option<i64>,
        cas_token: Option<u64>,
    ) -> Result<bool, Error> {
        let key = key.as_ref();
        validate_key(key)?;
        let command = build_invalidate_command(key, stale_ttl, cas_token);
        let result = self.execute_meta_command(&command).await?;
        map_store_bool("invalidate", &result.rc, &["NF", "EX"])
    }

    pub async fn incr(
        &self,
        key: impl AsRef<[u8]>,
        delta: i64,
        initial: Option<u64>,
        initial_ttl: Option<i64>,
        update_ttl: Option<i64>,
    ) -> Result<u64, Error> {
        let key = key.as_ref();
        validate_key(key)?;
        let command = build_arithmetic_command(key, delta, initial, initial_ttl, update_ttl, false);
        let result = self.execute_meta_command(&command).await?;
        map_arithmetic_result("incr", &result.rc, result.value.as_deref())
    }

    pub async fn decr(
        &self,
        key: impl AsRef<[u8]>,
        delta: i64,
        initial: Option<u64>,
        initial_ttl: Option<i64>,
        update_ttl: Option<i64>,
    ) -> Result<u64, Error> {
        let key = key.as_ref();
        validate_key(key)?;
        let command = build_arithmetic_command(key, delta, initial, initial_ttl, update_ttl, true);
        let result = self.execute_meta_command(&command).await?;
        map_arithmetic_result("decr", &result.rc, result.value.as_deref())
    }

    /// Invokes `flush_all` on every endpoint's pool via one borrowed
    /// connection each.
    pub async fn flush_all(&self, delay: u32) -> Result<(), Error> {
        for pool in self.pools.values() {
            let mut pooled = pool.acquire().await?;
            pooled.flush_all(delay).await?;
        }
        Ok(())
    }

    /// Strip the `VERSION ` prefix from the legacy ascii `version` reply.
    pub async fn version(&self, endpoint: &Endpoint) -> Result<String, Error> {
        let pool = self
            .pools
            .get(endpoint)
            .ok_or_else(|| Error::Protocol(format!("no pool for endpoint {endpoint}")))?;
        let mut pooled = pool.acquire().await?;
        pooled.version().await
    }
}
