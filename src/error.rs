/// Failure taxonomy for the meta-protocol client.
///
/// Transport hiccups are absorbed once via transparent reconnect + a single
/// retry inside the connection layer (see [`crate::connection`]); everything
/// that reaches a caller here is meant to be surfaced unchanged, not retried
/// again by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// TCP reset/broken pipe that survived one automatic reconnect attempt.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// `set auth ...` did not reply `STORED`.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Malformed header, missing `datalen` on a `VA` response, a
    /// `CLIENT_ERROR` reply, or a truncated body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The pool's idle queue did not yield a connection within the
    /// configured timeout. Safe to retry.
    #[error("timed out waiting for a pooled connection")]
    PoolTimeout,

    /// The value codec rejected a `(bytes, flag)` pair.
    #[error("failed to decode value: {0}")]
    Decode(#[from] DecodeError),

    /// `ms` returned an `rc` other than `HD`/`NS`.
    #[error("store failed for `{op}`: {rc}")]
    Store {
        /// The high-level operation that issued the `ms`.
        op: &'static str,
        /// The raw response code memcached returned.
        rc: String,
    },

    /// `ma` targeted a key that does not exist and no initial value was
    /// supplied.
    #[error("key not found")]
    NotFound,

    /// `ma` returned an `rc` other than `VA`/`NF`.
    #[error("arithmetic failed for `{op}`: {rc}")]
    Arithmetic {
        /// `incr` or `decr`.
        op: &'static str,
        /// The raw response code memcached returned.
        rc: String,
    },
}

/// Why [`crate::value::ValueCodec::unmarshal`] could not reconstruct a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The flag tag did not match any encoding this codec understands.
    #[error("unrecognized client flag: {0}")]
    UnknownFlag(u32),
    /// The bytes were not valid UTF-8 for a `FLAG_STR` value.
    #[error("invalid utf-8 in FLAG_STR value")]
    InvalidUtf8,
    /// The bytes were not a valid ASCII decimal for a `FLAG_INT` value.
    #[error("invalid integer in FLAG_INT value")]
    InvalidInt,
    /// `serde_json` failed to deserialize a `FLAG_STRUCTURED` value.
    #[error("failed to decode structured value: {0}")]
    Structured(String),
}
