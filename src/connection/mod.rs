//! One TCP link to a single endpoint: write a framed request, read a framed
//! response, reconnect transparently on disconnect, authenticate once per
//! physical connection.
//!
//! Split into [`blocking`] (`std::net`, OS threads) and [`cooperative`]
//! (`tokio`) implementations sharing the same state machine and the same
//! meta-codec calls — grounded in `examples/original_source/memcache/
//! connection.py`'s `Connection` and `async_connection.py`'s
//! `AsyncConnection`, which differ only in their I/O substrate.

pub mod blocking;
pub mod cooperative;

/// Credentials for the optional `set auth x 0 <len>` handshake.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// `NEW → CONNECTING → READY → BROKEN → CONNECTING …`. Only `Ready` accepts
/// commands; a failed send or malformed parse moves a connection to
/// `Broken`, from which the next command attempts one reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Ready,
    Broken,
}

pub(crate) fn auth_payload(creds: &Credentials) -> Vec<u8> {
    let mut payload = Vec::with_capacity(creds.username.len() + creds.password.len() + 1);
    payload.extend_from_slice(creds.username.as_bytes());
    payload.push(b' ');
    payload.extend_from_slice(creds.password.as_bytes());
    payload
}
