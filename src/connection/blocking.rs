use std::io::{Read, Write};
use std::net::TcpStream;

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::command::{MetaCommand, MetaResult};
use crate::connection::{auth_payload, ConnectionState, Credentials};
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::parser::{decode_response, Decoded};

const READ_CHUNK: usize = 4096;

/// A single blocking TCP connection to one endpoint.
///
/// Not connected until the first [`execute`](Self::execute) or
/// [`flush_all`](Self::flush_all) call, matching
/// `connection.py`'s `Connection.__init__` → `_connect()` eagerness being
/// replaced here by lazy connect-on-first-use, as spec's lifecycle section
/// requires ("created lazily on first acquisition").
pub struct BlockingConnection {
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    state: ConnectionState,
    stream: Option<TcpStream>,
    read_buf: BytesMut,
}

impl BlockingConnection {
    pub fn new(endpoint: Endpoint, credentials: Option<Credentials>) -> Self {
        BlockingConnection {
            endpoint,
            credentials,
            state: ConnectionState::New,
            stream: None,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_broken(&self) -> bool {
        self.state == ConnectionState::Broken
    }

    fn connect(&mut self) -> Result<(), Error> {
        self.state = ConnectionState::Connecting;
        debug!(endpoint = %self.endpoint, "connecting");
        let stream = TcpStream::connect(self.endpoint.to_socket_string())?;
        stream.set_nodelay(true).ok();
        self.stream = Some(stream);
        self.read_buf.clear();
        if let Some(creds) = self.credentials.clone() {
            self.authenticate(&creds)?;
        }
        self.state = ConnectionState::Ready;
        Ok(())
    }

    fn authenticate(&mut self, creds: &Credentials) -> Result<(), Error> {
        let payload = auth_payload(creds);
        let mut header = BytesMut::with_capacity(32);
        header.extend_from_slice(b"set auth x 0 ");
        header.extend_from_slice(payload.len().to_string().as_bytes());
        header.extend_from_slice(b"\r\n");
        self.write_all(&header)?;
        self.write_all(&payload)?;
        self.write_all(b"\r\n")?;
        let line = self.read_line()?;
        if line != b"STORED" {
            return Err(Error::Auth(String::from_utf8_lossy(&line).to_string()));
        }
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.state != ConnectionState::Ready {
            self.connect()?;
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let stream = self.stream.as_mut().expect("connected before write");
        stream.write_all(bytes)?;
        Ok(())
    }

    /// Read one CRLF-terminated line, with the CRLF stripped. Used only for
    /// the legacy auth/flush_all ascii replies.
    fn read_line(&mut self) -> Result<Vec<u8>, Error> {
        loop {
            if let Some(pos) = find_crlf(&self.read_buf) {
                let line = self.read_buf.split_to(pos);
                let _ = self.read_buf.split_to(2); // drop the CRLF itself
                return Ok(line.to_vec());
            }
            self.read_more()?;
        }
    }

    fn read_more(&mut self) -> Result<(), Error> {
        let stream = self.stream.as_mut().expect("connected before read");
        let mut tmp = [0u8; READ_CHUNK];
        let n = stream.read(&mut tmp)?;
        if n == 0 {
            return Err(Error::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )));
        }
        self.read_buf.extend_from_slice(&tmp[..n]);
        Ok(())
    }

    fn read_meta_result(&mut self) -> Result<MetaResult, Error> {
        loop {
            match decode_response(&self.read_buf)? {
                Decoded::Complete { consumed, result } => {
                    let _ = self.read_buf.split_to(consumed);
                    return Ok(result);
                }
                Decoded::Incomplete => self.read_more()?,
            }
        }
    }

    fn execute_once(&mut self, command: &MetaCommand) -> Result<MetaResult, Error> {
        let mut buf = BytesMut::with_capacity(64);
        command.encode(&mut buf);
        self.write_all(&buf)?;
        self.read_meta_result()
    }

    /// Serialise `command`, send it, and decode exactly one response.
    ///
    /// On a transport-class failure the connection reconnects and replays
    /// the same command exactly once; a second failure surfaces as
    /// [`Error::Transport`] and leaves the connection `Broken`.
    pub fn execute(&mut self, command: &MetaCommand) -> Result<MetaResult, Error> {
        self.ensure_connected()?;
        match self.execute_once(command) {
            Ok(result) => Ok(result),
            Err(Error::Transport(e)) => {
                warn!(endpoint = %self.endpoint, error = %e, "connection broken, reconnecting");
                self.state = ConnectionState::Broken;
                self.connect()?;
                self.execute_once(command).map_err(|e| {
                    self.state = ConnectionState::Broken;
                    e
                })
            }
            Err(other) => {
                self.state = ConnectionState::Broken;
                Err(other)
            }
        }
    }

    pub fn flush_all(&mut self, delay: u32) -> Result<(), Error> {
        self.ensure_connected()?;
        let line = if delay > 0 {
            format!("flush_all {delay}\r\n")
        } else {
            "flush_all\r\n".to_string()
        };
        self.write_all(line.as_bytes())?;
        let response = self.read_line()?;
        if response != b"OK" {
            self.state = ConnectionState::Broken;
            return Err(Error::Protocol(String::from_utf8_lossy(&response).to_string()));
        }
        Ok(())
    }

    /// Strip the `VERSION ` prefix from the legacy ascii `version` reply.
    pub fn version(&mut self) -> Result<String, Error> {
        self.ensure_connected()?;
        self.write_all(b"version\r\n")?;
        let line = self.read_line()?;
        let line = String::from_utf8_lossy(&line).into_owned();
        match line.strip_prefix("VERSION ") {
            Some(version) => Ok(version.to_string()),
            None => Err(Error::Protocol(format!("invalid response for `version`: {line}"))),
        }
    }

    pub fn close(&mut self) {
        self.stream = None;
        self.state = ConnectionState::New;
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_crlf_locates_terminator() {
        assert_eq!(find_crlf(b"STORED\r\n"), Some(6));
        assert_eq!(find_crlf(b"no terminator here"), None);
    }
}
