use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::command::{MetaCommand, MetaResult};
use crate::connection::{auth_payload, ConnectionState, Credentials};
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::parser::{decode_response, Decoded};

const READ_CHUNK: usize = 4096;

/// The `tokio` mirror of [`crate::connection::blocking::BlockingConnection`].
/// Every suspension point — connect, each framed read/write, and (at the
/// pool layer) acquisition — is a real `.await`, so cancellation at any of
/// them is safe to observe: a cancelled future simply never completes the
/// state transition to `Ready`, leaving the connection `Broken` or `New`.
pub struct CooperativeConnection {
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    state: ConnectionState,
    stream: Option<TcpStream>,
    read_buf: BytesMut,
}

impl CooperativeConnection {
    pub fn new(endpoint: Endpoint, credentials: Option<Credentials>) -> Self {
        CooperativeConnection {
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

    async fn connect(&mut self) -> Result<(), Error> {
        self.state = ConnectionState::Connecting;
        debug!(endpoint = %self.endpoint, "connecting");
        let stream = TcpStream::connect(self.endpoint.to_socket_string()).await?;
        stream.set_nodelay(true).ok();
        self.stream = Some(stream);
        self.read_buf.clear();
        if let Some(creds) = self.credentials.clone() {
            self.authenticate(&creds).await?;
        }
        self.state = ConnectionState::Ready;
        Ok(())
    }

    async fn authenticate(&mut self, creds: &Credentials) -> Result<(), Error> {
        let payload = auth_payload(creds);
        let mut header = BytesMut::with_capacity(32);
        header.extend_from_slice(b"set auth x 0 ");
        header.extend_from_slice(payload.len().to_string().as_bytes());
        header.extend_from_slice(b"\r\n");
        self.write_all(&header).await?;
        self.write_all(&payload).await?;
        self.write_all(b"\r\n").await?;
        let line = self.read_line().await?;
        if line != b"STORED" {
            return Err(Error::Auth(String::from_utf8_lossy(&line).to_string()));
        }
        Ok(())
    }

    async fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.state != ConnectionState::Ready {
            self.connect().await?;
        }
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let stream = self.stream.as_mut().expect("connected before write");
        stream.write_all(bytes).await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, Error> {
        loop {
            if let Some(pos) = find_crlf(&self.read_buf) {
                let line = self.read_buf.split_to(pos);
                let _ = self.read_buf.split_to(2);
                return Ok(line.to_vec());
            }
            self.read_more().await?;
        }
    }

    async fn read_more(&mut self) -> Result<(), Error> {
        let stream = self.stream.as_mut().expect("connected before read");
        let mut tmp = [0u8; READ_CHUNK];
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Err(Error::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )));
        }
        self.read_buf.extend_from_slice(&tmp[..n]);
        Ok(())
    }

    async fn read_meta_result(&mut self) -> Result<MetaResult, Error> {
        loop {
            match decode_response(&self.read_buf)? {
                Decoded::Complete { consumed, result } => {
                    let _ = self.read_buf.split_to(consumed);
                    return Ok(result);
                }
                Decoded::Incomplete => self.read_more().await?,
            }
        }
    }

    async fn execute_once(&mut self, command: &MetaCommand) -> Result<MetaResult, Error> {
        let mut buf = BytesMut::with_capacity(64);
        command.encode(&mut buf);
        self.write_all(&buf).await?;
        self.read_meta_result().await
    }

    /// Serialise `command`, send it, and decode exactly one response,
    /// reconnecting and replaying once on a transport-class failure.
    ///
    /// The connection is marked `Broken` *before* the suspending call and
    /// only restored to `Ready` once it completes cleanly, so a task that
    /// is cancelled mid-`.await` (the read or write suspension points) is
    /// left `Broken` rather than `Ready` with a half-drained socket.
    pub async fn execute(&mut self, command: &MetaCommand) -> Result<MetaResult, Error> {
        self.ensure_connected().await?;
        self.state = ConnectionState::Broken;
        match self.execute_once(command).await {
            Ok(result) => {
                self.state = ConnectionState::Ready;
                Ok(result)
            }
            Err(Error::Transport(e)) => {
                warn!(endpoint = %self.endpoint, error = %e, "connection broken, reconnecting");
                self.connect().await?;
                self.state = ConnectionState::Broken;
                match self.execute_once(command).await {
                    Ok(result) => {
                        self.state = ConnectionState::Ready;
                        Ok(result)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(other) => Err(other),
        }
    }

    pub async fn flush_all(&mut self, delay: u32) -> Result<(), Error> {
        self.ensure_connected().await?;
        let line = if delay > 0 {
            format!("flush_all {delay}\r\n")
        } else {
            "flush_all\r\n".to_string()
        };
        self.write_all(line.as_bytes()).await?;
        let response = self.read_line().await?;
        if response != b"OK" {
            self.state = ConnectionState::Broken;
            return Err(Error::Protocol(String::from_utf8_lossy(&response).to_string()));
        }
        Ok(())
    }

    /// Strip the `VERSION ` prefix from the legacy ascii `version` reply.
    pub async fn version(&mut self) -> Result<String, Error> {
        self.ensure_connected().await?;
        self.write_all(b"version\r\n").await?;
        let line = self.read_line().await?;
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
