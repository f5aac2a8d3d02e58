//! Client for `systemd-journal-gatewayd`, following one host's current
//! boot and reconnecting whenever the connection breaks.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use super::cursor::CursorStore;
use super::export::{ExportDecoder, Phase};
use super::{EntrySink, EntrySource};
use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 19531;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Resolving,
    Connecting,
    RequestSent,
    ReadingHeaders,
    ReadingFieldLine,
    ReadingBinaryLength,
    ReadingBinaryValue,
}

impl From<Phase> for ConnectionState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Headers => ConnectionState::ReadingHeaders,
            Phase::FieldLine => ConnectionState::ReadingFieldLine,
            Phase::BinaryLength => ConnectionState::ReadingBinaryLength,
            Phase::BinaryValue { .. } | Phase::BinaryTerminator => {
                ConnectionState::ReadingBinaryValue
            }
        }
    }
}

/// What to do once a host cannot be reached at all: its name did not
/// resolve, or every resolved address refused the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Give up on the host.
    #[default]
    Stop,
    /// Start over from name resolution after the delay.
    RetryAfter(Duration),
}

/// Name resolution and connection establishment.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;

    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::Stream>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok(tokio::net::lookup_host((host, port)).await?.collect())
    }

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        TcpStream::connect(addr).await
    }
}

pub struct RemoteClient<T = TcpTransport> {
    host: String,
    port: u16,
    transport: T,
    cursors: CursorStore,
    policy: ReconnectPolicy,
    state: ConnectionState,
}

impl RemoteClient<TcpTransport> {
    /// Client for `host`, storing its cursor in `cursor_dir/<host>`.
    pub fn new(host: impl Into<String>, port: u16, cursor_dir: &Path) -> Self {
        let host = host.into();
        let cursors = CursorStore::open(cursor_dir, &host);
        Self::with_transport(host, port, TcpTransport, cursors)
    }
}

impl<T: Transport> RemoteClient<T> {
    pub fn with_transport(host: impl Into<String>, port: u16, transport: T, cursors: CursorStore) -> Self {
        Self {
            host: host.into(),
            port,
            transport,
            cursors,
            policy: ReconnectPolicy::default(),
            state: ConnectionState::Disconnected,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursors.cursor()
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!(host = %self.host, from = ?self.state, to = ?state, "connection state");
            self.state = state;
        }
    }

    /// The export request, resuming from the stored cursor if there is one.
    pub fn request(&self) -> String {
        let mut request = String::from(
            "GET /entries?boot&follow HTTP/1.0\r\nAccept: application/vnd.fdo.journal\r\n",
        );
        if let Some(cursor) = self.cursors.cursor() {
            request.push_str("Range: entries=");
            request.push_str(cursor);
            request.push_str("\r\n");
        }
        request.push_str("\r\n");
        request
    }

    /// Resolves the host and connects to the first address that accepts,
    /// in resolver order.
    async fn open(&mut self) -> Result<(T::Stream, SocketAddr)> {
        self.set_state(ConnectionState::Resolving);
        let addrs = self
            .transport
            .resolve(&self.host, self.port)
            .await
            .map_err(|source| Error::Resolve {
                host: self.host.clone(),
                source,
            })?;
        if addrs.is_empty() {
            return Err(Error::NoAddresses {
                host: self.host.clone(),
            });
        }

        self.set_state(ConnectionState::Connecting);
        for addr in addrs {
            match self.transport.connect(addr).await {
                Ok(stream) => {
                    tracing::info!(host = %self.host, %addr, "connected");
                    return Ok((stream, addr));
                }
                Err(source) => {
                    let e = Error::Connect { addr, source };
                    tracing::warn!(host = %self.host, error = %e, "connect failed");
                }
            }
        }

        Err(Error::Exhausted {
            host: self.host.clone(),
        })
    }

    /// Runs one connection until it fails. Returns `Ok` only when the sink
    /// has been closed.
    async fn session(&mut self, sink: &EntrySink) -> Result<()> {
        let (mut stream, addr) = self.open().await?;
        let peer = addr.to_string();

        let request = self.request();
        let written = async {
            stream.write_all(request.as_bytes()).await?;
            stream.flush().await
        };
        written.await.map_err(|source| Error::Write {
            peer: peer.clone(),
            source,
        })?;
        self.set_state(ConnectionState::RequestSent);

        // The gateway starts with the entry the cursor points at.
        let mut resumed_from = self.cursors.cursor().map(str::to_owned);
        let mut frames = FramedRead::new(stream, ExportDecoder::new());
        self.set_state(ConnectionState::ReadingHeaders);

        loop {
            let next = frames.next().await;
            self.set_state(frames.decoder().phase().into());

            let entry = match next {
                Some(Ok(entry)) => entry,
                Some(Err(source)) => return Err(Error::Read { peer, source }),
                None => return Err(Error::ConnectionClosed { peer }),
            };

            if let Some(resumed) = resumed_from.take()
                && entry.cursor() == Some(resumed.as_str())
            {
                continue;
            }

            if let Some(cursor) = entry.cursor()
                && let Err(e) = self.cursors.update(cursor)
            {
                tracing::warn!(
                    host = %self.host,
                    path = %self.cursors.path().display(),
                    error = %e,
                    "failed to store cursor"
                );
            }

            if sink.send(entry).await.is_err() {
                return Ok(());
            }
        }
    }
}

impl<T: Transport> EntrySource for RemoteClient<T> {
    fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn run(mut self, sink: EntrySink, shutdown: CancellationToken) -> Result<()> {
        loop {
            let outcome = {
                let session = self.session(&sink);
                tokio::select! {
                    _ = shutdown.cancelled() => None,
                    outcome = session => Some(outcome),
                }
            };

            let Some(outcome) = outcome else {
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            };

            self.set_state(ConnectionState::Disconnected);
            match outcome {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unreachable() => match self.policy {
                    ReconnectPolicy::Stop => return Err(e),
                    ReconnectPolicy::RetryAfter(delay) => {
                        tracing::warn!(host = %self.host, error = %e, retry_in = ?delay, "host unreachable");
                        tokio::select! {
                            _ = shutdown.cancelled() => return Ok(()),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                },
                Err(e) => {
                    tracing::error!(host = %self.host, error = %e, "connection lost, reconnecting");
                }
            }
        }
    }
}

impl<T> fmt::Debug for RemoteClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
