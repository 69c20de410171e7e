use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::NodeConfig;
use crate::handshake::{Handshake, HandshakeState, UnexpectedMessage};
use crate::wire::address::AddressVersion;
use crate::wire::error::WireError;
use crate::wire::network::{Network, NetworkParams};
use crate::wire::version::VersionMessage;
use crate::wire::{Message, codec};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Wire(WireError),

    #[error(transparent)]
    UnexpectedMessage(#[from] UnexpectedMessage),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("session cancelled")]
    Cancelled,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl From<WireError> for SessionError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Io(e) => SessionError::from_io(e, "read"),
            other => SessionError::Wire(other),
        }
    }
}

impl SessionError {
    fn from_io(err: io::Error, what: &'static str) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => SessionError::ConnectionClosed,
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => SessionError::Timeout(what),
            _ => SessionError::Io(err),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One connection to one peer.
///
/// Frames are read whole, by their declared length, so a rejected frame
/// leaves the stream positioned at the next header.
pub struct Session<S = TcpStream> {
    stream: S,
    params: NetworkParams,
    handshake: Handshake,
    handshake_timeout: Duration,
    shutdown: CancellationToken,
}

impl Session<TcpStream> {
    /// Resolves `addr`, connects with the configured timeout and applies the
    /// read and write timeouts to the socket.
    #[instrument(level = "debug", skip(config), fields(network = %config.network))]
    pub fn connect(addr: &str, config: &NodeConfig) -> SessionResult<Self> {
        let addr = config.peer_address(addr);
        let sock = resolve(&addr)?;

        let stream = TcpStream::connect_timeout(&sock, config.connect_timeout)
            .map_err(|e| SessionError::from_io(e, "connect"))?;
        stream.set_read_timeout(Some(config.read_timeout))?;
        stream.set_write_timeout(Some(config.write_timeout))?;
        stream.set_nodelay(true)?;

        debug!(%sock, "connected");
        Ok(Session::from_config(stream, config, sock.port()))
    }

    /// A second handle on the socket, used to unblock reads from another
    /// thread with [`TcpStream::shutdown`].
    pub fn try_clone_stream(&self) -> io::Result<TcpStream> {
        self.stream.try_clone()
    }
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S, params: NetworkParams, handshake: Handshake) -> Self {
        Self {
            stream,
            params,
            handshake,
            handshake_timeout: Duration::from_secs(60),
            shutdown: CancellationToken::new(),
        }
    }

    /// Session over an established stream, announcing `config`'s version to
    /// a peer listening on `peer_port`.
    pub fn from_config(stream: S, config: &NodeConfig, peer_port: u16) -> Self {
        let handshake = Handshake::new(config.version_message(peer_port), config.send_addrv2);
        Session::new(stream, config.params(), handshake)
            .with_handshake_timeout(config.handshake_timeout)
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn network(&self) -> Network {
        self.params.network
    }

    pub fn state(&self) -> HandshakeState {
        self.handshake.state()
    }

    pub fn peer_version(&self) -> Option<&VersionMessage> {
        self.handshake.peer_version()
    }

    pub fn negotiated_address_version(&self) -> AddressVersion {
        self.handshake.negotiated_address_version()
    }

    /// Runs `version`/`verack` to completion.
    ///
    /// The deadline is checked between frames; a single stalled read is
    /// bounded by the socket's read timeout.
    #[instrument(level = "debug", skip_all)]
    pub fn handshake(&mut self) -> SessionResult<()> {
        let deadline = Instant::now() + self.handshake_timeout;

        let version = self.handshake.start()?;
        self.send(&version)?;

        while !self.handshake.is_ready() {
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout("handshake"));
            }

            let msg = self.recv()?;
            for reply in self.handshake.receive(&msg)? {
                self.send(&reply)?;
            }

            if let Message::Version(peer) = &msg {
                info!(
                    version = peer.version,
                    user_agent = %peer.user_agent,
                    services = %peer.services,
                    height = peer.best_height,
                    "peer version"
                );
            }
        }

        info!(addr_format = ?self.negotiated_address_version(), "handshake complete");
        Ok(())
    }

    pub fn send(&mut self, msg: &Message) -> SessionResult<()> {
        self.check_cancelled()?;
        trace!(command = msg.command_name(), "send");

        codec::send(&mut self.stream, self.params.magic, msg).map_err(|e| match e {
            WireError::Io(e) => SessionError::from_io(e, "write"),
            other => SessionError::Wire(other),
        })
    }

    /// Receives the next decoded message from the peer.
    ///
    /// The name `recv` "receive" follows conventional socket APIs (`recv()` in
    /// POSIX/BSD sockets) and indicates a blocking receive operation.
    pub fn recv(&mut self) -> SessionResult<Message> {
        self.check_cancelled()?;

        let raw = match codec::read_message(&mut self.stream, self.params.magic) {
            Ok(raw) => raw,
            // a socket shut down under us reads as EOF
            Err(_) if self.shutdown.is_cancelled() => return Err(SessionError::Cancelled),
            Err(WireError::MagicMismatch { expected, actual }) => {
                warn!(
                    network = %self.params.network,
                    peer_network = ?Network::from_magic(actual),
                    "frame for another network skipped"
                );
                return Err(SessionError::Wire(WireError::MagicMismatch { expected, actual }));
            }
            Err(e) => return Err(e.into()),
        };

        trace!(command = %raw.name, len = raw.payload.len(), "recv");
        Ok(Message::try_from(raw)?)
    }

    fn check_cancelled(&self) -> SessionResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        Ok(())
    }
}

fn resolve(addr: &str) -> SessionResult<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        SessionError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("could not resolve {addr}"),
        ))
    })
}
