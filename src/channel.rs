use std::future::Future;
use std::io;
use std::net::SocketAddr;

/// Request sent over a channel's out-of-band request mechanism whose boolean
/// reply tells whether the channel is a direct or a tunnel connection.
pub const CONNECTION_TYPE_REQUEST: &str = "x-teleport-connection-type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Direct,
    Tunnel,
}

impl ConnectionType {
    pub fn from_reply(is_tunnel: bool) -> Self {
        if is_tunnel {
            ConnectionType::Tunnel
        } else {
            ConnectionType::Direct
        }
    }

    pub fn reply(&self) -> bool {
        *self == ConnectionType::Tunnel
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Direct => write!(f, "direct"),
            ConnectionType::Tunnel => write!(f, "tunnel"),
        }
    }
}

/// Receiving half of a channel, drained by a single background task.
pub trait ChannelReader: Send + 'static {
    /// Reads the next bytes sent by the peer, `Ok(0)` once the peer is done.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

/// Sending half of a channel, shared by every caller of the connection.
pub trait ChannelWriter: Send + Sync + 'static {
    fn write(&self, data: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Tells the peer no more data follows while its data keeps arriving.
    fn eof(&self) -> impl Future<Output = io::Result<()>> + Send;

    fn close(&self) -> impl Future<Output = io::Result<()>> + Send;
}

/// A logical channel carved out of a multiplexed connection.
pub trait Channel: Send + 'static {
    type Reader: ChannelReader;
    type Writer: ChannelWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

/// The transport connection channels are opened on.
pub trait Connection: Send + Sync + 'static {
    fn close(&self) -> impl Future<Output = io::Result<()>> + Send;

    fn local_addr(&self) -> SocketAddr;

    fn remote_addr(&self) -> SocketAddr;
}
