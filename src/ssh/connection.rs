use crate::channel::Connection;
use russh::client::{self, Handle};
use russh::Disconnect;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;

/// An authenticated russh client session together with the addresses of the
/// TCP connection it runs on.
///
/// Every `Handle` request takes `&self`, so channels open concurrently.
pub struct SshConnection<H: client::Handler> {
    handle: Handle<H>,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
}

impl<H: client::Handler> Debug for SshConnection<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}

impl<H: client::Handler> SshConnection<H> {
    pub fn new(handle: Handle<H>, local_addr: SocketAddr, remote_addr: SocketAddr) -> Self {
        Self {
            handle,
            local_addr,
            remote_addr,
        }
    }

    /// Asks the server to open a TCP connection to `host:port` on our behalf.
    pub async fn open_direct_tcpip(
        &self,
        host: &str,
        port: u16,
    ) -> io::Result<russh::Channel<client::Msg>> {
        self.handle
            .channel_open_direct_tcpip(
                host,
                port.into(),
                self.local_addr.ip().to_string(),
                self.local_addr.port().into(),
            )
            .await
            .map_err(io::Error::other)
    }
}

impl<H: client::Handler + 'static> Connection for SshConnection<H> {
    async fn close(&self) -> io::Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(io::Error::other)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
