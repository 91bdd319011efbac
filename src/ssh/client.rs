use super::channel::{SshChannel, SshChannelWriter};
use super::connection::SshConnection;
use crate::config::ConnConfig;
use crate::conn::ChannelConn;
use crate::types::AppResult;
use anyhow::{anyhow, Context};
use russh::client::{self, Config};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

pub type SshChannelConn = ChannelConn<SshChannelWriter<client::Msg>, SshConnection<ClientHandler>>;

#[derive(Clone)]
pub enum SshAuth {
    Password(String),
    Key {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshAuth::Password(_) => write!(f, "Password(..)"),
            SshAuth::Key { path, .. } => f.debug_struct("Key").field("path", path).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SshSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
    pub accept_unknown_host_key: bool,
    pub inactivity_timeout: Option<Duration>,
}

/// Verifies server keys against the user's known_hosts file.
#[derive(Debug)]
pub struct ClientHandler {
    host: String,
    port: u16,
    accept_unknown_host_key: bool,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) if self.accept_unknown_host_key => {
                log::warn!(
                    "Accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                Ok(true)
            }
            Ok(false) => {
                log::error!("Unknown host key for {}:{}", self.host, self.port);
                Ok(false)
            }
            Err(e) => {
                log::error!(
                    "Host key verification failed for {}:{}: {e}",
                    self.host,
                    self.port
                );
                Ok(false)
            }
        }
    }
}

/// An authenticated SSH client session that hands out channels as
/// [`ChannelConn`]s.
#[derive(Debug)]
pub struct SshClient {
    connection: Arc<SshConnection<ClientHandler>>,
}

impl SshClient {
    pub async fn connect(settings: &SshSettings) -> AppResult<Self> {
        let address = format!("{}:{}", settings.host, settings.port);
        let stream = TcpStream::connect(&address)
            .await
            .with_context(|| format!("failed to connect to {address}"))?;
        let local_addr = stream.local_addr()?;
        let remote_addr = stream.peer_addr()?;

        let config = Config {
            inactivity_timeout: settings.inactivity_timeout,
            ..Default::default()
        };
        let handler = ClientHandler {
            host: settings.host.clone(),
            port: settings.port,
            accept_unknown_host_key: settings.accept_unknown_host_key,
        };

        let mut handle = client::connect_stream(Arc::new(config), stream, handler)
            .await
            .with_context(|| format!("SSH handshake with {address} failed"))?;

        let auth_result = match &settings.auth {
            SshAuth::Password(password) => handle
                .authenticate_password(settings.user.as_str(), password.as_str())
                .await
                .context("password authentication error")?,
            SshAuth::Key { path, passphrase } => {
                let key_pair = russh::keys::load_secret_key(path, passphrase.as_deref())
                    .with_context(|| format!("failed to load key {}", path.display()))?;
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                handle
                    .authenticate_publickey(
                        settings.user.as_str(),
                        PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                    )
                    .await
                    .context("public key authentication error")?
            }
        };

        if !auth_result.success() {
            return Err(anyhow!(
                "authentication as {} on {address} was rejected",
                settings.user
            ));
        }

        log::info!("Authenticated as {} on {address}", settings.user);
        Ok(Self {
            connection: Arc::new(SshConnection::new(handle, local_addr, remote_addr)),
        })
    }

    /// Opens a `direct-tcpip` channel to `host:port` wrapped into a
    /// connection configured by `config`.
    pub async fn open_direct(
        &self,
        host: &str,
        port: u16,
        config: ConnConfig,
    ) -> AppResult<SshChannelConn> {
        // Checked before the server is asked for a channel.
        config.validate()?;
        let channel = self
            .connection
            .open_direct_tcpip(host, port)
            .await
            .with_context(|| format!("failed to open channel to {host}:{port}"))?;

        log::info!("Opened channel {} to {host}:{port}", channel.id());
        Ok(ChannelConn::with_config(
            self.connection.clone(),
            SshChannel::from(channel),
            config,
        )?)
    }

    pub fn connection(&self) -> &Arc<SshConnection<ClientHandler>> {
        &self.connection
    }
}
