mod channel;
mod client;
mod connection;

pub use crate::ssh::channel::{SshChannel, SshChannelReader, SshChannelWriter};
pub use crate::ssh::client::{ClientHandler, SshAuth, SshChannelConn, SshClient, SshSettings};
pub use crate::ssh::connection::SshConnection;
