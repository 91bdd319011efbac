//! Byte-stream connections over the channels of a multiplexed connection.
//!
//! [`ChannelConn`] turns a channel (typically an SSH channel) into a
//! connection with read deadlines, address accessors and close semantics tied
//! to the parent connection: a shared connection is left open on close, an
//! exclusive one is closed together with the channel.

#[cfg(feature = "ssh")]
pub mod args;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod conn;
pub mod error;
pub mod logging;
pub mod pipe;
#[cfg(feature = "ssh")]
pub mod ssh;
pub mod store;
pub mod stream;
pub mod types;

pub use crate::channel::{
    Channel, ChannelReader, ChannelWriter, Connection, ConnectionType, CONNECTION_TYPE_REQUEST,
};
pub use crate::config::ConnConfig;
pub use crate::conn::ChannelConn;
pub use crate::error::AggregateError;
pub use crate::stream::ConnStream;
