use crate::channel::{Channel, ChannelReader, ChannelWriter, Connection};
use crate::config::{ConfigError, ConnConfig};
use crate::error::{closed_pipe, AggregateError};
use crate::pipe::{pipe, PipeReader, PipeWriter};
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A byte-stream connection running over a single channel of a multiplexed
/// connection.
///
/// Bytes from the peer are copied by a background task into an in-memory
/// pipe, which is what gives reads their deadline support. Writes go straight
/// to the channel and have no deadline.
pub struct ChannelConn<W, C> {
    channel: W,
    connection: Arc<C>,
    // Whenever this connection closes the parent connection is closed as well.
    exclusive: bool,
    // The part of the pipe callers read from.
    reader: PipeReader,
    // The part of the pipe fed by the background copy task.
    writer: PipeWriter,
    shutdown: CancellationToken,
    // Set once the channel was told that no more data follows.
    write_closed: AtomicBool,
    closed: Mutex<bool>,
}

impl<W, C> Debug for ChannelConn<W, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConn")
            .field("exclusive", &self.exclusive)
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .finish()
    }
}

impl<W, C> ChannelConn<W, C>
where
    W: ChannelWriter,
    C: Connection,
{
    /// Wraps `channel`; closing the result leaves `connection` open for the
    /// other channels sharing it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<Ch>(connection: Arc<C>, channel: Ch) -> Self
    where
        Ch: Channel<Writer = W>,
    {
        Self::spawn(connection, channel, ConnConfig::shared())
    }

    /// Wraps `channel`; closing the result also closes `connection`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new_exclusive<Ch>(connection: Arc<C>, channel: Ch) -> Self
    where
        Ch: Channel<Writer = W>,
    {
        Self::spawn(connection, channel, ConnConfig::exclusive())
    }

    /// Fails without touching `channel` if `config` is invalid.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_config<Ch>(
        connection: Arc<C>,
        channel: Ch,
        config: ConnConfig,
    ) -> Result<Self, ConfigError>
    where
        Ch: Channel<Writer = W>,
    {
        config.validate()?;
        Ok(Self::spawn(connection, channel, config))
    }

    fn spawn<Ch>(connection: Arc<C>, channel: Ch, config: ConnConfig) -> Self
    where
        Ch: Channel<Writer = W>,
    {
        let (reader, writer) = pipe();
        let (source, channel) = channel.split();
        let shutdown = CancellationToken::new();

        tokio::spawn(copy_channel(
            source,
            writer.clone(),
            shutdown.clone(),
            config.copy_buffer_size,
        ));

        log::debug!(
            "Wrapped channel from {} (exclusive: {})",
            connection.remote_addr(),
            config.exclusive
        );

        Self {
            channel,
            connection,
            exclusive: config.exclusive,
            reader,
            writer,
            shutdown,
            write_closed: AtomicBool::new(false),
            closed: Mutex::new(false),
        }
    }

    /// Reads bytes sent by the peer, honouring the read deadline.
    ///
    /// Returns `Ok(0)` once the channel is exhausted and every byte was read.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf).await
    }

    /// Writes directly to the channel.
    ///
    /// Channel errors pass through unchanged. After [`close`](Self::close) or
    /// [`close_write`](Self::close_write) the channel is not touched and the
    /// closed-pipe error is returned instead.
    pub async fn write(&self, data: &[u8]) -> io::Result<usize> {
        if self.shutdown.is_cancelled() || self.write_closed.load(Ordering::Acquire) {
            return Err(closed_pipe());
        }
        self.channel.write(data).await
    }

    /// Half-closes the connection: the peer is told no more data follows and
    /// later writes fail, while reads keep delivering what the peer sends.
    ///
    /// Nothing is released; [`close`](Self::close) is still required.
    /// Calling it again, or after `close`, does nothing.
    pub async fn close_write(&self) -> io::Result<()> {
        if self.shutdown.is_cancelled() || self.write_closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        log::debug!("Half-closing channel to {}", self.connection.remote_addr());
        self.channel.eof().await
    }

    /// Closes the channel and both pipe ends and, if exclusive, the parent
    /// connection.
    ///
    /// Every step runs even if an earlier one fails; all failures come back
    /// together. Only the first call does any work, later calls return `Ok`.
    pub async fn close(&self) -> Result<(), AggregateError> {
        let mut closed = self.closed.lock().await;
        if *closed {
            log::debug!("Channel connection is already closed");
            return Ok(());
        }
        *closed = true;
        self.shutdown.cancel();

        let mut errors = vec![];
        if let Err(e) = self.channel.close().await {
            errors.push(e);
        }
        if let Err(e) = self.reader.close() {
            errors.push(e);
        }
        if let Err(e) = self.writer.close() {
            errors.push(e);
        }

        if self.exclusive {
            if let Err(e) = self.connection.close().await {
                errors.push(e);
            }
        }

        match AggregateError::from_errors(errors) {
            Some(err) => {
                log::warn!("Closing channel connection failed: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.connection.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_addr()
    }

    /// Sets the read deadline; writes have none.
    pub fn set_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.reader.set_read_deadline(deadline)
    }

    /// Fails with the closed-pipe error after `close` and also once the peer
    /// hung up and its data was fully read.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.reader.set_read_deadline(deadline)
    }

    /// Ignored: writes to the channel are not deadline bound.
    pub fn set_write_deadline(&self, _deadline: Option<Instant>) -> io::Result<()> {
        Ok(())
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }
}

impl<W, C> Drop for ChannelConn<W, C> {
    fn drop(&mut self) {
        // Nobody can read any more, stop draining the channel.
        self.shutdown.cancel();
    }
}

async fn copy_channel<R: ChannelReader>(
    mut source: R,
    feed: PipeWriter,
    shutdown: CancellationToken,
    buffer_size: usize,
) {
    let mut buf = vec![0; buffer_size];
    let mut copied: u64 = 0;

    loop {
        let n = tokio::select! {
            _ = shutdown.cancelled() => return,
            read = source.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    log::warn!("Failed to read from channel after {copied} bytes: {e}");
                    break;
                }
            },
        };

        let written = tokio::select! {
            _ = shutdown.cancelled() => return,
            written = feed.write(&buf[..n]) => written,
        };
        if let Err(e) = written {
            log::debug!("Stopped copying channel data: {e}");
            return;
        }
        copied += n as u64;
    }

    log::debug!("Channel drained after {copied} bytes");
    if let Err(e) = feed.close() {
        log::error!("Failed to close pipe feed: {e}");
    }
}
