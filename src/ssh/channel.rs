use crate::channel::{Channel, ChannelReader, ChannelWriter};
use russh::{ChannelId, ChannelMsg, ChannelReadHalf, ChannelWriteHalf};
use std::fmt::Debug;
use std::io;

/// A russh channel seen through the [`Channel`] capability.
pub struct SshChannel<S>
where
    S: From<(ChannelId, ChannelMsg)> + Send + Sync + 'static,
{
    channel: russh::Channel<S>,
}

impl<S> SshChannel<S>
where
    S: From<(ChannelId, ChannelMsg)> + Send + Sync + 'static,
{
    pub fn new(channel: russh::Channel<S>) -> Self {
        Self { channel }
    }

    pub fn id(&self) -> ChannelId {
        self.channel.id()
    }
}

impl<S> From<russh::Channel<S>> for SshChannel<S>
where
    S: From<(ChannelId, ChannelMsg)> + Send + Sync + 'static,
{
    fn from(channel: russh::Channel<S>) -> Self {
        Self::new(channel)
    }
}

impl<S> Channel for SshChannel<S>
where
    S: From<(ChannelId, ChannelMsg)> + Send + Sync + 'static,
{
    type Reader = SshChannelReader;
    type Writer = SshChannelWriter<S>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let id = self.channel.id();
        let (read_half, write_half) = self.channel.split();
        (
            SshChannelReader {
                id,
                half: read_half,
                leftover: vec![],
                offset: 0,
            },
            SshChannelWriter {
                id,
                half: write_half,
            },
        )
    }
}

pub struct SshChannelReader {
    id: ChannelId,
    half: ChannelReadHalf,
    // The tail of a data message larger than the last read buffer.
    leftover: Vec<u8>,
    offset: usize,
}

impl Debug for SshChannelReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshChannelReader")
            .field("id", &self.id)
            .field("leftover", &(self.leftover.len() - self.offset))
            .finish()
    }
}

impl ChannelReader for SshChannelReader {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.offset < self.leftover.len() {
                let available = &self.leftover[self.offset..];
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                self.offset += n;
                return Ok(n);
            }

            match self.half.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    self.leftover = data.to_vec();
                    self.offset = 0;
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(0),
                Some(msg) => log::debug!("Ignoring message on channel {}: {msg:?}", self.id),
            }
        }
    }
}

pub struct SshChannelWriter<S>
where
    S: From<(ChannelId, ChannelMsg)> + Send + Sync + 'static,
{
    id: ChannelId,
    half: ChannelWriteHalf<S>,
}

impl<S> Debug for SshChannelWriter<S>
where
    S: From<(ChannelId, ChannelMsg)> + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshChannelWriter")
            .field("id", &self.id)
            .finish()
    }
}

impl<S> ChannelWriter for SshChannelWriter<S>
where
    S: From<(ChannelId, ChannelMsg)> + Send + Sync + 'static,
{
    async fn write(&self, data: &[u8]) -> io::Result<usize> {
        self.half.data(data).await.map_err(io::Error::other)?;
        Ok(data.len())
    }

    async fn eof(&self) -> io::Result<()> {
        self.half.eof().await.map_err(io::Error::other)
    }

    async fn close(&self) -> io::Result<()> {
        self.half.close().await.map_err(io::Error::other)
    }
}
