use crate::channel::{ChannelWriter, Connection};
use crate::conn::ChannelConn;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// [`AsyncRead`] + [`AsyncWrite`] view of a shared [`ChannelConn`], for code
/// that only speaks tokio's I/O traits.
///
/// Shutting the stream down only half-closes it with
/// [`ChannelConn::close_write`]: the peer's answer can still be read, which is
/// what `tokio::io::copy_bidirectional` relies on. Releasing the channel takes
/// an explicit [`ChannelConn::close`].
pub struct ConnStream<W, C> {
    conn: Arc<ChannelConn<W, C>>,
    // Bytes read for an earlier, larger buffer.
    leftover: Vec<u8>,
    read: Option<BoxFuture<'static, io::Result<Vec<u8>>>>,
    write: Option<BoxFuture<'static, io::Result<usize>>>,
    shutdown: Option<BoxFuture<'static, io::Result<()>>>,
}

impl<W, C> ConnStream<W, C>
where
    W: ChannelWriter,
    C: Connection,
{
    pub fn new(conn: Arc<ChannelConn<W, C>>) -> Self {
        Self {
            conn,
            leftover: vec![],
            read: None,
            write: None,
            shutdown: None,
        }
    }

    pub fn conn(&self) -> &Arc<ChannelConn<W, C>> {
        &self.conn
    }
}

impl<W, C> AsyncRead for ConnStream<W, C>
where
    W: ChannelWriter,
    C: Connection,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if !this.leftover.is_empty() {
            let n = this.leftover.len().min(buf.remaining());
            buf.put_slice(&this.leftover[..n]);
            this.leftover.drain(..n);
            return Poll::Ready(Ok(()));
        }

        let read = this.read.get_or_insert_with(|| {
            let conn = this.conn.clone();
            let len = buf.remaining();
            async move {
                let mut data = vec![0; len];
                let n = conn.read(&mut data).await?;
                data.truncate(n);
                Ok(data)
            }
            .boxed()
        });

        let result = ready!(read.poll_unpin(cx));
        this.read = None;
        let data = result?;
        let n = data.len().min(buf.remaining());
        buf.put_slice(&data[..n]);
        this.leftover.extend_from_slice(&data[n..]);
        Poll::Ready(Ok(()))
    }
}

impl<W, C> AsyncWrite for ConnStream<W, C>
where
    W: ChannelWriter,
    C: Connection,
{
    // A write that returned `Pending` must be polled again with the same
    // bytes, the pending future owns a copy of the first buffer.
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let write = this.write.get_or_insert_with(|| {
            let conn = this.conn.clone();
            let data = buf.to_vec();
            async move { conn.write(&data).await }.boxed()
        });

        let result = ready!(write.poll_unpin(cx));
        this.write = None;
        Poll::Ready(result)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let shutdown = this.shutdown.get_or_insert_with(|| {
            let conn = this.conn.clone();
            async move { conn.close_write().await }.boxed()
        });

        let result = ready!(shutdown.poll_unpin(cx));
        this.shutdown = None;
        Poll::Ready(result)
    }
}
