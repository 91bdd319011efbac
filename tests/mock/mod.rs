#![allow(dead_code)]

use chconn::{Channel, ChannelReader, ChannelWriter, Connection};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

pub const LOCAL_ADDR: &str = "127.0.0.1:50022";
pub const REMOTE_ADDR: &str = "10.0.0.7:22";

#[derive(Debug, Default)]
pub struct WriterState {
    written: Mutex<Vec<u8>>,
    closes: AtomicUsize,
    eofs: AtomicUsize,
    fail_close: bool,
}

impl WriterState {
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn eofs(&self) -> usize {
        self.eofs.load(Ordering::SeqCst)
    }
}

/// The remote end of a mock channel.
pub struct Peer {
    pub tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    pub state: Arc<WriterState>,
}

impl Peer {
    pub fn send(&self, data: &[u8]) {
        self.tx
            .as_ref()
            .expect("peer already hung up")
            .send(data.to_vec())
            .expect("channel reader dropped");
    }

    pub fn hang_up(&mut self) {
        self.tx = None;
    }
}

pub struct MockChannel {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<WriterState>,
}

pub fn mock_channel(fail_close: bool) -> (MockChannel, Peer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = Arc::new(WriterState {
        fail_close,
        ..Default::default()
    });
    (
        MockChannel {
            rx,
            state: state.clone(),
        },
        Peer {
            tx: Some(tx),
            state,
        },
    )
}

pub struct MockReader {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
}

pub struct MockWriter {
    state: Arc<WriterState>,
}

impl Channel for MockChannel {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn split(self) -> (MockReader, MockWriter) {
        (
            MockReader {
                rx: self.rx,
                pending: vec![],
            },
            MockWriter { state: self.state },
        )
    }
}

impl ChannelReader for MockReader {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv().await {
                Some(data) => self.pending = data,
                None => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl ChannelWriter for MockWriter {
    async fn write(&self, data: &[u8]) -> io::Result<usize> {
        if self.state.closes() > 0 || self.state.eofs() > 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"));
        }
        self.state.written.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    async fn eof(&self) -> io::Result<()> {
        self.state.eofs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> io::Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close {
            return Err(io::Error::other("channel close failed"));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockConnection {
    closes: AtomicUsize,
    fail_close: bool,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
}

impl MockConnection {
    pub fn new(fail_close: bool) -> Arc<Self> {
        Arc::new(Self {
            closes: AtomicUsize::new(0),
            fail_close,
            local_addr: LOCAL_ADDR.parse().unwrap(),
            remote_addr: REMOTE_ADDR.parse().unwrap(),
        })
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    async fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::other("connection close failed"));
        }
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

/// Output that hands control back to the runtime before every write, like a
/// terminal or socket that is not always ready.
#[derive(Debug, Default)]
pub struct YieldingWriter {
    pub data: Vec<u8>,
    ready: bool,
}

impl AsyncWrite for YieldingWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if !self.ready {
            self.ready = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        self.ready = false;
        self.data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
