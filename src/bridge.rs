use crate::channel::{ChannelWriter, Connection};
use crate::conn::ChannelConn;
use crate::error::{is_closed, is_timeout};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

const BRIDGE_BUFFER_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub sent: u64,
    pub received: u64,
}

/// Pumps `input` into the connection and the connection into `output` until
/// the peer is done, the connection closes or no byte arrives for
/// `idle_timeout`.
///
/// Reaching the end of `input` does not end the bridge: the peer may still
/// be answering.
pub async fn bridge<W, C, I, O>(
    conn: Arc<ChannelConn<W, C>>,
    input: I,
    output: &mut O,
    idle_timeout: Option<Duration>,
) -> io::Result<BridgeStats>
where
    W: ChannelWriter,
    C: Connection,
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin,
{
    let sent = Arc::new(AtomicU64::new(0));
    let upstream = tokio::spawn(pump_input(conn.clone(), input, sent.clone()));

    let received = pump_output(&conn, output, idle_timeout).await;
    upstream.abort();

    Ok(BridgeStats {
        sent: sent.load(Ordering::Relaxed),
        received: received?,
    })
}

async fn pump_input<W, C, I>(conn: Arc<ChannelConn<W, C>>, mut input: I, sent: Arc<AtomicU64>)
where
    W: ChannelWriter,
    C: Connection,
    I: AsyncRead + Unpin + Send + 'static,
{
    let mut buf = vec![0; BRIDGE_BUFFER_SIZE];
    loop {
        let n = match input.read(&mut buf).await {
            Ok(0) => {
                log::debug!("Input drained after {} bytes", sent.load(Ordering::Relaxed));
                return;
            }
            Ok(n) => n,
            Err(e) => {
                log::error!("Failed to read input: {e}");
                return;
            }
        };

        let mut offset = 0;
        while offset < n {
            match conn.write(&buf[offset..n]).await {
                Ok(written) => offset += written,
                Err(e) => {
                    log::warn!("Failed to write to channel: {e}");
                    return;
                }
            }
        }
        sent.fetch_add(n as u64, Ordering::Relaxed);
    }
}

async fn pump_output<W, C, O>(
    conn: &ChannelConn<W, C>,
    output: &mut O,
    idle_timeout: Option<Duration>,
) -> io::Result<u64>
where
    W: ChannelWriter,
    C: Connection,
    O: AsyncWrite + Unpin,
{
    let mut buf = vec![0; BRIDGE_BUFFER_SIZE];
    let mut received = 0;

    loop {
        if let Some(idle_timeout) = idle_timeout {
            // The pipe refuses deadlines once the peer's data is drained.
            match conn.set_read_deadline(Some(Instant::now() + idle_timeout)) {
                Ok(()) => {}
                Err(e) if is_closed(&e) => break,
                Err(e) => return Err(e),
            }
        }

        let n = match conn.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if is_timeout(&e) => {
                log::info!("No data from {} for {idle_timeout:?}", conn.remote_addr());
                break;
            }
            Err(e) if is_closed(&e) => break,
            Err(e) => return Err(e),
        };

        output.write_all(&buf[..n]).await?;
        output.flush().await?;
        received += n as u64;
    }

    Ok(received)
}
