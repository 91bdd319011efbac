//! In-memory, synchronous, one-directional byte pipe.
//!
//! A write hands its bytes to the reader and only returns once every byte has
//! been consumed, so the pipe never holds more than one in-flight write.
//! Each end carries its own deadline; moving a deadline wakes operations that
//! are already blocked on it.

use crate::error::{closed_pipe, deadline_exceeded};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

#[derive(Debug, Default)]
struct State {
    // Bytes of the write currently in flight, consumed from `offset` onwards.
    pending: Vec<u8>,
    offset: usize,
    read_closed: bool,
    write_closed: bool,
}

impl State {
    fn has_pending(&self) -> bool {
        self.offset < self.pending.len()
    }

    fn discard_pending(&mut self) {
        self.pending.clear();
        self.offset = 0;
    }

    fn is_closed(&self) -> bool {
        self.read_closed || self.write_closed
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    // Signalled when bytes are offered or either end closes.
    readable: Notify,
    // Signalled when bytes are consumed or either end closes.
    writable: Notify,
    read_deadline: watch::Sender<Option<Instant>>,
    write_deadline: watch::Sender<Option<Instant>>,
    // Keeps concurrent writes from interleaving.
    write_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake_all(&self) {
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}

/// The consuming end of a [`pipe`].
#[derive(Debug, Clone)]
pub struct PipeReader {
    shared: Arc<Shared>,
}

/// The feeding end of a [`pipe`].
#[derive(Debug, Clone)]
pub struct PipeWriter {
    shared: Arc<Shared>,
}

pub fn pipe() -> (PipeReader, PipeWriter) {
    let (read_deadline, _) = watch::channel(None);
    let (write_deadline, _) = watch::channel(None);
    let shared = Arc::new(Shared {
        state: Mutex::new(State::default()),
        readable: Notify::new(),
        writable: Notify::new(),
        read_deadline,
        write_deadline,
        write_lock: tokio::sync::Mutex::new(()),
    });

    (
        PipeReader {
            shared: shared.clone(),
        },
        PipeWriter { shared },
    )
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| deadline <= Instant::now())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl PipeReader {
    /// Reads the next bytes offered by the writer.
    ///
    /// Returns `Ok(0)` once the writer has closed, a closed-pipe error once
    /// this end has closed and a timeout error once the read deadline passed.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut deadline_rx = self.shared.read_deadline.subscribe();

        loop {
            let readable = self.shared.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            let deadline = *deadline_rx.borrow_and_update();
            {
                let mut state = self.shared.state();
                if state.read_closed {
                    return Err(closed_pipe());
                }
                if state.write_closed {
                    return Ok(0);
                }
                if expired(deadline) {
                    return Err(deadline_exceeded());
                }
                if buf.is_empty() {
                    return Ok(0);
                }
                if state.has_pending() {
                    let available = &state.pending[state.offset..];
                    let n = available.len().min(buf.len());
                    buf[..n].copy_from_slice(&available[..n]);
                    state.offset += n;
                    if !state.has_pending() {
                        state.discard_pending();
                    }
                    drop(state);
                    self.shared.writable.notify_waiters();
                    return Ok(n);
                }
            }

            tokio::select! {
                _ = &mut readable => {}
                _ = deadline_rx.changed() => {}
                _ = sleep_until(deadline) => return Err(deadline_exceeded()),
            }
        }
    }

    /// Sets the deadline for pending and future reads, `None` clears it.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        if self.shared.state().is_closed() {
            return Err(closed_pipe());
        }
        self.shared.read_deadline.send_replace(deadline);
        Ok(())
    }

    /// Closes the reading end. Closing twice is a no-op.
    pub fn close(&self) -> io::Result<()> {
        self.shared.state().read_closed = true;
        self.shared.wake_all();
        Ok(())
    }
}

// Withdraws the bytes of a write whose future is dropped before the reader
// consumed them.
struct PendingWrite<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.state().discard_pending();
        }
    }
}

impl PipeWriter {
    /// Offers `data` to the reader and waits until all of it was consumed.
    ///
    /// Fails with a closed-pipe error if either end closes first and with a
    /// timeout error if the write deadline passes first; unconsumed bytes are
    /// withdrawn in both cases.
    pub async fn write(&self, data: &[u8]) -> io::Result<usize> {
        let _serialized = self.shared.write_lock.lock().await;
        let mut deadline_rx = self.shared.write_deadline.subscribe();

        {
            let mut state = self.shared.state();
            if state.is_closed() {
                return Err(closed_pipe());
            }
            if expired(*deadline_rx.borrow_and_update()) {
                return Err(deadline_exceeded());
            }
            if data.is_empty() {
                return Ok(0);
            }
            state.discard_pending();
            state.pending.extend_from_slice(data);
        }
        let mut guard = PendingWrite {
            shared: &self.shared,
            armed: true,
        };
        self.shared.readable.notify_waiters();

        loop {
            let writable = self.shared.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();

            let deadline = *deadline_rx.borrow_and_update();
            {
                let mut state = self.shared.state();
                if !state.has_pending() {
                    guard.armed = false;
                    return Ok(data.len());
                }
                if state.is_closed() {
                    return Err(closed_pipe());
                }
                if expired(deadline) {
                    return Err(deadline_exceeded());
                }
            }

            tokio::select! {
                _ = &mut writable => {}
                _ = deadline_rx.changed() => {}
                _ = sleep_until(deadline) => {}
            }
        }
    }

    /// Sets the deadline for pending and future writes, `None` clears it.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        if self.shared.state().is_closed() {
            return Err(closed_pipe());
        }
        self.shared.write_deadline.send_replace(deadline);
        Ok(())
    }

    /// Closes the feeding end; the reader sees end-of-stream. Closing twice
    /// is a no-op.
    pub fn close(&self) -> io::Result<()> {
        self.shared.state().write_closed = true;
        self.shared.wake_all();
        Ok(())
    }
}
