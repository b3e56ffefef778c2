//! Byte-rate pacing over rolling one-second windows.
//!
//! [`RateWindow`] tracks how much of the current window's budget has been used and
//! decides, after every chunk, whether the reader may continue, must sleep out the
//! rest of the window, or has already outlived it. [`copy_throttled`] drives any
//! `AsyncRead` into any `AsyncWrite` under that policy.
//!
//! The per-read request is capped at the remaining window allowance, so a window
//! never receives more than `ceiling` bytes. A ceiling of zero is floored to one
//! byte per window instead of dividing by zero or stalling forever.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Upper bound on a single read.
pub const CHUNK_SIZE: usize = 64 * 1024;

const WINDOW: Duration = Duration::from_secs(1);

/// What the reader should do after recording a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Budget remains in the current window.
    Continue,
    /// Budget exhausted early; sleep for the given time, then call [`RateWindow::restart`].
    Throttle(Duration),
    /// The window expired on its own. A new one has already been started.
    Rollover,
}

#[derive(Debug)]
pub struct RateWindow {
    ceiling: u64,
    started: Instant,
    consumed: u64,
}

impl RateWindow {
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling: ceiling.max(1),
            started: Instant::now(),
            consumed: 0,
        }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Bytes the next read may ask for.
    pub fn allowance(&self) -> usize {
        let remaining = self.ceiling.saturating_sub(self.consumed).max(1);
        usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE))
    }

    pub fn record(&mut self, bytes: usize) -> Pace {
        self.consumed = self.consumed.saturating_add(bytes as u64);
        let elapsed = self.started.elapsed();

        if elapsed >= WINDOW {
            self.restart();
            Pace::Rollover
        } else if self.consumed >= self.ceiling {
            Pace::Throttle(WINDOW - elapsed)
        } else {
            Pace::Continue
        }
    }

    pub fn restart(&mut self) {
        self.started = Instant::now();
        self.consumed = 0;
    }
}

#[derive(Debug)]
pub enum CopyError {
    Read(std::io::Error),
    Write(std::io::Error),
    Cancelled,
}

/// Copies `reader` into `writer` at no more than `ceiling` bytes per window.
///
/// Returns the number of bytes written once the reader hits EOF and the writer has been
/// flushed. Reads and pacing sleeps race against `cancel`.
pub async fn copy_throttled<R, W>(
    reader: &mut R,
    writer: &mut W,
    ceiling: u64,
    cancel: &CancellationToken,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut window = RateWindow::new(ceiling);
    let mut total = 0u64;

    loop {
        let want = window.allowance();
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CopyError::Cancelled),
            read = reader.read(&mut buf[..want]) => read.map_err(CopyError::Read)?,
        };
        if n == 0 {
            break;
        }

        writer
            .write_all(&buf[..n])
            .await
            .map_err(CopyError::Write)?;
        total += n as u64;

        match window.record(n) {
            Pace::Continue | Pace::Rollover => {}
            Pace::Throttle(wait) => {
                trace!(
                    consumed = window.consumed(),
                    ceiling = window.ceiling(),
                    wait_ms = wait.as_millis() as u64,
                    "window budget exhausted"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(CopyError::Cancelled),
                    _ = sleep(wait) => {}
                }
                window.restart();
            }
        }
    }

    writer.flush().await.map_err(CopyError::Write)?;
    Ok(total)
}
