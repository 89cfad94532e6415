//! Coalescing LED update scheduler
//!
//! Color frames are handed to a single writer thread through a one-slot
//! mailbox. A newer frame replaces one that has not been written yet, so the
//! device always receives the latest colors and never more than one write per
//! interval.
//!
//! ```text
//! submit() ──► [mailbox: Option<PendingUpdate>] ──► writer thread
//!                       ▲ replaced = Superseded        │ write, resolve Written
//!                                                      └ sleep(interval)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, trace, warn};
use vulcan_transport::{OutputChannel, TransportError};

use crate::color::{encode_led_report, ColorFrame};
use crate::error::VulcanError;

/// Scheduler timing defaults
pub mod timing {
    /// Minimum spacing between LED writes (ms)
    pub const UPDATE_INTERVAL_MS: u64 = 16;
}

/// How a submitted frame was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The frame reached the device
    Written,
    /// A newer frame replaced it before it was written
    Superseded,
}

type UpdateResult = Result<UpdateOutcome, VulcanError>;

/// Called once from the writer thread when a write fails
pub type FailureHandler = Box<dyn FnOnce(TransportError) + Send>;

struct PendingUpdate {
    frame: Box<ColorFrame>,
    done: oneshot::Sender<UpdateResult>,
}

struct Mailbox {
    slot: Mutex<Option<PendingUpdate>>,
    wake: Notify,
    closed: AtomicBool,
}

impl Mailbox {
    /// Mark closed and fail whatever is still waiting
    fn close(&self) {
        let pending = {
            let mut slot = self.slot.lock();
            self.closed.store(true, Ordering::Release);
            slot.take()
        };
        if let Some(pending) = pending {
            let _ = pending.done.send(Err(VulcanError::Disconnected));
        }
        self.wake.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Completion handle for one submitted frame.
///
/// Dropping it does not cancel the update.
pub struct Submission {
    rx: oneshot::Receiver<UpdateResult>,
}

impl std::fmt::Debug for Submission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submission").finish_non_exhaustive()
    }
}

impl Future for Submission {
    type Output = UpdateResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.rx
            .poll_unpin(cx)
            .map(|r| r.unwrap_or(Err(VulcanError::Disconnected)))
    }
}

/// Single-writer, latest-wins LED update queue
pub struct UpdateScheduler {
    mailbox: Arc<Mailbox>,
    interval: Duration,
}

impl UpdateScheduler {
    /// Start the writer thread.
    ///
    /// `on_failure` runs once, on the writer thread, if a write fails. The
    /// scheduler is closed by then and rejects further frames.
    pub fn spawn(
        output: Box<dyn OutputChannel>,
        interval: Duration,
        on_failure: FailureHandler,
    ) -> Result<Self, VulcanError> {
        let mailbox = Arc::new(Mailbox {
            slot: Mutex::new(None),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let worker_mailbox = Arc::clone(&mailbox);
        thread::Builder::new()
            .name("vulcan-led-writer".into())
            .spawn(move || {
                futures::executor::block_on(writer_loop(
                    worker_mailbox,
                    output,
                    interval,
                    on_failure,
                ));
            })
            .map_err(|e| {
                VulcanError::Transport(TransportError::Internal(format!(
                    "failed to spawn LED writer: {e}"
                )))
            })?;

        debug!("LED writer started ({:?} interval)", interval);
        Ok(Self { mailbox, interval })
    }

    /// Queue a frame, replacing any frame still waiting.
    ///
    /// The replaced frame's handle resolves `Superseded`. After shutdown the
    /// returned handle resolves `Disconnected` immediately.
    pub fn submit(&self, frame: &ColorFrame) -> Submission {
        let (tx, rx) = oneshot::channel();
        let pending = PendingUpdate {
            frame: Box::new(*frame),
            done: tx,
        };

        let replaced = {
            let mut slot = self.mailbox.slot.lock();
            if self.mailbox.is_closed() {
                let _ = pending.done.send(Err(VulcanError::Disconnected));
                return Submission { rx };
            }
            slot.replace(pending)
        };

        if let Some(old) = replaced {
            trace!("Superseding pending LED frame");
            let _ = old.done.send(Ok(UpdateOutcome::Superseded));
        }
        self.mailbox.wake.notify_one();

        Submission { rx }
    }

    /// Minimum spacing between writes
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the writer has stopped accepting frames
    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Stop the writer. A pending frame resolves `Disconnected`.
    pub fn shutdown(&self) {
        if !self.mailbox.is_closed() {
            debug!("Stopping LED writer");
        }
        self.mailbox.close();
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn writer_loop(
    mailbox: Arc<Mailbox>,
    output: Box<dyn OutputChannel>,
    interval: Duration,
    on_failure: FailureHandler,
) {
    loop {
        mailbox.wake.notified().await;
        if mailbox.is_closed() {
            break;
        }

        let Some(pending) = mailbox.slot.lock().take() else {
            continue;
        };

        let report = encode_led_report(&pending.frame);
        match output.write_report(&report) {
            Ok(written) => {
                trace!("LED frame written ({} bytes)", written);
                let _ = pending.done.send(Ok(UpdateOutcome::Written));
            }
            Err(e) => {
                warn!("LED write failed: {}", e);
                mailbox.close();
                on_failure(e.clone());
                let _ = pending.done.send(Err(VulcanError::TransportWriteFailed(e)));
                break;
            }
        }

        thread::sleep(interval);
    }

    debug!("LED writer stopped");
}
