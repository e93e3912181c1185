// SPDX-License-Identifier: GPL-3.0-only

//! Decode loop
//!
//! One iteration per tick on a tokio interval (≈60 Hz). Each iteration
//! pulls the newest frame, samples it and runs the strategy chain on the
//! blocking pool. Iterations never overlap. The first decoded symbol is
//! handed to `on_result` exactly once and the loop ends.
//!
//! Cancellation is cooperative: it is observed at the top of every
//! iteration and again right before `on_result`, so once a cancel request
//! is seen no result is delivered.

use super::sampling::sample_frame;
use super::strategies::StrategyChain;
use super::types::DecodeResult;
use crate::backends::camera::FrameReader;
use crate::constants::{FRAME_INTERVAL, MAX_DECODE_DIMENSION};
use crate::errors::{CaptureError, DecodeFault};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Why a decode loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// A symbol decoded and `on_result` was called
    Decoded,
    /// Cancellation was observed
    Cancelled,
    /// The stream stopped delivering frames
    StreamEnded(CaptureError),
}

/// Handle to a running decode loop
///
/// Dropping the handle does not stop the loop; call [`LoopHandle::cancel`].
pub struct LoopHandle {
    cancel: Arc<AtomicBool>,
    exit: watch::Receiver<Option<LoopExit>>,
}

impl LoopHandle {
    /// Request cancellation (non-blocking)
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Whether the loop has stopped scheduling iterations
    pub fn is_finished(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Watcher that resolves when the loop ends
    pub fn watcher(&self) -> LoopWatcher {
        LoopWatcher {
            exit: self.exit.clone(),
        }
    }

    /// Wait until the loop has ended
    pub async fn wait(&self) -> LoopExit {
        self.watcher().wait().await
    }

    /// Cancel and wait until the loop has ended
    ///
    /// Returns within one iteration (including one in-flight decode).
    pub async fn cancel_and_wait(&self) -> LoopExit {
        self.cancel();
        self.wait().await
    }
}

/// Observes the end of a decode loop without being able to cancel it
#[derive(Clone)]
pub struct LoopWatcher {
    exit: watch::Receiver<Option<LoopExit>>,
}

impl LoopWatcher {
    pub async fn wait(mut self) -> LoopExit {
        match self.exit.wait_for(|exit| exit.is_some()).await {
            Ok(exit) => exit.clone().unwrap_or(LoopExit::Cancelled),
            // Sender dropped without publishing: the task was aborted
            Err(_) => LoopExit::Cancelled,
        }
    }
}

/// Decode loop configuration
#[derive(Clone)]
pub struct DecodeLoop {
    chain: Arc<StrategyChain>,
    interval: Duration,
    max_dimension: u32,
}

impl DecodeLoop {
    pub fn new(chain: Arc<StrategyChain>) -> Self {
        Self {
            chain,
            interval: FRAME_INTERVAL,
            max_dimension: MAX_DECODE_DIMENSION,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    /// Start decoding frames from `reader` until a symbol decodes
    ///
    /// Must be called from within a tokio runtime.
    pub fn run_until<F>(&self, reader: FrameReader, on_result: F) -> LoopHandle
    where
        F: FnOnce(DecodeResult) + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = watch::channel(None);

        let task_cancel = Arc::clone(&cancel);
        let config = self.clone();
        tokio::spawn(async move {
            let exit = config.iterate(reader, &task_cancel, on_result).await;
            debug!(exit = ?exit, "Decode loop ended");
            let _ = exit_tx.send(Some(exit));
        });

        LoopHandle {
            cancel,
            exit: exit_rx,
        }
    }

    async fn iterate<F>(&self, reader: FrameReader, cancel: &AtomicBool, on_result: F) -> LoopExit
    where
        F: FnOnce(DecodeResult) + Send + 'static,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut iterations = 0u64;

        info!(interval_ms = self.interval.as_millis(), "Decode loop started");

        loop {
            ticker.tick().await;
            if cancel.load(Ordering::SeqCst) {
                return LoopExit::Cancelled;
            }
            iterations += 1;

            let frame = match reader.next_frame() {
                Ok(Some(frame)) => frame,
                // No full frame yet
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, iterations, "Stream ended during decode loop");
                    return LoopExit::StreamEnded(e);
                }
            };

            let chain = Arc::clone(&self.chain);
            let max_dimension = self.max_dimension;
            let attempt = tokio::task::spawn_blocking(move || -> Result<_, DecodeFault> {
                let sampled = sample_frame(&frame, max_dimension)?;
                Ok(chain.run(&sampled))
            })
            .await;

            let result = match attempt {
                Ok(Ok(Some(result))) => result,
                Ok(Ok(None)) => continue,
                Ok(Err(fault)) => {
                    debug!(error = %fault, "Skipping frame");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Decode task panicked");
                    continue;
                }
            };

            if cancel.load(Ordering::SeqCst) {
                debug!("Dropping decode result after cancellation");
                return LoopExit::Cancelled;
            }

            info!(iterations, size_hint = result.size_hint, "Symbol decoded");
            on_result(result);
            return LoopExit::Decoded;
        }
    }
}
