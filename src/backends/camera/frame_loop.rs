// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for hardware capture loops
//!
//! Hardware streams own their device on a dedicated capture thread. The
//! controller here opens the device on that thread, reports the outcome of
//! opening back to the caller, and guarantees that `stop()` returns only
//! after the thread (and with it the device) is gone.

use crate::errors::{CaptureError, CaptureResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Handle given to a capture thread body
///
/// The body reports the outcome of opening its resources exactly once with
/// [`LoopContext::ready`] or [`LoopContext::fail`], then polls
/// [`LoopContext::should_stop`] between captures.
pub struct LoopContext {
    stop_signal: Arc<AtomicBool>,
    init_tx: Option<mpsc::Sender<CaptureResult<()>>>,
    name: String,
}

impl LoopContext {
    /// Whether the owner asked the loop to stop
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }

    /// Report successful initialization; the spawning call returns `Ok`
    pub fn ready(&mut self) {
        if let Some(tx) = self.init_tx.take() {
            let _ = tx.send(Ok(()));
        }
    }

    /// Report failed initialization; the spawning call returns this error
    pub fn fail(&mut self, err: CaptureError) {
        warn!(name = %self.name, error = %err, "Initialization failed");
        if let Some(tx) = self.init_tx.take() {
            let _ = tx.send(Err(err));
        }
    }
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = CaptureLoopController::spawn("v4l2-capture", move |ctx| {
///     let mut dev = match open_device(&path) {
///         Ok(dev) => dev,
///         Err(e) => return ctx.fail(e),
///     };
///     ctx.ready();
///     while !ctx.should_stop() {
///         publish(dev.capture());
///     }
/// })?;
///
/// // Later, stop the loop and close the device
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Run `body` on a new thread and wait for it to report initialization
    ///
    /// Returns the error passed to [`LoopContext::fail`], or an error if the
    /// body returned without reporting at all.
    pub fn spawn<B>(name: &str, body: B) -> CaptureResult<Self>
    where
        B: FnOnce(&mut LoopContext) + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (init_tx, init_rx) = mpsc::channel::<CaptureResult<()>>();
        let mut ctx = LoopContext {
            stop_signal: Arc::clone(&stop_signal),
            init_tx: Some(init_tx),
            name: name.to_string(),
        };

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %ctx.name, "Capture loop thread started");
                body(&mut ctx);
                info!(name = %ctx.name, "Capture loop thread exiting");
            })
            .map_err(|e| CaptureError::unknown(format!("failed to spawn capture thread: {}", e)))?;

        let mut controller = Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        };

        match init_rx.recv() {
            Ok(Ok(())) => Ok(controller),
            Ok(Err(e)) => {
                controller.join();
                Err(e)
            }
            Err(_) => {
                controller.join();
                Err(CaptureError::unknown(
                    "capture thread exited during initialization",
                ))
            }
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if handle.join().is_err() {
                warn!(name = %self.name, "Capture loop thread panicked");
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CaptureErrorKind;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn counting_loop(counter: &Arc<AtomicU32>) -> CaptureLoopController {
        let counter = Arc::clone(counter);
        CaptureLoopController::spawn("test-loop", move |ctx| {
            ctx.ready();
            while !ctx.should_stop() {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
            }
        })
        .unwrap()
    }

    #[test]
    fn test_stop_waits_for_thread() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut controller = counting_loop(&counter);

        thread::sleep(Duration::from_millis(20));
        assert!(controller.is_running());
        controller.stop();

        assert!(!controller.is_running());
        let after_stop = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_init_error_is_returned() {
        let result = CaptureLoopController::spawn("test-fail-init", |ctx| {
            ctx.fail(CaptureError::device_busy("held by another process"));
        });

        let err = result.err().unwrap();
        assert_eq!(err.kind, CaptureErrorKind::DeviceBusy);
    }

    #[test]
    fn test_silent_exit_is_an_error() {
        let result = CaptureLoopController::spawn("test-silent", |_| {});
        let err = result.err().unwrap();
        assert_eq!(err.kind, CaptureErrorKind::Unknown);
    }

    #[test]
    fn test_thread_state_is_dropped_on_stop() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dropped);
        let mut controller = CaptureLoopController::spawn("test-drop", move |ctx| {
            let _device = DropFlag(flag);
            ctx.ready();
            while !ctx.should_stop() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        assert!(!dropped.load(Ordering::SeqCst));
        controller.stop();
        assert!(dropped.load(Ordering::SeqCst));
    }
}
