// SPDX-License-Identifier: GPL-3.0-only

//! Session controller
//!
//! Orchestrates catalog, frame source, decode loop and classifier as an
//! explicit state machine. The controller is the only owner of the live
//! stream. Every exit path goes through one idempotent teardown that
//! cancels the decode loop, releases the stream and clears the handles,
//! strictly in that order, before a terminal state is published.
//!
//! Work after `start` is carried by a per-session driver task: it waits for
//! the first usable frame, starts the decode loop, and finalizes the
//! session when the loop decodes a symbol or the stream ends.

use super::report::{ScanRecord, ScanReporter};
use super::state::{SessionSnapshot, SessionState};
use crate::backends::camera::{
    CaptureBackend, CaptureDevice, DeviceCatalog, FacingMode, FrameReader, FrameSource,
    StreamHandle,
};
use crate::config::ScannerConfig;
use crate::constants::QualityTier;
use crate::errors::{CaptureError, CaptureResult, SessionError, SessionResult};
use crate::frame_processor::{
    Classifier, DecodeLoop, DecodeResult, LoopExit, LoopHandle, RqrrDecoder, ScanOutcome,
    StrategyChain, SymbolDecoder,
};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Mutable session state, guarded by one async mutex
struct Core {
    session_id: Uuid,
    state: SessionState,
    catalog: DeviceCatalog,
    device: Option<CaptureDevice>,
    quality: QualityTier,
    facing: FacingMode,
    flash_on: bool,
    error: Option<CaptureError>,
    outcome: Option<ScanOutcome>,
    last_terminal: Option<SessionState>,
    handle: Option<StreamHandle>,
    decode: Option<LoopHandle>,
    driver: Option<JoinHandle<()>>,
}

struct Inner {
    source: FrameSource,
    config: ScannerConfig,
    classifier: Classifier,
    decode_loop: DecodeLoop,
    core: Mutex<Core>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

/// QR acquisition session controller
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Controller using the `rqrr` decoder
    pub fn new(backend: Arc<dyn CaptureBackend>, config: ScannerConfig) -> Self {
        Self::with_decoder(backend, config, Arc::new(RqrrDecoder::new()))
    }

    /// Controller running the standard strategies over `decoder`
    pub fn with_decoder(
        backend: Arc<dyn CaptureBackend>,
        config: ScannerConfig,
        decoder: Arc<dyn SymbolDecoder>,
    ) -> Self {
        let chain = StrategyChain::standard(decoder, config.contrast_gain);
        Self::with_chain(backend, config, chain)
    }

    /// Controller with a custom strategy chain
    pub fn with_chain(
        backend: Arc<dyn CaptureBackend>,
        config: ScannerConfig,
        chain: StrategyChain,
    ) -> Self {
        let decode_loop = DecodeLoop::new(Arc::new(chain))
            .with_interval(config.frame_interval())
            .with_max_dimension(config.max_decode_dimension);
        let classifier = Classifier::new(config.identifier_keys.iter().cloned());

        let core = Core {
            session_id: Uuid::nil(),
            state: SessionState::Idle,
            catalog: DeviceCatalog::new(Arc::clone(&backend)),
            device: None,
            quality: config.quality,
            facing: config.facing,
            flash_on: false,
            error: None,
            outcome: None,
            last_terminal: None,
            handle: None,
            decode: None,
            driver: None,
        };
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::new(config.quality));

        Self {
            inner: Arc::new(Inner {
                source: FrameSource::new(backend),
                config,
                classifier,
                decode_loop,
                core: Mutex::new(core),
                snapshot_tx,
            }),
        }
    }

    /// Observe the session
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.snapshot_tx.borrow().state
    }

    /// Number of live hardware streams (0 or 1)
    pub fn live_streams(&self) -> usize {
        self.inner.source.live_streams()
    }

    /// Enumerate and classify devices
    ///
    /// Does not touch a live session.
    pub async fn list_devices(&self) -> CaptureResult<Vec<CaptureDevice>> {
        let mut core = self.inner.core.lock().await;
        enumerate(&mut core).await
    }

    /// Select the device used by the next `start`
    ///
    /// Only valid while no session is active.
    pub async fn select_device(&self, id: &str) -> SessionResult<()> {
        let mut core = self.inner.core.lock().await;
        if core.state.is_active() {
            return Err(invalid("select a device", core.state));
        }
        if core.catalog.find(id).is_none() {
            enumerate(&mut core).await?;
        }
        let device = core
            .catalog
            .find(id)
            .cloned()
            .ok_or_else(|| CaptureError::device_not_found(format!("no device {}", id)))?;
        info!(device = %device.id, role = %device.role, "Device selected");
        core.device = Some(device);
        self.inner.publish(&core);
        Ok(())
    }

    /// Start a session: acquire a stream and begin scanning
    ///
    /// Returns once the stream is live. On failure the session has already
    /// been torn down and is back in `Idle`.
    pub async fn start(&self) -> SessionResult<()> {
        let mut core = self.inner.core.lock().await;
        self.inner.start_locked(&mut core).await
    }

    /// Stop the active session, if any
    pub async fn stop(&self) -> SessionResult<()> {
        self.teardown().await;
        Ok(())
    }

    /// Idempotent forced teardown
    ///
    /// Cancels the decode loop, releases the stream and clears all handles.
    /// An active session ends as `Stopped`.
    pub async fn teardown(&self) {
        let mut core = self.inner.core.lock().await;
        if core.state.is_active() {
            self.inner.stop_locked(&mut core).await;
        } else {
            self.inner.teardown_locked(&mut core, false).await;
        }
    }

    /// Wait for the current session to finish
    ///
    /// Returns the outcome on `Success`, the capture error on `Error` and
    /// `Cancelled` on `Stopped`. If the last session already finished its
    /// result is returned immediately. Dropping the future does not affect
    /// the session.
    pub async fn scan(&self) -> SessionResult<ScanOutcome> {
        let mut rx = self.subscribe();
        let (id, state, last) = {
            let snap = rx.borrow();
            (snap.session_id, snap.state, snap.last_terminal)
        };
        if !state.is_active() && last.is_none() {
            return Err(invalid("scan", state));
        }

        let snap = match rx.wait_for(|s| s.finished(id)).await {
            Ok(snap) => snap.clone(),
            Err(_) => return Err(SessionError::Cancelled),
        };

        match snap.last_terminal {
            Some(SessionState::Success) => snap.outcome.ok_or(SessionError::Cancelled),
            Some(SessionState::Error) => Err(snap
                .error
                .map(SessionError::Capture)
                .unwrap_or(SessionError::Cancelled)),
            _ => Err(SessionError::Cancelled),
        }
    }

    /// Wait for the outcome and hand it to the reporting collaborator
    ///
    /// A missing identifier or context id is an error. A rejected report is
    /// returned as is; there is no automatic retry.
    pub async fn scan_and_report(
        &self,
        reporter: &dyn ScanReporter,
    ) -> SessionResult<(ScanOutcome, ScanRecord)> {
        let outcome = self.scan().await?;
        let record = ScanRecord::from_outcome(&outcome, self.inner.config.context_id)?;
        if let Err(e) = reporter.report(record).await {
            warn!(error = %e, identifier = record.identifier, "Scan report failed");
            return Err(e.into());
        }
        info!(
            identifier = record.identifier,
            context_id = record.context_id,
            "Scan reported"
        );
        Ok((outcome, record))
    }

    /// Switch to the next device in catalog order
    ///
    /// Valid from `Streaming` or `Scanning`. The current stream is fully
    /// released before the next one is requested.
    pub async fn switch_camera(&self) -> SessionResult<()> {
        let mut core = self.inner.core.lock().await;
        if !matches!(core.state, SessionState::Streaming | SessionState::Scanning) {
            return Err(invalid("switch camera", core.state));
        }

        let current = core.device.as_ref().map(|d| d.id.clone());
        self.inner.stop_locked(&mut core).await;

        let next = match &current {
            Some(id) => core.catalog.next_after(id).cloned(),
            None => core.catalog.devices().first().cloned(),
        };
        info!(
            from = current.as_deref().unwrap_or("-"),
            to = next.as_ref().map(|d| d.id.as_str()).unwrap_or("-"),
            "Switching camera"
        );
        core.device = next;
        self.inner.publish(&core);

        tokio::time::sleep(self.inner.config.settle_delay()).await;
        self.inner.start_locked(&mut core).await
    }

    /// Change the quality tier
    ///
    /// An active session is stopped, the tier applied and the session
    /// restarted after the settle delay.
    pub async fn change_quality(&self, quality: QualityTier) -> SessionResult<()> {
        let mut core = self.inner.core.lock().await;
        let was_active = core.state.is_active();
        if was_active {
            self.inner.stop_locked(&mut core).await;
        }

        info!(from = %core.quality, to = %quality, restart = was_active, "Quality changed");
        core.quality = quality;
        self.inner.publish(&core);

        if was_active {
            tokio::time::sleep(self.inner.config.settle_delay()).await;
            self.inner.start_locked(&mut core).await?;
        }
        Ok(())
    }

    /// Forced teardown plus the settle delay, after a `DeviceBusy` failure
    pub async fn retry_after_busy_error(&self) -> SessionResult<()> {
        let mut core = self.inner.core.lock().await;
        if core.state.is_active() {
            self.inner.stop_locked(&mut core).await;
        } else {
            self.inner.teardown_locked(&mut core, false).await;
        }
        core.error = None;
        core.last_terminal = None;
        self.inner.publish(&core);

        let delay = self.inner.config.settle_delay();
        debug!(delay_ms = delay.as_millis(), "Waiting for hardware release");
        tokio::time::sleep(delay).await;
        info!("Ready to retry");
        Ok(())
    }

    /// Switch the torch, best-effort
    ///
    /// Returns `false` without a live stream or torch.
    pub async fn set_torch(&self, on: bool) -> bool {
        let mut core = self.inner.core.lock().await;
        let applied = self.inner.source.apply_torch(core.handle.as_ref(), on);
        if applied {
            core.flash_on = on;
            self.inner.publish(&core);
        }
        applied
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // Driver tasks hold the inner state; stop them and free the device
        let Ok(mut core) = self.inner.core.try_lock() else {
            warn!("Session busy while dropping controller");
            return;
        };
        if let Some(decode) = core.decode.take() {
            decode.cancel();
        }
        if let Some(driver) = core.driver.take() {
            driver.abort();
        }
        if let Some(handle) = core.handle.take() {
            self.inner.source.release(Some(&handle));
        }
    }
}

fn invalid(operation: &'static str, state: SessionState) -> SessionError {
    SessionError::InvalidState {
        operation,
        state: state.to_string(),
    }
}

/// Re-enumerate on the blocking pool and refresh the catalog
async fn enumerate(core: &mut Core) -> CaptureResult<Vec<CaptureDevice>> {
    let backend = core.catalog.backend();
    let raw = tokio::task::spawn_blocking(move || backend.enumerate_devices())
        .await
        .unwrap_or_else(|e| Err(CaptureError::unknown(format!("enumeration task failed: {}", e))))?;
    Ok(core.catalog.update(&raw))
}

impl Inner {
    fn publish(&self, core: &Core) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            session_id: core.session_id,
            state: core.state,
            device: core.device.clone(),
            quality: core.quality,
            flash_on: core.flash_on,
            error: core.error.clone(),
            outcome: core.outcome.clone(),
            last_terminal: core.last_terminal,
        });
    }

    fn set_state(&self, core: &mut Core, state: SessionState) {
        if core.state != state {
            info!(
                session = %core.session_id,
                from = %core.state,
                to = %state,
                "Session state changed"
            );
        }
        core.state = state;
        self.publish(core);
    }

    /// Publish the terminal state, then come to rest in `Idle`
    ///
    /// Callers must have torn the session down first.
    fn finish_locked(
        &self,
        core: &mut Core,
        terminal: SessionState,
        error: Option<CaptureError>,
        outcome: Option<ScanOutcome>,
    ) {
        debug_assert!(terminal.is_terminal());
        core.last_terminal = Some(terminal);
        core.error = error;
        core.outcome = outcome;
        self.set_state(core, terminal);
        self.set_state(core, SessionState::Idle);
    }

    /// Cancel loop, release stream, clear handles
    ///
    /// `from_driver` is set when the session's own driver task calls this,
    /// which must not abort itself.
    async fn teardown_locked(&self, core: &mut Core, from_driver: bool) {
        if let Some(decode) = core.decode.take() {
            let exit = decode.cancel_and_wait().await;
            debug!(session = %core.session_id, exit = ?exit, "Decode loop cancelled");
        }

        if let Some(driver) = core.driver.take()
            && !from_driver
        {
            driver.abort();
        }

        if let Some(handle) = core.handle.take() {
            let source = self.source.clone();
            let released = handle.clone();
            if let Err(e) =
                tokio::task::spawn_blocking(move || source.release(Some(&released))).await
            {
                error!(error = %e, "Release task failed, releasing inline");
                self.source.release(Some(&handle));
            }
        }

        core.flash_on = false;
    }

    async fn stop_locked(&self, core: &mut Core) {
        self.teardown_locked(core, false).await;
        self.finish_locked(core, SessionState::Stopped, None, None);
    }

    async fn fail_locked(&self, core: &mut Core, err: CaptureError) -> SessionResult<()> {
        warn!(session = %core.session_id, error = %err, "Session failed");
        self.teardown_locked(core, false).await;
        self.finish_locked(core, SessionState::Error, Some(err.clone()), None);
        Err(SessionError::Capture(err))
    }

    /// Re-enumerate and pick the device to acquire
    ///
    /// Keeps the selected device if it is still present, otherwise falls
    /// back to the default selection. `None` means acquire by facing.
    async fn resolve_device(&self, core: &mut Core) -> CaptureResult<Option<CaptureDevice>> {
        enumerate(core).await?;

        if let Some(selected) = &core.device {
            if let Some(present) = core.catalog.find(&selected.id) {
                return Ok(Some(present.clone()));
            }
            warn!(device = %selected.id, "Selected device vanished, using default");
        }

        Ok(core
            .catalog
            .default_device(self.config.preferred_device.as_deref())
            .cloned())
    }

    async fn start_locked(self: &Arc<Self>, core: &mut Core) -> SessionResult<()> {
        if core.state.is_active() {
            return Err(invalid("start", core.state));
        }

        core.session_id = Uuid::new_v4();
        core.error = None;
        core.outcome = None;
        core.last_terminal = None;
        self.set_state(core, SessionState::Requesting);

        let device = match self.resolve_device(core).await {
            Ok(device) => device,
            Err(e) => return self.fail_locked(core, e).await,
        };
        core.device = device.clone();
        self.publish(core);

        let source = self.source.clone();
        let quality = core.quality;
        let facing = core.facing;
        let acquired = tokio::task::spawn_blocking(move || {
            source.acquire(device.as_ref(), quality, facing)
        })
        .await
        .unwrap_or_else(|e| Err(CaptureError::unknown(format!("acquire task failed: {}", e))));

        let handle = match acquired {
            Ok(handle) => handle,
            Err(e) => return self.fail_locked(core, e).await,
        };

        if core.device.as_ref().map(|d| d.id.as_str()) != Some(handle.device_id()) {
            core.device = core.catalog.find(handle.device_id()).cloned();
        }
        let reader = handle.reader();
        core.handle = Some(handle);
        self.set_state(core, SessionState::Streaming);

        let driver = tokio::spawn(Arc::clone(self).drive(core.session_id, reader));
        core.driver = Some(driver);
        Ok(())
    }

    /// Per-session driver: first frame, decode loop, finalization
    async fn drive(self: Arc<Self>, session_id: Uuid, reader: FrameReader) {
        let interval = self.config.frame_interval();
        loop {
            match reader.poll_ready() {
                Ok(true) => break,
                Ok(false) => tokio::time::sleep(interval).await,
                Err(e) => {
                    self.finish_from_driver(session_id, Err(e)).await;
                    return;
                }
            }
        }

        let (result_tx, result_rx) = oneshot::channel();
        let watcher = {
            let mut core = self.core.lock().await;
            if core.session_id != session_id || core.state != SessionState::Streaming {
                return;
            }
            let handle = self.decode_loop.run_until(reader, move |result| {
                let _ = result_tx.send(result);
            });
            let watcher = handle.watcher();
            core.decode = Some(handle);
            self.set_state(&mut core, SessionState::Scanning);
            watcher
        };

        match watcher.wait().await {
            LoopExit::Decoded => match result_rx.await {
                Ok(result) => self.finish_from_driver(session_id, Ok(result)).await,
                Err(_) => warn!(session = %session_id, "Decode result was lost"),
            },
            LoopExit::StreamEnded(e) => self.finish_from_driver(session_id, Err(e)).await,
            LoopExit::Cancelled => {}
        }
    }

    async fn finish_from_driver(&self, session_id: Uuid, result: Result<DecodeResult, CaptureError>) {
        let mut core = self.core.lock().await;
        if core.session_id != session_id || !core.state.is_active() {
            debug!(session = %session_id, "Session already finished");
            return;
        }

        self.teardown_locked(&mut core, true).await;
        match result {
            Ok(decoded) => {
                let outcome = self.classifier.classify(&decoded);
                info!(
                    session = %session_id,
                    semantic_type = %outcome.semantic_type,
                    extracted_id = ?outcome.extracted_id,
                    "Scan succeeded"
                );
                self.finish_locked(&mut core, SessionState::Success, None, Some(outcome));
            }
            Err(e) => {
                warn!(session = %session_id, error = %e, "Stream interrupted");
                self.finish_locked(&mut core, SessionState::Error, Some(e), None);
            }
        }
    }
}
