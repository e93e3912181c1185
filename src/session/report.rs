// SPDX-License-Identifier: GPL-3.0-only

//! Boundary to the "record scan" collaborator
//!
//! A successful scan is reported as `{ identifier, context_id }`. A scan
//! without an identifier, or a session without a context id, is an error;
//! there is no fallback value.

use crate::errors::ReportError;
use crate::frame_processor::ScanOutcome;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Record sent to the reporting collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub identifier: u64,
    pub context_id: u64,
}

impl ScanRecord {
    /// Build the record for a finished scan
    pub fn from_outcome(outcome: &ScanOutcome, context_id: Option<u64>) -> Result<Self, ReportError> {
        let identifier = outcome.extracted_id.ok_or(ReportError::MissingIdentifier)?;
        let context_id = context_id.ok_or(ReportError::MissingContext)?;
        Ok(Self {
            identifier,
            context_id,
        })
    }
}

/// The external "record scan" call
///
/// A non-success response is returned as `ReportError::Rejected`; callers
/// surface it and never retry automatically.
pub trait ScanReporter: Send + Sync {
    fn report(&self, record: ScanRecord) -> BoxFuture<'_, Result<(), ReportError>>;
}

/// Reporter that only logs the record
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ScanReporter for LogReporter {
    fn report(&self, record: ScanRecord) -> BoxFuture<'_, Result<(), ReportError>> {
        Box::pin(async move {
            let json = serde_json::to_string(&record)
                .map_err(|e| ReportError::Transport(e.to_string()))?;
            info!(record = %json, "Scan recorded");
            Ok(())
        })
    }
}
