// SPDX-License-Identifier: GPL-3.0-only

//! Capture session: state machine, observation and reporting

pub mod controller;
pub mod report;
pub mod state;

pub use controller::SessionController;
pub use report::{LogReporter, ScanRecord, ScanReporter};
pub use state::{SessionSnapshot, SessionState};
