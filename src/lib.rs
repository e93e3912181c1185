// SPDX-License-Identifier: GPL-3.0-only

//! QR check-in - live QR-code acquisition engine
//!
//! Owns a camera device, runs a continuous capture/decode loop and emits
//! one classified scan outcome per session.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Capture backends, device catalog and frame source
//! - [`frame_processor`]: Sampling, decode strategies, decode loop and classifier
//! - [`session`]: Session controller state machine and reporting boundary
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let config = ScannerConfig::load_or_default(None);
//! let controller = SessionController::new(get_backend(&config), config);
//! controller.start().await?;
//! let outcome = controller.scan().await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;
pub mod frame_processor;
pub mod session;

// Re-export commonly used types
pub use backends::camera::{CaptureDevice, DeviceCatalog, FrameSource, get_backend};
pub use config::ScannerConfig;
pub use constants::QualityTier;
pub use errors::{CaptureError, CaptureErrorKind, SessionError};
pub use frame_processor::{Classifier, DecodeResult, ScanOutcome, SemanticType};
pub use session::{SessionController, SessionSnapshot, SessionState};
