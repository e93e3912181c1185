// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing: from live frames to a classified scan outcome
//!
//! ```text
//! FrameReader ─► sampling ─► StrategyChain ─► DecodeResult ─► classify ─► ScanOutcome
//!                 (cap,        (normal, inverted,
//!                  luma)        both, enhanced…)
//! ```
//!
//! The decode loop drives the first three stages once per tick until a
//! symbol decodes or the loop is cancelled.

pub mod classify;
pub mod decode_loop;
pub mod qr_detector;
pub mod sampling;
pub mod strategies;
pub mod types;

pub use classify::Classifier;
pub use decode_loop::{DecodeLoop, LoopExit, LoopHandle};
pub use qr_detector::{RqrrDecoder, SymbolDecoder};
pub use strategies::{DecodeStrategy, Polarity, PolarityPass, StrategyChain};
pub use types::{
    DecodeResult, Payload, Point, QuadCorners, ScanOutcome, SemanticType, WifiSecurity,
};
