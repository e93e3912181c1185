// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for capture hardware
//!
//! # Modules
//!
//! - [`camera`]: Camera backends with device enumeration, stream acquisition and frame capture

pub mod camera;
