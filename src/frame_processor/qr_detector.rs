// SPDX-License-Identifier: GPL-3.0-only

//! QR symbol decoding
//!
//! The decode strategies hand a greyscale plane to a [`SymbolDecoder`]. The
//! default implementation uses the `rqrr` crate: it locates finder
//! patterns, samples the grid and returns the first symbol that decodes.

use super::types::{DecodeResult, Point, QuadCorners};
use crate::errors::DecodeFault;
use image::GrayImage;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, trace};

/// Decodes at most one symbol from a greyscale image
///
/// Corners are reported in the coordinates of the image passed in.
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, luma: &GrayImage) -> Result<Option<DecodeResult>, DecodeFault>;
}

/// QR decoder backed by `rqrr`
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolDecoder for RqrrDecoder {
    fn decode(&self, luma: &GrayImage) -> Result<Option<DecodeResult>, DecodeFault> {
        // Grid sampling can panic on degenerate perspective estimates
        catch_unwind(AssertUnwindSafe(|| decode_sync(luma))).map_err(|panic| {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            DecodeFault::DecoderFailed(msg)
        })
    }
}

fn decode_sync(luma: &GrayImage) -> Option<DecodeResult> {
    let start = std::time::Instant::now();
    let (width, height) = luma.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| luma.get_pixel(x as u32, y as u32)[0],
    );

    let grids = prepared.detect_grids();
    trace!(count = grids.len(), width, height, "QR grid detection complete");

    for grid in grids {
        match grid.decode() {
            Ok((meta, content)) => {
                let corners = grid.bounds.map(|p| Point::new(p.x as f32, p.y as f32));
                let size_hint = (4 * meta.version.0 + 17) as u32;
                debug!(
                    content = %content,
                    version = meta.version.0,
                    ecc_level = meta.ecc_level,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Decoded QR code"
                );
                return Some(DecodeResult {
                    raw_text: content,
                    geometry: QuadCorners::from_array(corners),
                    size_hint,
                });
            }
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR grid");
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_image_has_no_symbol() {
        let luma = GrayImage::from_pixel(64, 64, image::Luma([255]));
        assert_eq!(RqrrDecoder::new().decode(&luma), Ok(None));
    }

    #[test]
    fn test_tiny_image_does_not_fail() {
        let luma = GrayImage::from_pixel(1, 1, image::Luma([0]));
        assert!(RqrrDecoder::new().decode(&luma).is_ok());
    }
}
