// SPDX-License-Identifier: GPL-3.0-only

//! Frame preparation for decoding
//!
//! Converts a captured frame to a tightly packed RGBA image no larger than
//! the decode cap, and derives the luma planes the decode strategies work
//! on. All functions are pure.

use crate::backends::camera::{Frame, PixelFormat};
use crate::constants::CONTRAST_PIVOT;
use crate::errors::DecodeFault;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use tracing::trace;

/// A frame downsampled for decoding
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Packed RGBA pixels, both sides within the decode cap
    pub image: RgbaImage,
    /// Native size divided by sampled size (1.0 when not downsampled)
    pub scale: f32,
    /// Sequence number of the source frame
    pub sequence: u64,
}

impl SampledFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Greyscale plane of the sampled image
    pub fn luma(&self) -> GrayImage {
        imageops::grayscale(&self.image)
    }

    /// Greyscale plane of the contrast-enhanced image
    pub fn enhanced_luma(&self, gain: f32) -> GrayImage {
        imageops::grayscale(&enhance_contrast(&self.image, gain))
    }
}

/// Target size so that neither side exceeds `max_dimension`
///
/// Returns the size and the native/sampled scale factor.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32, f32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height, 1.0);
    }
    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).clamp(1, max_dimension);
    let new_height = ((height as f32 / scale) as u32).clamp(1, max_dimension);
    (new_width, new_height, width as f32 / new_width as f32)
}

/// Prepare a frame for the decode strategies
///
/// Fails with `MalformedFrame` when the buffer is shorter than the frame
/// geometry claims.
pub fn sample_frame(frame: &Frame, max_dimension: u32) -> Result<SampledFrame, DecodeFault> {
    if !frame.is_complete() {
        return Err(DecodeFault::MalformedFrame(format!(
            "{}x{} {:?} frame with stride {} has only {} bytes",
            frame.width,
            frame.height,
            frame.format,
            frame.stride,
            frame.data.len()
        )));
    }

    let rgba = to_rgba_image(frame)?;
    let (width, height, scale) = fit_within(frame.width, frame.height, max_dimension.max(1));
    let image = if scale > 1.0 {
        imageops::resize(&rgba, width, height, FilterType::Triangle)
    } else {
        rgba
    };

    trace!(
        sequence = frame.sequence,
        native_width = frame.width,
        native_height = frame.height,
        width,
        height,
        scale,
        "Sampled frame"
    );

    Ok(SampledFrame {
        image,
        scale,
        sequence: frame.sequence,
    })
}

/// Copy frame pixels into a packed RGBA image, dropping stride padding
fn to_rgba_image(frame: &Frame) -> Result<RgbaImage, DecodeFault> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;
    let bpp = frame.format.bytes_per_pixel();

    let mut rgba = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row_start = y * stride;
        let Some(row) = frame.data.get(row_start..row_start + width * bpp) else {
            return Err(DecodeFault::MalformedFrame(format!("row {} out of bounds", y)));
        };
        match frame.format {
            PixelFormat::Rgba => rgba.extend_from_slice(row),
            PixelFormat::Rgb24 => {
                for px in row.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
            }
            PixelFormat::Gray8 => {
                for &v in row {
                    rgba.extend_from_slice(&[v, v, v, 255]);
                }
            }
        }
    }

    RgbaImage::from_raw(frame.width, frame.height, rgba).ok_or_else(|| {
        DecodeFault::UnsupportedFormat(format!("cannot build {}x{} image", width, height))
    })
}

/// Apply `v' = clamp((v - 128) * gain + 128)` to the colour channels
///
/// Alpha is left untouched.
pub fn enhance_contrast(image: &RgbaImage, gain: f32) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            let v = (*channel as f32 - CONTRAST_PIVOT) * gain + CONTRAST_PIVOT;
            *channel = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Inverted copy of a luma plane (dark modules become light)
pub fn inverted(luma: &GrayImage) -> GrayImage {
    let mut out = luma.clone();
    imageops::invert(&mut out);
    out
}
