// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for raw capture buffers
//!
//! V4L2 devices hand out packed YUV, RGB, greyscale or MJPEG buffers. These
//! helpers turn a raw buffer into a `Frame` the decode loop can consume.

use super::types::{Frame, PixelFormat};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// FourCC codes understood by the converters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Mjpeg,
    Yuyv,
    Uyvy,
    Rgb24,
    Grey,
}

impl SourceFormat {
    /// Map a FourCC (as raw bytes) to a source format
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"MJPG" | b"JPEG" => Some(SourceFormat::Mjpeg),
            b"YUYV" | b"YUY2" => Some(SourceFormat::Yuyv),
            b"UYVY" => Some(SourceFormat::Uyvy),
            b"RGB3" => Some(SourceFormat::Rgb24),
            b"GREY" | b"Y800" => Some(SourceFormat::Grey),
            _ => None,
        }
    }

    /// Preference order when negotiating with a device
    pub const PREFERRED: [&'static [u8; 4]; 5] = [b"MJPG", b"YUYV", b"UYVY", b"RGB3", b"GREY"];
}

/// Convert YUYV (YUV 4:2:2) to RGBA
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion. `stride` is the
/// length of one source row in bytes, padding included.
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    packed_422_to_rgba(data, width, height, stride, [0, 1, 2, 3])
}

/// Convert UYVY (YUV 4:2:2) to RGBA
///
/// UYVY format: U0 Y0 V0 Y1 - each 4-byte group encodes 2 pixels.
pub fn uyvy_to_rgba(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    packed_422_to_rgba(data, width, height, stride, [1, 0, 3, 2])
}

/// Packed 4:2:2 to RGBA; `order` gives the byte offsets of [Y0, U, Y1, V]
fn packed_422_to_rgba(
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    order: [usize; 4],
) -> Vec<u8> {
    let width = width as usize;
    let row_bytes = width * 2;
    let stride = (stride as usize).max(row_bytes).max(1);
    let mut rgba = Vec::with_capacity(width * height as usize * 4);

    for row in data.chunks(stride).take(height as usize) {
        let Some(row) = row.get(..row_bytes) else {
            break;
        };
        for chunk in row.chunks_exact(4) {
            let y0 = chunk[order[0]] as f32;
            let u = chunk[order[1]] as f32 - 128.0;
            let y1 = chunk[order[2]] as f32;
            let v = chunk[order[3]] as f32 - 128.0;

            for y in [y0, y1] {
                rgba.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
                rgba.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
                rgba.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
                rgba.push(255);
            }
        }
    }

    rgba
}

/// Decode an MJPEG buffer to RGBA
///
/// Returns the decoded dimensions, which take precedence over the
/// negotiated ones.
pub fn mjpeg_to_rgba(data: &[u8]) -> Option<(u32, u32, Vec<u8>)> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg).ok()?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Some((width, height, rgba.into_raw()))
}

/// Convert a raw capture buffer into a frame
///
/// Returns `None` for truncated or undecodable buffers; the caller drops
/// them and waits for the next one.
pub fn buffer_to_frame(
    format: SourceFormat,
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    sequence: u64,
) -> Option<Frame> {
    let pixels = (width * height) as usize;
    let frame = match format {
        SourceFormat::Mjpeg => {
            let (w, h, rgba) = mjpeg_to_rgba(data)?;
            Frame::from_rgba(w, h, rgba, sequence)
        }
        SourceFormat::Yuyv | SourceFormat::Uyvy => {
            let stride = stride.max(width * 2) as usize;
            let needed = stride * (height as usize).saturating_sub(1) + width as usize * 2;
            if pixels == 0 || data.len() < needed {
                return None;
            }
            let rgba = if format == SourceFormat::Yuyv {
                yuyv_to_rgba(data, width, height, stride as u32)
            } else {
                uyvy_to_rgba(data, width, height, stride as u32)
            };
            if rgba.len() != pixels * 4 {
                return None;
            }
            Frame::from_rgba(width, height, rgba, sequence)
        }
        SourceFormat::Rgb24 => {
            let stride = stride.max(width * 3);
            let frame = Frame {
                width,
                height,
                data: Arc::from(data),
                format: PixelFormat::Rgb24,
                stride,
                sequence,
                captured_at: Instant::now(),
            };
            if !frame.is_complete() {
                return None;
            }
            frame
        }
        SourceFormat::Grey => {
            let stride = stride.max(width);
            let frame = Frame {
                width,
                height,
                data: Arc::from(data),
                format: PixelFormat::Gray8,
                stride,
                sequence,
                captured_at: Instant::now(),
            };
            if !frame.is_complete() {
                return None;
            }
            frame
        }
    };

    trace!(?format, width = frame.width, height = frame.height, sequence, "Converted capture buffer");
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_grey_is_grey() {
        // Two pixels with Y=128, neutral chroma
        let data = [128u8, 128, 128, 128];
        let rgba = yuyv_to_rgba(&data, 2, 1, 4);
        assert_eq!(rgba.len(), 8);
        for px in rgba.chunks_exact(4) {
            assert_eq!(px[0], 128);
            assert_eq!(px[1], 128);
            assert_eq!(px[2], 128);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn test_uyvy_uses_luma_bytes() {
        // U0 Y0 V0 Y1 with Y0 = 0, Y1 = 255
        let data = [128u8, 0, 128, 255];
        let rgba = uyvy_to_rgba(&data, 2, 1, 4);
        assert_eq!(rgba[0], 0);
        assert_eq!(rgba[4], 255);
    }

    #[test]
    fn test_truncated_yuyv_is_dropped() {
        let data = vec![0u8; 6];
        assert!(buffer_to_frame(SourceFormat::Yuyv, &data, 2, 2, 4, 0).is_none());
    }

    #[test]
    fn test_yuyv_skips_row_padding() {
        // 2x2 black frame, each row padded with 4 bright bytes
        let data = [
            0u8, 128, 0, 128, 200, 128, 200, 128, //
            0, 128, 0, 128, 200, 128, 200, 128,
        ];
        let frame = buffer_to_frame(SourceFormat::Yuyv, &data, 2, 2, 8, 0).unwrap();
        assert_eq!(frame.format, PixelFormat::Rgba);
        assert_eq!(frame.data.len(), 16);
        for px in frame.data.chunks_exact(4) {
            assert_eq!(px, [0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_padded_yuyv_without_last_padding_is_accepted() {
        // Last row carries no padding
        let data = [0u8, 128, 255, 128, 9, 9, 9, 9, 255, 128, 0, 128];
        let rgba = yuyv_to_rgba(&data, 2, 2, 8);
        let luma: Vec<u8> = rgba.chunks_exact(4).map(|px| px[0]).collect();
        assert_eq!(luma, vec![0, 255, 255, 0]);
    }

    #[test]
    fn test_grey_frame_keeps_stride() {
        let data = vec![7u8; 12];
        let frame = buffer_to_frame(SourceFormat::Grey, &data, 2, 2, 6, 3).unwrap();
        assert_eq!(frame.format, PixelFormat::Gray8);
        assert_eq!(frame.stride, 6);
        assert_eq!(frame.sequence, 3);
    }

    #[test]
    fn test_fourcc_mapping() {
        assert_eq!(SourceFormat::from_fourcc(b"MJPG"), Some(SourceFormat::Mjpeg));
        assert_eq!(SourceFormat::from_fourcc(b"YUYV"), Some(SourceFormat::Yuyv));
        assert_eq!(SourceFormat::from_fourcc(b"H264"), None);
    }
}
