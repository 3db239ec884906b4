//! services/checkin/src/adapters/qr_decoder.rs
//!
//! This module contains the QR decoding adapter. It implements the `QrDecoder`
//! port with `rqrr` for grid detection and `image` for loading still images.

use attendance_core::ports::{PortError, PortResult, QrDecoder};
use attendance_core::Frame;
use tracing::trace;

/// Decodes the first readable QR grid in a greyscale buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_luma(width: usize, height: usize, luma: &[u8]) -> Option<String> {
        if width == 0 || height == 0 || luma.len() < width * height {
            return None;
        }
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => return Some(content),
                Err(e) => trace!("QR grid found but not decodable: {:?}", e),
            }
        }
        None
    }
}

impl QrDecoder for RqrrDecoder {
    fn decode_frame(&self, frame: &Frame) -> PortResult<Option<String>> {
        Ok(Self::decode_luma(
            frame.width as usize,
            frame.height as usize,
            &frame.luma,
        ))
    }

    fn decode_image(&self, image: &[u8]) -> PortResult<Option<String>> {
        let img = image::load_from_memory(image)
            .map_err(|e| PortError::Unexpected(format!("Unreadable image: {}", e)))?;
        let grey = img.to_luma8();
        let (width, height) = grey.dimensions();
        Ok(Self::decode_luma(
            width as usize,
            height as usize,
            grey.as_raw(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frame_has_no_code() {
        let frame = Frame {
            width: 64,
            height: 64,
            luma: vec![255; 64 * 64],
        };
        assert_eq!(RqrrDecoder::new().decode_frame(&frame).unwrap(), None);
    }

    #[test]
    fn short_buffer_is_treated_as_empty() {
        let frame = Frame {
            width: 10,
            height: 10,
            luma: vec![0; 5],
        };
        assert_eq!(RqrrDecoder::new().decode_frame(&frame).unwrap(), None);
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(RqrrDecoder::new().decode_image(b"not an image").is_err());
    }
}
