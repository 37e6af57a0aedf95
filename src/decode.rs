//! Frame payload decoding.

use image::ImageFormat;

use crate::error::DecodeError;
use crate::frame::Image;

/// Turns a frame payload into pixels.
///
/// Implementations must treat the payload as read-only and never attempt to
/// repair it; a bad payload is a `DecodeError`.
pub trait ImageDecoder: Send {
    fn name(&self) -> &'static str;

    fn decode(&mut self, payload: &[u8]) -> Result<Image, DecodeError>;
}

/// JPEG decoder backed by the `image` crate.
#[derive(Clone, Debug, Default)]
pub struct JpegDecoder {
    mirror: bool,
}

impl JpegDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip decoded images horizontally (camera mounted facing the viewer).
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }
}

impl ImageDecoder for JpegDecoder {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn decode(&mut self, payload: &[u8]) -> Result<Image, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        let decoded = image::load_from_memory_with_format(payload, ImageFormat::Jpeg)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let mut rgb = decoded.into_rgb8();
        if self.mirror {
            image::imageops::flip_horizontal_in_place(&mut rgb);
        }
        Ok(rgb)
    }
}

/// Decoder that ignores the payload and returns a solid image.
///
/// Used to exercise the pipeline without real JPEG data.
#[derive(Clone, Debug)]
pub struct SolidDecoder {
    width: u32,
    height: u32,
    rgb: [u8; 3],
}

impl SolidDecoder {
    pub fn new(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self { width, height, rgb }
    }
}

impl ImageDecoder for SolidDecoder {
    fn name(&self) -> &'static str {
        "solid"
    }

    fn decode(&mut self, payload: &[u8]) -> Result<Image, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Image::from_pixel(
            self.width,
            self.height,
            image::Rgb(self.rgb),
        ))
    }
}
