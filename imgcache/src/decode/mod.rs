//! Turning raw image bytes into decoded images.
//!
//! Decoding is CPU-bound; the pipeline runs [`Decoder::decode`] on Tokio's
//! blocking pool.

use std::sync::Arc;

use tracing::trace;

use crate::error::ImageError;
use crate::source::SourceDescriptor;

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw pixel buffer.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes charged against the memory cache capacity.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Shared, immutable decoded image handed to every waiter.
pub type Artifact = Arc<DecodedImage>;

/// Converts raw bytes into a [`DecodedImage`].
pub trait Decoder: Send + Sync {
    /// Decode `data`, fetched from `source`.
    ///
    /// Malformed input is reported as [`ImageError::Decode`].
    fn decode(&self, data: &[u8], source: &SourceDescriptor) -> Result<DecodedImage, ImageError>;
}

/// Decoder backed by the `image` crate (PNG, JPEG, GIF, BMP, WebP).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl Decoder for ImageDecoder {
    fn decode(&self, data: &[u8], source: &SourceDescriptor) -> Result<DecodedImage, ImageError> {
        let img = image::load_from_memory(data)
            .map_err(|e| ImageError::decode(source.canonical(), e.to_string()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        trace!(source = %source, width, height, "Image decoded");

        Ok(DecodedImage::new(width, height, rgba.into_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let source = SourceDescriptor::url("https://example.com/a.png");
        let decoded = ImageDecoder.decode(&png_bytes(4, 3), &source).unwrap();

        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(decoded.byte_size(), 4 * 3 * 4);
        assert_eq!(&decoded.pixels()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let source = SourceDescriptor::url("https://example.com/a.png");
        let err = ImageDecoder.decode(b"not an image", &source).unwrap_err();

        match err {
            ImageError::Decode { descriptor, .. } => {
                assert_eq!(descriptor, "https://example.com/a.png");
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
