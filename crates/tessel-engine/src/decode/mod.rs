//! CPU-side image decoding.
//!
//! Decoding never touches GPU state, so it is the step the texture cache runs
//! on its worker thread.

mod image_decoder;

pub use image_decoder::ImageDecoder;

use crate::cache::CacheKey;

/// Failure to turn raw bytes into pixels.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty input")]
    Empty,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// A decoded image, tightly packed RGBA8, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DecodedImage {
    /// Wraps RGBA8 pixels. Fails if either side is zero or the buffer length
    /// is not `width * height * 4`.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4));
        if width == 0 || height == 0 || expected != Some(pixels.len()) {
            return Err(DecodeError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height, pixels })
    }

    /// A `width` x `height` image filled with one RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, DecodeError> {
        let count = (width as usize) * (height as usize);
        let pixels = rgba.iter().copied().cycle().take(count * 4).collect();
        Self::from_rgba8(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Size of the pixel data in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Synchronous, stateless decoder.
///
/// Called from the decode worker and from `load_sync`, possibly at the same
/// time, hence `Send + Sync`. `key` is informational (format hints, logs).
pub trait Decoder: Send + Sync {
    fn decode(&self, key: &CacheKey, bytes: &[u8]) -> Result<DecodedImage, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&CacheKey, &[u8]) -> Result<DecodedImage, DecodeError> + Send + Sync,
{
    fn decode(&self, key: &CacheKey, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        self(key, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(DecodedImage::from_rgba8(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn rejects_zero_size() {
        assert!(DecodedImage::from_rgba8(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn solid_fills_every_pixel() {
        let img = DecodedImage::solid(3, 2, [1, 2, 3, 4]).unwrap();
        assert_eq!(img.byte_len(), 24);
        assert!(img.pixels().chunks(4).all(|px| px == [1, 2, 3, 4]));
    }

    #[test]
    fn closures_are_decoders() {
        let dec = |_: &CacheKey, bytes: &[u8]| DecodedImage::solid(1, 1, [bytes[0], 0, 0, 255]);
        let img = dec.decode(&CacheKey::from("x"), &[7]).unwrap();
        assert_eq!(img.pixels()[0], 7);
    }
}
