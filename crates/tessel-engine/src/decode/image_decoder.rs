use crate::cache::CacheKey;

use super::{DecodeError, DecodedImage, Decoder};

/// Decoder backed by the `image` crate.
///
/// Supports PNG, JPEG, BMP, GIF (first frame), ICO, TIFF and WebP. The
/// format is sniffed from the bytes, not from the key's extension. Output is
/// always converted to RGBA8.
#[derive(Debug, Default, Copy, Clone)]
pub struct ImageDecoder;

impl ImageDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ImageDecoder {
    fn decode(&self, _key: &CacheKey, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let format = image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat)?;
        let rgba = image::load_from_memory_with_format(bytes, format)?.into_rgba8();
        let (width, height) = rgba.dimensions();
        DecodedImage::from_rgba8(width, height, rgba.into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_to_rgba() {
        let img = ImageDecoder.decode(&CacheKey::from("a.png"), &encode_png(4, 3)).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
        assert_eq!(&img.pixels()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = ImageDecoder.decode(&CacheKey::from("a.png"), &[]).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn garbage_is_unsupported() {
        let err = ImageDecoder
            .decode(&CacheKey::from("a.png"), b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat));
    }

    #[test]
    fn truncated_png_fails() {
        let png = encode_png(8, 8);
        let err = ImageDecoder.decode(&CacheKey::from("a.png"), &png[..png.len() / 2]);
        assert!(err.is_err());
    }
}
