use std::sync::Arc;

use crate::cache::CacheKey;
use crate::decode::DecodedImage;

use super::{TextureUploader, UploadError};

/// Texture kept in system memory.
#[derive(Debug, Clone)]
pub struct CpuTexture {
    /// Upload sequence number, unique per uploader.
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

/// Software backend that "uploads" by copying pixels into a [`CpuTexture`].
///
/// Used by headless tools when no GPU adapter is available.
#[derive(Debug, Default)]
pub struct CpuUploader {
    next_id: u64,
    max_dimension: Option<u32>,
}

impl CpuUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects images larger than `max` on either side, like a device limit.
    pub fn with_max_dimension(max: u32) -> Self {
        Self {
            next_id: 0,
            max_dimension: Some(max),
        }
    }

    /// Number of successful uploads so far.
    pub fn uploads(&self) -> u64 {
        self.next_id
    }
}

impl TextureUploader for CpuUploader {
    type Texture = CpuTexture;

    fn upload(&mut self, _key: &CacheKey, image: &DecodedImage) -> Result<CpuTexture, UploadError> {
        if let Some(max) = self.max_dimension {
            if image.width() > max || image.height() > max {
                return Err(UploadError::TooLarge {
                    width: image.width(),
                    height: image.height(),
                    max,
                });
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        Ok(CpuTexture {
            id,
            width: image.width(),
            height: image.height(),
            pixels: image.pixels().into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let mut up = CpuUploader::new();
        let img = DecodedImage::solid(1, 1, [0; 4]).unwrap();
        let key = CacheKey::from("a.png");
        assert_eq!(up.upload(&key, &img).unwrap().id, 0);
        assert_eq!(up.upload(&key, &img).unwrap().id, 1);
        assert_eq!(up.uploads(), 2);
    }

    #[test]
    fn max_dimension_is_enforced() {
        let mut up = CpuUploader::with_max_dimension(2);
        let img = DecodedImage::solid(3, 1, [0; 4]).unwrap();
        assert!(up.upload(&CacheKey::from("a.png"), &img).is_err());
        assert_eq!(up.uploads(), 0);
    }
}
