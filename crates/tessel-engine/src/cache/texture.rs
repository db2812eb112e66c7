use std::fmt;
use std::sync::Arc;

use super::CacheKey;

/// A cached, GPU-resident texture.
///
/// `T` is the uploader's backend object (e.g. [`GpuTexture`](crate::upload::GpuTexture)).
pub struct Texture<T> {
    key: CacheKey,
    width: u32,
    height: u32,
    byte_len: usize,
    gpu: T,
}

/// Shared reference to a cached texture.
///
/// The strong count is the reference count: the cache holds one reference
/// per entry, so a count of 1 means nobody outside the cache uses it.
pub type TextureHandle<T> = Arc<Texture<T>>;

impl<T> Texture<T> {
    pub(crate) fn new(key: CacheKey, width: u32, height: u32, byte_len: usize, gpu: T) -> Self {
        Self {
            key,
            width,
            height,
            byte_len,
            gpu,
        }
    }

    /// Key the texture was loaded under.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the uploaded pixel data in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Backend texture object.
    pub fn gpu(&self) -> &T {
        &self.gpu
    }
}

impl<T> fmt::Debug for Texture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("key", &self.key)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
