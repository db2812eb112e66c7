//! GPU upload of decoded images.
//!
//! Upload is the only step that creates GPU resources. The texture cache
//! calls it exclusively from the thread that owns the cache (and therefore
//! the render context), never from the decode worker.

mod cpu;
mod wgpu_uploader;

pub use cpu::{CpuTexture, CpuUploader};
pub use wgpu_uploader::{GpuTexture, UploadConfig, WgpuUploader};

use crate::cache::CacheKey;
use crate::decode::DecodedImage;

/// Failure to create a GPU resource from a decoded image.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("texture {width}x{height} exceeds the device limit of {max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("device rejected texture: {0}")]
    Device(String),
}

/// Turns decoded pixels into a backend texture object.
///
/// `Texture` is what the cache stores and hands out (wrapped in
/// [`Texture`](crate::cache::Texture)). It must be `Send + Sync` because the
/// cache table is shared, behind a lock, with the decode worker.
pub trait TextureUploader {
    type Texture: Send + Sync + 'static;

    fn upload(&mut self, key: &CacheKey, image: &DecodedImage) -> Result<Self::Texture, UploadError>;
}
