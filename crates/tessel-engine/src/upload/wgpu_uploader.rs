use crate::cache::CacheKey;
use crate::decode::DecodedImage;

use super::{TextureUploader, UploadError};

/// Texture creation parameters.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Texture format. Decoded data is RGBA8, so this must be an RGBA8 variant.
    pub format: wgpu::TextureFormat,

    /// Usage flags. `COPY_DST` is always added.
    pub usage: wgpu::TextureUsages,

    /// Label prefix; the cache key is appended for debugging tools.
    pub label_prefix: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            label_prefix: "tessel texture".to_string(),
        }
    }
}

/// A texture resident on the GPU, with a default view for binding.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Uploads decoded images as 2D textures through wgpu.
///
/// Holds clones of the device and queue; create it from
/// [`GpuContext::uploader`](crate::device::GpuContext::uploader).
pub struct WgpuUploader {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: UploadConfig,
    max_dimension: u32,
}

impl WgpuUploader {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, config: UploadConfig) -> Self {
        let max_dimension = device.limits().max_texture_dimension_2d;
        Self {
            device,
            queue,
            config,
            max_dimension,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }
}

fn extent(image: &DecodedImage) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: image.width(),
        height: image.height(),
        depth_or_array_layers: 1,
    }
}

fn check_limits(image: &DecodedImage, max: u32) -> Result<(), UploadError> {
    if image.width() > max || image.height() > max {
        return Err(UploadError::TooLarge {
            width: image.width(),
            height: image.height(),
            max,
        });
    }
    Ok(())
}

impl TextureUploader for WgpuUploader {
    type Texture = GpuTexture;

    fn upload(&mut self, key: &CacheKey, image: &DecodedImage) -> Result<GpuTexture, UploadError> {
        check_limits(image, self.max_dimension)?;
        if self.config.format.block_copy_size(None) != Some(4) {
            return Err(UploadError::Device(format!(
                "format {:?} cannot hold RGBA8 pixels",
                self.config.format
            )));
        }

        let size = extent(image);
        let label = format!("{} {}", self.config.label_prefix, key);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.config.format,
            usage: self.config.usage | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width() * 4),
                rows_per_image: Some(image.height()),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(GpuTexture { texture, view })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_matches_image() {
        let img = DecodedImage::solid(5, 7, [0; 4]).unwrap();
        let e = extent(&img);
        assert_eq!((e.width, e.height, e.depth_or_array_layers), (5, 7, 1));
    }

    #[test]
    fn oversized_image_is_rejected() {
        let img = DecodedImage::solid(9, 2, [0; 4]).unwrap();
        let err = check_limits(&img, 8).unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { width: 9, height: 2, max: 8 }));
    }

    #[test]
    fn default_format_is_rgba8() {
        let cfg = UploadConfig::default();
        assert_eq!(cfg.format.block_copy_size(None), Some(4));
    }
}
