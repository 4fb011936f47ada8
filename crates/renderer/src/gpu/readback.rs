use std::path::Path;
use std::sync::mpsc;

use image::RgbaImage;

use crate::context::GraphicsContext;
use crate::uniforms::FrameUniforms;

use super::context::{create_offscreen_texture, GpuContext, GpuProgram};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("cannot read back frames in {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
    #[error("rendering context lost")]
    ContextLost,
    #[error("failed to map readback buffer: {0}")]
    Map(String),
    #[error("failed to write snapshot to {path}: {source}")]
    Save {
        path: std::path::PathBuf,
        #[source]
        source: image::ImageError,
    },
}

const fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

impl GpuContext {
    /// Renders one frame with `program` into a scratch texture and reads it
    /// back as RGBA8, independent of whether the target is a window.
    pub fn capture(
        &mut self,
        program: &GpuProgram,
        uniforms: &FrameUniforms,
    ) -> Result<RgbaImage, CaptureError> {
        if self.is_lost() {
            return Err(CaptureError::ContextLost);
        }
        let swizzle = match self.format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };

        let width = self.size.width.max(1);
        let height = self.size.height.max(1);
        let texture = create_offscreen_texture(&self.device, self.format, self.size);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("snapshot readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        self.write_uniforms(uniforms);
        let mut encoder = self.encode_draw(&view, program);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| CaptureError::Map(err.to_string()))?;
        receiver
            .recv()
            .map_err(|_| CaptureError::Map("map callback never ran".to_string()))?
            .map_err(|err| CaptureError::Map(err.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        buffer.unmap();

        if swizzle {
            for pixel in pixels.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }
        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| CaptureError::Map("readback size mismatch".to_string()))
    }
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), CaptureError> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| CaptureError::Save {
            path: path.to_path_buf(),
            source,
        })
}
