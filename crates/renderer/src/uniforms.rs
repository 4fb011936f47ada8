use bytemuck::{Pod, Zeroable};

use crate::types::CanvasDimensions;

/// Names the fragment wrapper exposes to user code.
pub const UNIFORM_NAMES: &[&str] = &["iResolution", "iTime", "iMouse"];

/// Per-frame values handed to the shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    /// Pointer input is not tracked; always zero.
    pub mouse: [f32; 2],
}

impl FrameUniforms {
    pub fn new(size: CanvasDimensions, time: f32) -> Self {
        Self {
            resolution: [size.width as f32, size.height as f32],
            time,
            mouse: [0.0, 0.0],
        }
    }

    pub fn to_block(&self) -> PreviewParams {
        PreviewParams {
            resolution: self.resolution,
            time: self.time,
            _padding0: 0.0,
            mouse: self.mouse,
            _padding1: [0.0; 2],
        }
    }
}

/// std140 image of the `PreviewParams` block declared by the wrapper.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PreviewParams {
    pub resolution: [f32; 2],
    pub time: f32,
    pub _padding0: f32,
    pub mouse: [f32; 2],
    pub _padding1: [f32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_matches_std140_layout() {
        assert_eq!(std::mem::size_of::<PreviewParams>(), 32);
        let block = FrameUniforms::new(CanvasDimensions::new(800, 600), 1.5).to_block();
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&block));
        assert_eq!(&floats[..5], &[800.0, 600.0, 1.5, 0.0, 0.0]);
    }

    #[test]
    fn mouse_is_always_zero() {
        let uniforms = FrameUniforms::new(CanvasDimensions::new(10, 10), 3.0);
        assert_eq!(uniforms.mouse, [0.0, 0.0]);
    }
}
