//! The seam between the preview logic and whatever actually draws pixels.
//!
//! [`GraphicsContext`] mirrors the stage/program object model of a GL-style
//! API: stages are created, compiled from source, linked and then released
//! individually. The wgpu implementation lives in [`crate::gpu`]; tests use
//! the recording fake in `crate::testing`.

use std::fmt;

use crate::types::CanvasDimensions;
use crate::uniforms::FrameUniforms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Compiler- or driver-native diagnostic. `line` is 1-based and counted in the
/// text that was handed to the stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to create rendering surface: {0}")]
    Surface(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("requested surface {requested} exceeds the GPU limit of {max}px")]
    TooLarge {
        requested: CanvasDimensions,
        max: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("rendering context lost")]
    ContextLost,
    /// The frame could not be presented this time; the next frame may succeed.
    #[error("surface unavailable: {0}")]
    Surface(String),
}

pub trait GraphicsContext {
    type Stage;
    type Program;

    fn create_stage(&mut self, kind: StageKind) -> Result<Self::Stage, Diagnostic>;

    fn compile_stage(&mut self, stage: &mut Self::Stage, source: &str) -> Result<(), Diagnostic>;

    fn link(
        &mut self,
        vertex: &Self::Stage,
        fragment: &Self::Stage,
    ) -> Result<Self::Program, Diagnostic>;

    fn release_stage(&mut self, stage: Self::Stage);

    fn release_program(&mut self, program: Self::Program);

    /// Reconfigures the drawing surface and returns the size actually applied,
    /// which may be clamped by device limits. Never called with a zero-area size.
    fn resize(&mut self, size: CanvasDimensions) -> CanvasDimensions;

    /// Clears the surface and draws one full-screen quad with `program`.
    fn draw(&mut self, program: &Self::Program, uniforms: &FrameUniforms)
        -> Result<(), DrawError>;

    fn is_lost(&self) -> bool;
}
