//! Live GLSL preview renderer for shadepad.
//!
//! The crate turns editor text into pixels. The flow is:
//!
//! ```text
//!   editor text ──▶ PreviewShell ──(debounce)──▶ RenderLoop::submit
//!                        │                            │ compile()
//!                        │ drafts                     ▼
//!                        ▼                     GraphicsContext (wgpu)
//!                   DraftStore                        │
//!                                 FrameScheduler ──▶ on_frame() ─▶ draw
//! ```
//!
//! `PreviewShell` owns the text, the debounce timers and the draft store.
//! `RenderLoop` owns the single active program and at most one pending frame.
//! `compile` wraps a `mainImage` entry point with the fixed preamble and
//! footer and builds a program through the [`GraphicsContext`] seam, which the
//! [`gpu`] module implements on top of `wgpu` and the tests implement with a
//! fake. [`window`] hosts everything in a winit event loop.

mod canvas;
mod clock;
mod compile;
mod context;
mod frame;
pub mod gpu;
mod render_loop;
mod shell;
mod types;
mod uniforms;
pub mod window;

#[cfg(test)]
mod testing;

pub use canvas::{Canvas, CanvasError};
pub use clock::RenderClock;
pub use compile::{
    compile, preamble_lines, sanitize, CompilationResult, CompileError, CompileStage,
    CompiledProgram, WrappedFragment,
};
pub use context::{ContextError, Diagnostic, DrawError, GraphicsContext, StageKind};
pub use frame::{FrameHandle, FrameScheduler, PacedScheduler};
pub use render_loop::{FrameOutcome, LoopState, LoopStats, RenderLoop};
pub use shell::{PollOutcome, PreviewShell, PreviewStatus};
pub use types::{CanvasDimensions, InvalidSource, PreviewConfig, ShaderSource};
pub use uniforms::{FrameUniforms, UNIFORM_NAMES};
pub use window::{HostEvent, PreviewHost, WindowOptions};
