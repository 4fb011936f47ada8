use std::fmt;
use std::time::Duration;

use sketchbook::ENTRY_POINT;

/// Fragment-shader text that passed the pre-compilation checks: non-blank and
/// mentioning the `mainImage` entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSource {
    #[error("shader source is empty")]
    Empty,
    #[error("shader source does not define `mainImage`")]
    MissingEntryPoint,
}

impl InvalidSource {
    /// Static text shown in place of compiler output.
    pub fn advisory(&self) -> &'static str {
        match self {
            InvalidSource::Empty => "Write a shader to preview it.",
            InvalidSource::MissingEntryPoint => {
                "Invalid shader: define void mainImage(out vec4 fragColor, in vec2 fragCoord)."
            }
        }
    }
}

impl ShaderSource {
    pub fn new(text: impl Into<String>) -> Result<Self, InvalidSource> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(InvalidSource::Empty);
        }
        if !text.contains(ENTRY_POINT) {
            return Err(InvalidSource::MissingEntryPoint);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for ShaderSource {
    type Error = InvalidSource;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for ShaderSource {
    type Error = InvalidSource;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for ShaderSource {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pixel size of a drawing surface. Zero area is legal and skips drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CanvasDimensions {
    pub width: u32,
    pub height: u32,
}

impl CanvasDimensions {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Per-axis maximum of `self` and `floor`.
    pub fn at_least(self, floor: CanvasDimensions) -> Self {
        Self::new(self.width.max(floor.width), self.height.max(floor.height))
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for CanvasDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for CanvasDimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for CanvasDimensions {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Knobs for one preview instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    pub compile_debounce: Duration,
    pub persist_debounce: Duration,
    pub min_canvas: CanvasDimensions,
    /// Report error lines relative to the user's text instead of the wrapped
    /// source.
    pub remap_error_lines: bool,
    pub tool_key: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            compile_debounce: Duration::from_millis(500),
            persist_debounce: Duration::from_secs(1),
            min_canvas: CanvasDimensions::new(300, 300),
            remap_error_lines: true,
            tool_key: "glsl-preview".to_string(),
        }
    }
}
