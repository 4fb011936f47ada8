use std::fmt;

use tracing::debug;

use crate::context::{Diagnostic, GraphicsContext, StageKind};
use crate::types::ShaderSource;
use crate::uniforms::UNIFORM_NAMES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileStage {
    Vertex,
    Fragment,
    Link,
    /// The context refused to hand out a stage object at all.
    StageCreation,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileStage::Vertex => f.write_str("vertex shader"),
            CompileStage::Fragment => f.write_str("fragment shader"),
            CompileStage::Link => f.write_str("link"),
            CompileStage::StageCreation => f.write_str("shader creation"),
        }
    }
}

/// First failure of a compilation attempt. `message` is the native diagnostic
/// text, untouched; `line` is in wrapped-source coordinates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} error: {message}")]
pub struct CompileError {
    pub stage: CompileStage,
    pub message: String,
    pub line: Option<u32>,
    user_line: Option<u32>,
}

impl CompileError {
    fn from_diagnostic(stage: CompileStage, diagnostic: Diagnostic) -> Self {
        Self {
            stage,
            message: diagnostic.message,
            line: diagnostic.line,
            user_line: None,
        }
    }

    pub(crate) fn context_lost() -> Self {
        Self {
            stage: CompileStage::StageCreation,
            message: "rendering context lost".to_string(),
            line: None,
            user_line: None,
        }
    }

    /// Line in the user's own text, or `None` when the error is not inside it.
    pub fn user_line(&self) -> Option<u32> {
        self.user_line
    }

    pub fn display_line(&self, remap: bool) -> Option<u32> {
        if remap {
            self.user_line
        } else {
            self.line
        }
    }

    /// One-line rendering for status bars and window titles.
    pub fn summary(&self, remap: bool) -> String {
        let first = self.message.lines().next().unwrap_or_default().trim();
        match self.display_line(remap) {
            Some(line) => format!("line {line}: {first}"),
            None => format!("{}: {first}", self.stage),
        }
    }
}

/// A linked program together with the uniform names its wrapper declares.
#[derive(Debug)]
pub struct CompiledProgram<P> {
    program: P,
    uniforms: &'static [&'static str],
}

impl<P> CompiledProgram<P> {
    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn uniforms(&self) -> &'static [&'static str] {
        self.uniforms
    }

    pub fn into_inner(self) -> P {
        self.program
    }
}

#[derive(Debug)]
pub enum CompilationResult<P> {
    Success(CompiledProgram<P>),
    Failure(CompileError),
}

impl<P> CompilationResult<P> {
    pub fn into_result(self) -> Result<CompiledProgram<P>, CompileError> {
        match self {
            CompilationResult::Success(program) => Ok(program),
            CompilationResult::Failure(err) => Err(err),
        }
    }
}

/// Compiles the fixed vertex stage and the wrapped user fragment stage, then
/// links them. Stops at the first failing step and releases every stage
/// object it created, on success and on failure.
pub fn compile<C: GraphicsContext>(
    source: &ShaderSource,
    context: &mut C,
) -> CompilationResult<C::Program> {
    let wrapped = WrappedFragment::new(source);

    let mut vertex = match context.create_stage(StageKind::Vertex) {
        Ok(stage) => stage,
        Err(diag) => return failure(CompileStage::StageCreation, diag),
    };
    if let Err(diag) = context.compile_stage(&mut vertex, VERTEX_SHADER) {
        context.release_stage(vertex);
        return failure(CompileStage::Vertex, diag);
    }

    let mut fragment = match context.create_stage(StageKind::Fragment) {
        Ok(stage) => stage,
        Err(diag) => {
            context.release_stage(vertex);
            return failure(CompileStage::StageCreation, diag);
        }
    };
    if let Err(diag) = context.compile_stage(&mut fragment, wrapped.text()) {
        context.release_stage(fragment);
        context.release_stage(vertex);
        let mut err = CompileError::from_diagnostic(CompileStage::Fragment, diag);
        err.user_line = err.line.and_then(|line| wrapped.user_line(line));
        debug!(line = ?err.line, user_line = ?err.user_line, "fragment stage rejected");
        return CompilationResult::Failure(err);
    }

    let linked = context.link(&vertex, &fragment);
    context.release_stage(fragment);
    context.release_stage(vertex);
    match linked {
        Ok(program) => CompilationResult::Success(CompiledProgram {
            program,
            uniforms: UNIFORM_NAMES,
        }),
        Err(diag) => failure(
            CompileStage::Link,
            Diagnostic {
                line: None,
                ..diag
            },
        ),
    }
}

fn failure<P>(stage: CompileStage, diag: Diagnostic) -> CompilationResult<P> {
    debug!(%stage, message = %diag.message, "shader compilation failed");
    CompilationResult::Failure(CompileError::from_diagnostic(stage, diag))
}

/// User text embedded between [`HEADER`] and [`FOOTER`], sanitized so that
/// every user line keeps its position relative to the preamble.
#[derive(Debug, Clone)]
pub struct WrappedFragment {
    text: String,
    user_lines: u32,
}

impl WrappedFragment {
    pub fn new(source: &ShaderSource) -> Self {
        let sanitized = sanitize(source.as_str());
        let user_lines = sanitized.lines().count() as u32;
        Self {
            text: format!("{HEADER}{sanitized}{FOOTER}"),
            user_lines,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn user_line(&self, wrapped_line: u32) -> Option<u32> {
        let preamble = preamble_lines();
        if wrapped_line <= preamble {
            return None;
        }
        let line = wrapped_line - preamble;
        (line <= self.user_lines).then_some(line)
    }
}

/// Number of wrapper lines ahead of the first user line.
pub fn preamble_lines() -> u32 {
    HEADER.lines().count() as u32
}

/// Blanks out a leading `#version` directive and user declarations of the
/// uniforms the wrapper already provides. Removed lines become empty lines.
pub fn sanitize(source: &str) -> String {
    let mut sanitized = String::with_capacity(source.len());
    let mut seen_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        let is_version = !seen_version && trimmed.starts_with("#version");
        seen_version |= is_version;
        if !is_version && !redeclares_builtin(trimmed) {
            sanitized.push_str(line);
        }
        sanitized.push('\n');
    }
    sanitized
}

fn redeclares_builtin(trimmed: &str) -> bool {
    if !trimmed.starts_with("uniform ") {
        return false;
    }
    trimmed
        .split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .any(|token| UNIFORM_NAMES.contains(&token))
}

/// Prologue placed ahead of the user's text. The block layout must match
/// [`crate::uniforms::PreviewParams`].
pub const HEADER: &str = r"#version 450
layout(location = 0) out vec4 shadepad_color;

layout(std140, set = 0, binding = 0) uniform PreviewParams {
    vec2 _iResolution;
    float _iTime;
    vec2 _iMouse;
} shadepad_params;

#define iResolution shadepad_params._iResolution
#define iTime shadepad_params._iTime
#define iMouse shadepad_params._iMouse
";

/// Epilogue: flips to a bottom-left origin and calls `mainImage`.
pub const FOOTER: &str = r"
void main() {
    vec2 fragCoord = vec2(gl_FragCoord.x, iResolution.y - gl_FragCoord.y);
    vec4 color = vec4(0.0, 0.0, 0.0, 1.0);
    mainImage(color, fragCoord);
    shadepad_color = color;
}
";

/// Full-screen quad as two triangles, positions indexed by `gl_VertexIndex`.
pub const VERTEX_SHADER: &str = r"#version 450

const vec2 positions[6] = vec2[6](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    gl_Position = vec4(positions[vertex_index], 0.0, 1.0);
}
";

/// Vertices drawn per frame.
pub const QUAD_VERTICES: u32 = 6;
