//! Recording doubles for the rendering context and the frame scheduler.

use std::collections::HashSet;

use crate::context::{Diagnostic, DrawError, GraphicsContext, StageKind};
use crate::frame::{FrameHandle, FrameScheduler};
use crate::types::CanvasDimensions;
use crate::uniforms::FrameUniforms;

/// Fragment text containing this token fails to compile at that line.
pub(crate) const FAKE_ERROR: &str = "FAKE_ERROR";

#[derive(Debug)]
pub(crate) struct FakeStage {
    id: u64,
    kind: StageKind,
    source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeProgram {
    pub id: u64,
    pub fragment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FakeFrame {
    pub program: u64,
    pub uniforms: FrameUniforms,
}

#[derive(Debug, Default)]
pub(crate) struct FakeContext {
    next_id: u64,
    pub size: CanvasDimensions,
    pub stages_created: usize,
    pub programs_linked: usize,
    pub programs_released: usize,
    pub live_stages: HashSet<u64>,
    pub live_programs: HashSet<u64>,
    pub compiled: Vec<StageKind>,
    pub resizes: Vec<CanvasDimensions>,
    pub draws: usize,
    pub last_frame: Option<FakeFrame>,
    pub fail_stage_creation: bool,
    pub link_error: Option<String>,
    pub drop_next_frame: bool,
    pub lost: bool,
    /// Largest surface edge `resize` will apply.
    pub max_dimension: Option<u32>,
}

impl FakeContext {
    pub fn with_size(size: CanvasDimensions) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn failing_stages() -> Self {
        Self {
            fail_stage_creation: true,
            ..Self::default()
        }
    }

    pub fn with_link_error(message: &str) -> Self {
        Self {
            link_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_max_dimension(size: CanvasDimensions, max: u32) -> Self {
        Self {
            size,
            max_dimension: Some(max),
            ..Self::default()
        }
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Crude stand-in for a GLSL front end: unbalanced delimiters and the
/// [`FAKE_ERROR`] token are errors.
fn check_fragment(source: &str) -> Result<(), Diagnostic> {
    if let Some(index) = source.lines().position(|line| line.contains(FAKE_ERROR)) {
        return Err(Diagnostic::new("undeclared identifier FAKE_ERROR").at_line(index as u32 + 1));
    }
    let mut depth = 0i32;
    for (index, line) in source.lines().enumerate() {
        for ch in line.chars() {
            match ch {
                '(' | '{' => depth += 1,
                ')' | '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(Diagnostic::new("unexpected closing delimiter").at_line(index as u32 + 1));
            }
        }
    }
    if depth != 0 {
        let last = source.lines().count() as u32;
        return Err(Diagnostic::new("syntax error: unexpected end of input").at_line(last));
    }
    Ok(())
}

impl GraphicsContext for FakeContext {
    type Stage = FakeStage;
    type Program = FakeProgram;

    fn create_stage(&mut self, kind: StageKind) -> Result<FakeStage, Diagnostic> {
        if self.fail_stage_creation || self.lost {
            return Err(Diagnostic::new("context exhausted"));
        }
        let id = self.allocate();
        self.stages_created += 1;
        self.live_stages.insert(id);
        Ok(FakeStage {
            id,
            kind,
            source: None,
        })
    }

    fn compile_stage(&mut self, stage: &mut FakeStage, source: &str) -> Result<(), Diagnostic> {
        self.compiled.push(stage.kind);
        if stage.kind == StageKind::Fragment {
            check_fragment(source)?;
        }
        stage.source = Some(source.to_string());
        Ok(())
    }

    fn link(&mut self, vertex: &FakeStage, fragment: &FakeStage) -> Result<FakeProgram, Diagnostic> {
        if let Some(message) = &self.link_error {
            return Err(Diagnostic::new(message.clone()).at_line(1));
        }
        if vertex.source.is_none() || fragment.source.is_none() {
            return Err(Diagnostic::new("linking uncompiled stages"));
        }
        let id = self.allocate();
        self.programs_linked += 1;
        self.live_programs.insert(id);
        Ok(FakeProgram {
            id,
            fragment: fragment.source.clone().unwrap_or_default(),
        })
    }

    fn release_stage(&mut self, stage: FakeStage) {
        self.live_stages.remove(&stage.id);
    }

    fn release_program(&mut self, program: FakeProgram) {
        self.programs_released += 1;
        self.live_programs.remove(&program.id);
    }

    fn resize(&mut self, size: CanvasDimensions) -> CanvasDimensions {
        assert!(!size.is_zero_area(), "resize called with zero area");
        let applied = match self.max_dimension {
            Some(max) => CanvasDimensions::new(size.width.min(max), size.height.min(max)),
            None => size,
        };
        self.size = applied;
        self.resizes.push(applied);
        applied
    }

    fn draw(&mut self, program: &FakeProgram, uniforms: &FrameUniforms) -> Result<(), DrawError> {
        if self.lost {
            return Err(DrawError::ContextLost);
        }
        if std::mem::take(&mut self.drop_next_frame) {
            return Err(DrawError::Surface("outdated".to_string()));
        }
        assert!(self.live_programs.contains(&program.id), "drawing a released program");
        self.draws += 1;
        self.last_frame = Some(FakeFrame {
            program: program.id,
            uniforms: *uniforms,
        });
        Ok(())
    }

    fn is_lost(&self) -> bool {
        self.lost
    }
}

/// Scheduler that tracks which handles are outstanding.
#[derive(Debug, Default)]
pub(crate) struct CountingScheduler {
    next_id: u64,
    pub outstanding: HashSet<FrameHandle>,
    pub requested: usize,
    pub cancelled: usize,
    pub max_outstanding: usize,
}

impl CountingScheduler {
    /// Delivers the outstanding callback, as the host would.
    pub fn fire(&mut self) -> Option<FrameHandle> {
        let handle = *self.outstanding.iter().next()?;
        self.outstanding.remove(&handle);
        Some(handle)
    }
}

impl FrameScheduler for CountingScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle::from_raw(self.next_id);
        self.requested += 1;
        self.outstanding.insert(handle);
        self.max_outstanding = self.max_outstanding.max(self.outstanding.len());
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.outstanding.remove(&handle) {
            self.cancelled += 1;
        }
    }
}
