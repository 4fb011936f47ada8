//! Glue between the editor text and the render loop: debounced compilation,
//! debounced draft persistence, template selection, playback controls.

use std::path::Path;
use std::time::Instant;

use debounce::{earliest, Debouncer};
use sketchbook::{
    default_template, draft_key, export_shader, find_template, next_template, previous_template,
    template_with_source, DraftStore, ExportError, ExportedShader, ShaderTemplate,
};
use tracing::{debug, info, warn};

use crate::canvas::{Canvas, CanvasError};
use crate::compile::CompileError;
use crate::context::GraphicsContext;
use crate::frame::{FrameHandle, FrameScheduler};
use crate::render_loop::{FrameOutcome, RenderLoop};
use crate::types::{CanvasDimensions, InvalidSource, PreviewConfig, ShaderSource};
use crate::uniforms::FrameUniforms;

const EXPORT_FALLBACK_STEM: &str = "shader";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewStatus {
    Unsupported(String),
    Invalid(InvalidSource),
    CompileFailed(CompileError),
    ContextLost,
    /// Nothing compiled yet.
    Pending,
    Running,
    Paused,
}

impl PreviewStatus {
    pub fn describe(&self, remap_lines: bool) -> String {
        match self {
            PreviewStatus::Unsupported(reason) => format!("unsupported: {reason}"),
            PreviewStatus::Invalid(invalid) => invalid.advisory().to_string(),
            PreviewStatus::CompileFailed(err) => err.summary(remap_lines),
            PreviewStatus::ContextLost => "rendering context lost".to_string(),
            PreviewStatus::Pending => "compiling".to_string(),
            PreviewStatus::Running => "running".to_string(),
            PreviewStatus::Paused => "paused".to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            PreviewStatus::Unsupported(_)
                | PreviewStatus::Invalid(_)
                | PreviewStatus::CompileFailed(_)
                | PreviewStatus::ContextLost
        )
    }
}

/// Which timers fired during a [`PreviewShell::poll`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub compiled: bool,
    pub persisted: bool,
}

pub struct PreviewShell<C: GraphicsContext, S, D> {
    config: PreviewConfig,
    canvas: Option<Canvas<C>>,
    unsupported: Option<CanvasError>,
    render_loop: RenderLoop<C, S>,
    drafts: D,
    draft_key: String,
    text: String,
    template: Option<&'static str>,
    compile_timer: Debouncer<String>,
    persist_timer: Debouncer<String>,
    advisory: Option<InvalidSource>,
    error: Option<CompileError>,
}

impl<C, S, D> PreviewShell<C, S, D>
where
    C: GraphicsContext,
    S: FrameScheduler,
    D: DraftStore,
{
    /// Builds the shell and compiles the initial text right away. The initial
    /// text is `initial` if given, else the stored draft, else the default
    /// template. Text identical to a template counts as that template.
    pub fn new(
        config: PreviewConfig,
        mounted: Result<Canvas<C>, CanvasError>,
        scheduler: S,
        drafts: D,
        initial: Option<String>,
        now: Instant,
    ) -> Self {
        let key = draft_key(&config.tool_key);
        let text = initial
            .or_else(|| drafts.load(&key))
            .unwrap_or_else(|| default_template().source.to_string());
        let template = template_with_source(&text).map(|template| template.name);
        let (canvas, unsupported) = match mounted {
            Ok(canvas) => (Some(canvas), None),
            Err(err) => {
                warn!(error = %err, "preview disabled");
                (None, Some(err))
            }
        };

        let mut shell = Self {
            compile_timer: Debouncer::new(config.compile_debounce),
            persist_timer: Debouncer::new(config.persist_debounce),
            config,
            canvas,
            unsupported,
            render_loop: RenderLoop::new(scheduler, now),
            drafts,
            draft_key: key,
            text: text.clone(),
            template,
            advisory: None,
            error: None,
        };
        shell.settle(text);
        shell
    }

    /// Replaces the working text and restarts both settle timers.
    pub fn edit(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        if text == self.text {
            return;
        }
        self.template = template_with_source(&text).map(|template| template.name);
        self.text = text;
        self.restart_timers(now);
    }

    /// Fires whichever timers have settled by `now`.
    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        self.detect_context_loss();
        let mut outcome = PollOutcome::default();
        if let Some(text) = self.compile_timer.poll(now) {
            self.settle(text);
            outcome.compiled = true;
        }
        if let Some(text) = self.persist_timer.poll(now) {
            self.persist(&text);
            outcome.persisted = true;
        }
        outcome
    }

    /// Loads a template wholesale and clears any stale error at once.
    pub fn select_template(&mut self, name: &str, now: Instant) -> Option<&'static ShaderTemplate> {
        let template = find_template(name)?;
        self.apply_template(template, now);
        Some(template)
    }

    pub fn cycle_template(&mut self, forward: bool, now: Instant) -> &'static ShaderTemplate {
        let current = self.template.unwrap_or_default();
        let template = if forward {
            next_template(current)
        } else {
            previous_template(current)
        };
        self.apply_template(template, now);
        template
    }

    fn apply_template(&mut self, template: &'static ShaderTemplate, now: Instant) {
        info!(template = template.name, "template selected");
        self.text = template.source.to_string();
        self.template = Some(template.name);
        self.error = None;
        self.advisory = None;
        self.restart_timers(now);
    }

    /// Returns whether playback is running afterwards.
    pub fn toggle_playback(&mut self, now: Instant) -> bool {
        if self.render_loop.is_playing() {
            self.render_loop.pause(now);
        } else {
            self.render_loop.play(now);
        }
        self.render_loop.is_playing()
    }

    pub fn reset(&mut self, now: Instant) {
        self.render_loop.reset(now);
    }

    /// Writes the working text verbatim as a `.glsl` file in `dir`.
    pub fn export(&self, dir: &Path) -> Result<ExportedShader, ExportError> {
        let stem = self.template.unwrap_or(EXPORT_FALLBACK_STEM);
        export_shader(dir, stem, &self.text)
    }

    pub fn status(&self) -> PreviewStatus {
        if let Some(CanvasError::Unsupported(reason)) = &self.unsupported {
            return PreviewStatus::Unsupported(reason.clone());
        }
        if self.render_loop.is_lost() {
            return PreviewStatus::ContextLost;
        }
        if let Some(invalid) = self.advisory {
            return PreviewStatus::Invalid(invalid);
        }
        if let Some(err) = &self.error {
            return PreviewStatus::CompileFailed(err.clone());
        }
        if !self.render_loop.has_program() {
            PreviewStatus::Pending
        } else if self.render_loop.is_playing() {
            PreviewStatus::Running
        } else {
            PreviewStatus::Paused
        }
    }

    pub fn status_line(&self) -> String {
        self.status().describe(self.config.remap_error_lines)
    }

    /// Earliest settle deadline, if any timer is running.
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.compile_timer.deadline(), self.persist_timer.deadline()])
    }

    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        displayed: CanvasDimensions,
        now: Instant,
    ) -> FrameOutcome {
        match self.canvas.as_mut() {
            Some(canvas) => self.render_loop.on_frame(handle, canvas, displayed, now),
            None => FrameOutcome::Inactive,
        }
    }

    pub fn redraw(&mut self, displayed: CanvasDimensions, now: Instant) -> FrameOutcome {
        match self.canvas.as_mut() {
            Some(canvas) => self.render_loop.redraw(canvas, displayed, now),
            None => FrameOutcome::Inactive,
        }
    }

    pub fn resize(&mut self, content_box: CanvasDimensions) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.observe_resize(content_box);
        }
    }

    /// Context, program and uniforms of the frame currently on screen.
    pub fn current_frame(&mut self, now: Instant) -> Option<(&mut C, &C::Program, FrameUniforms)> {
        let canvas = self.canvas.as_mut()?;
        let program = self.render_loop.program()?;
        let size = canvas.size();
        if size.is_zero_area() {
            return None;
        }
        let uniforms = FrameUniforms::new(size, self.render_loop.frame_time(now));
        Some((canvas.context_mut(), program.program(), uniforms))
    }

    /// Persists a pending draft immediately.
    pub fn flush(&mut self) {
        if let Some(text) = self.persist_timer.flush() {
            self.persist(&text);
        }
    }

    /// Flushes the draft, cancels the frame chain and releases the program.
    pub fn teardown(&mut self) {
        self.flush();
        self.compile_timer.cancel();
        if let Some(canvas) = self.canvas.as_mut() {
            self.render_loop.teardown(canvas);
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn template(&self) -> Option<&'static str> {
        self.template
    }

    pub fn error(&self) -> Option<&CompileError> {
        self.error.as_ref()
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn canvas(&self) -> Option<&Canvas<C>> {
        self.canvas.as_ref()
    }

    pub fn render_loop(&self) -> &RenderLoop<C, S> {
        &self.render_loop
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        self.render_loop.scheduler_mut()
    }

    pub fn drafts(&self) -> &D {
        &self.drafts
    }

    fn restart_timers(&mut self, now: Instant) {
        self.compile_timer.push(self.text.clone(), now);
        self.persist_timer.push(self.text.clone(), now);
    }

    fn settle(&mut self, text: String) {
        let source = match ShaderSource::new(text) {
            Ok(source) => source,
            Err(invalid) => {
                debug!(reason = %invalid, "source not compiled");
                self.advisory = Some(invalid);
                return;
            }
        };
        self.advisory = None;
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        match self.render_loop.submit(canvas, &source) {
            Ok(()) => self.error = None,
            Err(err) => {
                warn!(stage = %err.stage, line = ?err.display_line(self.config.remap_error_lines), "{}", err.message);
                self.error = Some(err);
            }
        }
    }

    fn persist(&mut self, text: &str) {
        match self.drafts.save(&self.draft_key, text) {
            Ok(()) => debug!(key = %self.draft_key, "draft saved"),
            Err(err) => warn!(error = %err, "failed to save draft"),
        }
    }

    fn detect_context_loss(&mut self) {
        if let Some(canvas) = self.canvas.as_mut() {
            if canvas.context().is_lost() && !self.render_loop.is_lost() {
                self.render_loop.context_lost(canvas);
            }
        }
    }
}
