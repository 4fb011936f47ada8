//! Owns the compiled program, the render clock and the frame chain for one
//! canvas.
//!
//! The chain is a single outstanding [`FrameHandle`]. Every path that starts
//! a new chain (a fresh program, resuming playback, the next frame after a
//! draw) cancels the previous handle first, and callbacks for any other
//! handle are ignored as stale.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::canvas::Canvas;
use crate::clock::RenderClock;
use crate::compile::{compile, CompilationResult, CompileError, CompiledProgram};
use crate::context::{DrawError, GraphicsContext};
use crate::frame::{FrameHandle, FrameScheduler};
use crate::types::{CanvasDimensions, ShaderSource};
use crate::uniforms::FrameUniforms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Compiling,
    Rendering,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn,
    /// Zero-area canvas; the next frame is still scheduled.
    Skipped,
    /// The surface refused this frame; the next frame is still scheduled.
    Dropped(String),
    /// Callback for a handle that is no longer pending.
    Stale,
    /// Nothing to draw (no program, paused or lost).
    Inactive,
    ContextLost,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_drawn: u64,
    pub frames_skipped: u64,
    pub frames_dropped: u64,
    pub stale_callbacks: u64,
    pub compilations: u64,
}

pub struct RenderLoop<C: GraphicsContext, S> {
    scheduler: S,
    program: Option<CompiledProgram<C::Program>>,
    pending: Option<FrameHandle>,
    clock: RenderClock,
    /// Time uniform of the last frame that reached the surface.
    shown_time: Option<f32>,
    state: LoopState,
    playing: bool,
    lost: bool,
    stats: LoopStats,
}

impl<C, S> RenderLoop<C, S>
where
    C: GraphicsContext,
    S: FrameScheduler,
{
    pub fn new(scheduler: S, now: Instant) -> Self {
        Self {
            scheduler,
            program: None,
            pending: None,
            clock: RenderClock::new(now),
            shown_time: None,
            state: LoopState::Idle,
            playing: true,
            lost: false,
            stats: LoopStats::default(),
        }
    }

    /// Compiles `source`. On success the old program is released and the
    /// frame chain restarts; on failure the old program keeps rendering.
    pub fn submit(
        &mut self,
        canvas: &mut Canvas<C>,
        source: &ShaderSource,
    ) -> Result<(), CompileError> {
        if self.lost {
            return Err(CompileError::context_lost());
        }
        self.state = LoopState::Compiling;
        self.stats.compilations += 1;
        let context = canvas.context_mut();
        match compile(source, context) {
            CompilationResult::Success(program) => {
                if let Some(previous) = self.program.replace(program) {
                    context.release_program(previous.into_inner());
                }
                self.state = LoopState::Rendering;
                info!(compilations = self.stats.compilations, "shader program installed");
                if self.playing {
                    self.schedule();
                }
                Ok(())
            }
            CompilationResult::Failure(err) => {
                self.state = if self.program.is_some() {
                    LoopState::Rendering
                } else {
                    LoopState::Errored
                };
                debug!(error = %err, keeps_previous = self.program.is_some(), "compilation failed");
                Err(err)
            }
        }
    }

    /// Handles one scheduled frame callback.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        canvas: &mut Canvas<C>,
        displayed: CanvasDimensions,
        now: Instant,
    ) -> FrameOutcome {
        if self.pending != Some(handle) {
            self.stats.stale_callbacks += 1;
            return FrameOutcome::Stale;
        }
        self.pending = None;
        if self.lost || !self.playing || self.program.is_none() {
            return FrameOutcome::Inactive;
        }

        canvas.reconcile(displayed);
        let outcome = self.draw_once(canvas, self.clock.seconds(now));
        if !matches!(outcome, FrameOutcome::ContextLost) {
            self.schedule();
        }
        outcome
    }

    /// Repaints the current frame without touching the frame chain. Used for
    /// expose events; while paused it repeats the last shown time, so a reset
    /// only shows once playback resumes.
    pub fn redraw(
        &mut self,
        canvas: &mut Canvas<C>,
        displayed: CanvasDimensions,
        now: Instant,
    ) -> FrameOutcome {
        if self.lost || self.program.is_none() {
            return FrameOutcome::Inactive;
        }
        canvas.reconcile(displayed);
        self.draw_once(canvas, self.frame_time(now))
    }

    /// Time uniform a repaint at `now` would use.
    pub fn frame_time(&self, now: Instant) -> f32 {
        match self.shown_time {
            Some(time) if !self.playing => time,
            _ => self.clock.seconds(now),
        }
    }

    fn draw_once(&mut self, canvas: &mut Canvas<C>, time: f32) -> FrameOutcome {
        let size = canvas.size();
        if size.is_zero_area() {
            self.stats.frames_skipped += 1;
            return FrameOutcome::Skipped;
        }
        let Some(program) = self.program.as_ref() else {
            return FrameOutcome::Inactive;
        };
        let uniforms = FrameUniforms::new(size, time);
        match canvas.context_mut().draw(program.program(), &uniforms) {
            Ok(()) => {
                self.stats.frames_drawn += 1;
                self.shown_time = Some(time);
                FrameOutcome::Drawn
            }
            Err(DrawError::Surface(reason)) => {
                self.stats.frames_dropped += 1;
                debug!(%reason, "frame dropped");
                FrameOutcome::Dropped(reason)
            }
            Err(DrawError::ContextLost) => {
                self.context_lost(canvas);
                FrameOutcome::ContextLost
            }
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if !self.playing {
            return;
        }
        self.playing = false;
        self.cancel_pending();
        self.clock.pause(now);
        debug!("playback paused");
    }

    pub fn play(&mut self, now: Instant) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.clock.resume(now);
        if self.program.is_some() && !self.lost {
            self.schedule();
        }
        debug!("playback resumed");
    }

    pub fn reset(&mut self, now: Instant) {
        self.clock.reset(now);
    }

    /// The context is gone for good: drop the program and stop the chain.
    pub fn context_lost(&mut self, canvas: &mut Canvas<C>) {
        if self.lost {
            return;
        }
        warn!("rendering context lost; preview stopped");
        self.lost = true;
        self.cancel_pending();
        if let Some(program) = self.program.take() {
            canvas.context_mut().release_program(program.into_inner());
        }
        self.state = LoopState::Errored;
    }

    /// Cancels the pending frame and releases the program in one pass.
    pub fn teardown(&mut self, canvas: &mut Canvas<C>) {
        self.cancel_pending();
        if let Some(program) = self.program.take() {
            canvas.context_mut().release_program(program.into_inner());
        }
        self.state = LoopState::Idle;
    }

    fn schedule(&mut self) {
        self.cancel_pending();
        self.pending = Some(self.scheduler.request_frame());
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    pub fn program(&self) -> Option<&CompiledProgram<C::Program>> {
        self.program.as_ref()
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{CountingScheduler, FakeContext};

    const WHITE: &str = "void mainImage(out vec4 c, in vec2 p){ c = vec4(1.0); }";
    const RED: &str = "void mainImage(out vec4 c, in vec2 p){ c = vec4(1.0, 0.0, 0.0, 1.0); }";
    const SIZE: CanvasDimensions = CanvasDimensions::new(800, 600);

    struct Harness {
        canvas: Canvas<FakeContext>,
        render_loop: RenderLoop<FakeContext, CountingScheduler>,
        start: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let start = Instant::now();
            let canvas = Canvas::mount(SIZE, CanvasDimensions::new(300, 300), |size| {
                Ok::<_, String>(FakeContext::with_size(size))
            })
            .unwrap();
            Self {
                canvas,
                render_loop: RenderLoop::new(CountingScheduler::default(), start),
                start,
            }
        }

        fn at(&self, millis: u64) -> Instant {
            self.start + Duration::from_millis(millis)
        }

        fn submit(&mut self, text: &str) -> Result<(), CompileError> {
            let source = ShaderSource::new(text).unwrap();
            self.render_loop.submit(&mut self.canvas, &source)
        }

        fn fire(&mut self, displayed: CanvasDimensions, millis: u64) -> FrameOutcome {
            let now = self.at(millis);
            let handle = self
                .render_loop
                .scheduler_mut()
                .fire()
                .expect("a frame should be scheduled");
            self.render_loop
                .on_frame(handle, &mut self.canvas, displayed, now)
        }
    }

    #[test]
    fn first_successful_compile_starts_rendering() {
        let mut harness = Harness::new();
        assert_eq!(harness.render_loop.state(), LoopState::Idle);
        harness.submit(WHITE).unwrap();
        assert_eq!(harness.render_loop.state(), LoopState::Rendering);
        assert_eq!(harness.fire(SIZE, 16), FrameOutcome::Drawn);
        assert!(harness.render_loop.pending_frame().is_some());
        assert_eq!(harness.render_loop.stats().frames_drawn, 1);
    }

    #[test]
    fn first_failed_compile_is_errored() {
        let mut harness = Harness::new();
        assert!(harness.submit("void mainImage(").is_err());
        assert_eq!(harness.render_loop.state(), LoopState::Errored);
        assert!(harness.render_loop.pending_frame().is_none());
        assert_eq!(harness.render_loop.scheduler().requested, 0);
    }

    #[test]
    fn broken_edit_keeps_previous_program_rendering() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.fire(SIZE, 16);
        let before = harness.canvas.context().last_frame.clone().unwrap();

        let err = harness.submit("void mainImage(").unwrap_err();
        assert!(!err.message.is_empty());
        assert_eq!(harness.render_loop.state(), LoopState::Rendering);

        assert_eq!(harness.fire(SIZE, 116), FrameOutcome::Drawn);
        let after = harness.canvas.context().last_frame.clone().unwrap();
        assert_eq!(before.program, after.program);
    }

    #[test]
    fn new_program_releases_old_one_and_keeps_one_chain() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.submit(RED).unwrap();
        harness.submit(WHITE).unwrap();
        let context = harness.canvas.context();
        assert_eq!(context.live_programs.len(), 1);
        assert_eq!(context.programs_released, 2);
        let scheduler = harness.render_loop.scheduler();
        assert_eq!(scheduler.outstanding.len(), 1);
        assert_eq!(scheduler.max_outstanding, 1);
        assert_eq!(scheduler.cancelled, 2);
    }

    #[test]
    fn stale_handles_are_ignored() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        let stale = harness.render_loop.pending_frame().unwrap();
        harness.submit(RED).unwrap();
        let now = harness.at(16);
        let outcome = harness
            .render_loop
            .on_frame(stale, &mut harness.canvas, SIZE, now);
        assert_eq!(outcome, FrameOutcome::Stale);
        assert_eq!(harness.canvas.context().draws, 0);
        assert_eq!(harness.render_loop.scheduler().outstanding.len(), 1);
    }

    #[test]
    fn pause_stops_scheduling_and_freezes_the_frame() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.fire(SIZE, 16);
        let frozen = harness.canvas.context().last_frame.clone();
        let requested = harness.render_loop.scheduler().requested;

        harness.render_loop.pause(harness.at(20));
        assert!(harness.render_loop.pending_frame().is_none());
        assert!(harness.render_loop.scheduler().outstanding.is_empty());
        assert_eq!(harness.render_loop.scheduler().requested, requested);
        assert_eq!(harness.canvas.context().last_frame, frozen);

        harness.render_loop.play(harness.at(1_020));
        assert_eq!(harness.render_loop.scheduler().outstanding.len(), 1);
        harness.fire(SIZE, 1_036);
        let resumed = harness.canvas.context().last_frame.clone().unwrap();
        assert!((resumed.uniforms.time - 0.036).abs() < 1e-4);
        assert_eq!(harness.render_loop.stats().compilations, 1);
    }

    #[test]
    fn redraw_while_paused_repaints_frozen_time() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.fire(SIZE, 500);
        harness.render_loop.pause(harness.at(500));
        let now = harness.at(5_000);
        let outcome = harness.render_loop.redraw(&mut harness.canvas, SIZE, now);
        assert_eq!(outcome, FrameOutcome::Drawn);
        let frame = harness.canvas.context().last_frame.clone().unwrap();
        assert!((frame.uniforms.time - 0.5).abs() < 1e-4);
        assert!(harness.render_loop.pending_frame().is_none());
    }

    #[test]
    fn reset_while_paused_keeps_the_frozen_frame() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.fire(SIZE, 5_000);
        harness.render_loop.pause(harness.at(5_000));
        let frozen = harness.canvas.context().last_frame.clone().unwrap();

        harness.render_loop.reset(harness.at(6_000));
        let now = harness.at(6_000);
        assert_eq!(
            harness.render_loop.redraw(&mut harness.canvas, SIZE, now),
            FrameOutcome::Drawn
        );
        let repainted = harness.canvas.context().last_frame.clone().unwrap();
        assert_eq!(repainted, frozen);
        assert!((harness.render_loop.frame_time(now) - 5.0).abs() < 1e-4);

        harness.render_loop.play(harness.at(7_000));
        harness.fire(SIZE, 7_016);
        let resumed = harness.canvas.context().last_frame.clone().unwrap();
        assert!((resumed.uniforms.time - 0.016).abs() < 1e-4);
    }

    #[test]
    fn reset_changes_only_time() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.fire(SIZE, 3_000);
        let resizes = harness.canvas.context().resizes.len();

        harness.render_loop.reset(harness.at(3_000));
        harness.fire(SIZE, 3_016);

        let frame = harness.canvas.context().last_frame.clone().unwrap();
        assert!((frame.uniforms.time - 0.016).abs() < 1e-4);
        assert_eq!(frame.uniforms.resolution, [800.0, 600.0]);
        assert_eq!(harness.render_loop.stats().compilations, 1);
        assert_eq!(harness.canvas.context().resizes.len(), resizes);
        assert_eq!(harness.canvas.size(), SIZE);
    }

    #[test]
    fn zero_area_skips_draws_but_keeps_scheduling() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        assert_eq!(harness.fire(SIZE, 16), FrameOutcome::Drawn);

        harness.canvas.observe_resize(CanvasDimensions::ZERO);
        for frame in 0..3 {
            let outcome = harness.fire(CanvasDimensions::ZERO, 32 + frame * 16);
            assert_eq!(outcome, FrameOutcome::Skipped);
            assert!(harness.render_loop.pending_frame().is_some());
        }
        assert_eq!(harness.canvas.context().draws, 1);

        let restored = CanvasDimensions::new(640, 480);
        harness.canvas.observe_resize(restored);
        assert_eq!(harness.fire(restored, 100), FrameOutcome::Drawn);
        let frame = harness.canvas.context().last_frame.clone().unwrap();
        assert_eq!(frame.uniforms.resolution, [640.0, 480.0]);
        assert_eq!(harness.render_loop.stats().compilations, 1);
        assert_eq!(harness.render_loop.stats().frames_skipped, 3);
    }

    #[test]
    fn displayed_size_is_reconciled_lazily() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        let displayed = CanvasDimensions::new(1024, 768);
        harness.fire(displayed, 16);
        assert_eq!(harness.canvas.size(), displayed);
        assert_eq!(harness.canvas.context().resizes, vec![displayed]);
    }

    #[test]
    fn dropped_frames_keep_the_chain_alive() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.canvas.context_mut().drop_next_frame = true;
        assert!(matches!(harness.fire(SIZE, 16), FrameOutcome::Dropped(_)));
        assert_eq!(harness.fire(SIZE, 32), FrameOutcome::Drawn);
    }

    #[test]
    fn context_loss_is_terminal() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.canvas.context_mut().lost = true;
        assert_eq!(harness.fire(SIZE, 16), FrameOutcome::ContextLost);
        assert_eq!(harness.render_loop.state(), LoopState::Errored);
        assert!(!harness.render_loop.has_program());
        assert!(harness.render_loop.scheduler().outstanding.is_empty());

        let err = harness.submit(RED).unwrap_err();
        assert_eq!(err.message, "rendering context lost");
        harness.render_loop.play(harness.at(200));
        assert!(harness.render_loop.pending_frame().is_none());
    }

    #[test]
    fn teardown_releases_everything_at_once() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.render_loop.teardown(&mut harness.canvas);
        assert_eq!(harness.render_loop.state(), LoopState::Idle);
        assert!(harness.canvas.context().live_programs.is_empty());
        assert!(harness.render_loop.scheduler().outstanding.is_empty());
    }

    #[test]
    fn program_installed_while_paused_waits_for_play() {
        let mut harness = Harness::new();
        harness.submit(WHITE).unwrap();
        harness.render_loop.pause(harness.at(10));
        harness.submit(RED).unwrap();
        assert!(harness.render_loop.pending_frame().is_none());
        harness.render_loop.play(harness.at(30));
        assert_eq!(harness.render_loop.scheduler().outstanding.len(), 1);
        assert_eq!(harness.render_loop.scheduler().max_outstanding, 1);
    }
}
