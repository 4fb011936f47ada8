use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use debounce::earliest;
use sketchbook::DraftStore;
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::canvas::Canvas;
use crate::frame::PacedScheduler;
use crate::gpu::{save_png, GpuContext};
use crate::render_loop::FrameOutcome;
use crate::shell::PreviewShell;
use crate::types::{CanvasDimensions, PreviewConfig};

/// Retry interval for frames that put nothing on screen.
const IDLE_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Messages other threads can post to the preview window.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// New editor text, typically read from a watched file.
    SourceChanged(String),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub size: CanvasDimensions,
    pub fps: Option<f32>,
    pub preview: PreviewConfig,
    /// Text to start from instead of the stored draft.
    pub initial: Option<String>,
    /// Where `S` exports and `P` snapshots land.
    pub output_dir: PathBuf,
    /// File rewritten whenever a template replaces the text, so an editor on
    /// that file follows along.
    pub mirror: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    TogglePlayback,
    Reset,
    Export,
    Snapshot,
    NextTemplate,
    PreviousTemplate,
    Quit,
}

fn command_for(key: &Key, shift: bool) -> Option<Command> {
    match key {
        Key::Named(NamedKey::Space) => Some(Command::TogglePlayback),
        Key::Named(NamedKey::Tab) if shift => Some(Command::PreviousTemplate),
        Key::Named(NamedKey::Tab) => Some(Command::NextTemplate),
        Key::Named(NamedKey::Escape) => Some(Command::Quit),
        Key::Character(value) => match value.to_ascii_lowercase().as_str() {
            " " => Some(Command::TogglePlayback),
            "r" => Some(Command::Reset),
            "s" => Some(Command::Export),
            "p" => Some(Command::Snapshot),
            _ => None,
        },
        _ => None,
    }
}

fn window_title(base: &str, template: Option<&str>, status: &str) -> String {
    match template {
        Some(template) => format!("{base} | {template} | {status}"),
        None => format!("{base} | {status}"),
    }
}

/// Frames that presented nothing get no vsync throttle from the surface, so
/// the next one waits out an idle interval instead.
fn pace_after(scheduler: &mut PacedScheduler, outcome: &FrameOutcome, now: Instant) {
    if matches!(outcome, FrameOutcome::Skipped | FrameOutcome::Dropped(_)) {
        scheduler.hold(now + IDLE_FRAME_INTERVAL);
    }
}

/// Runs one render step and reports a panic as its message.
fn supervised<T>(step: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(step)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Owns the winit event loop. Create it first so a proxy can be handed to
/// background threads, then [`PreviewHost::run`] it on the main thread.
pub struct PreviewHost {
    event_loop: EventLoop<HostEvent>,
}

impl PreviewHost {
    pub fn new() -> Result<Self> {
        let event_loop = EventLoopBuilder::<HostEvent>::with_user_event()
            .build()
            .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
        Ok(Self { event_loop })
    }

    pub fn proxy(&self) -> EventLoopProxy<HostEvent> {
        self.event_loop.create_proxy()
    }

    /// Opens the preview window and blocks until it closes.
    pub fn run<D>(self, options: WindowOptions, drafts: D) -> Result<()>
    where
        D: DraftStore + 'static,
    {
        let event_loop = self.event_loop;
        let window = WindowBuilder::new()
            .with_title(&options.title)
            .with_inner_size(PhysicalSize::new(options.size.width, options.size.height))
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
        let window = Arc::new(window);

        let container = CanvasDimensions::from(window.inner_size());
        // The surface borrows raw handles; `window` lives in the loop closure
        // for as long as the context does.
        let mounted = Canvas::mount(container, options.preview.min_canvas, |size| {
            GpuContext::for_window(window.as_ref(), size)
        });
        if let Ok(canvas) = &mounted {
            let size = canvas.size();
            if size != container {
                let _ = window.request_inner_size(PhysicalSize::new(size.width, size.height));
            }
            let adapter = canvas.context().adapter();
            info!(adapter = %adapter.name, backend = ?adapter.backend, %size, "preview canvas ready");
            if adapter.is_software() && options.fps.is_none() {
                warn!("software rasterizer detected; consider capping with --fps");
            }
        }

        let mut shell = PreviewShell::new(
            options.preview.clone(),
            mounted,
            PacedScheduler::new(options.fps),
            drafts,
            options.initial.clone(),
            Instant::now(),
        );
        let mut shift = false;
        let mut shown_title = String::new();
        let mut fault: Option<String> = None;

        let run_result = event_loop.run(move |event, elwt| match event {
            Event::UserEvent(HostEvent::SourceChanged(text)) => {
                shell.edit(text, Instant::now());
            }
            Event::UserEvent(HostEvent::Shutdown) => elwt.exit(),
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::Resized(size) => {
                    shell.resize(size.into());
                    window.request_redraw();
                }
                WindowEvent::ModifiersChanged(modifiers) => {
                    shift = modifiers.state().shift_key();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state != ElementState::Pressed || event.repeat {
                        return;
                    }
                    let Some(command) = command_for(&event.logical_key, shift) else {
                        return;
                    };
                    let now = Instant::now();
                    match command {
                        Command::TogglePlayback => {
                            let playing = shell.toggle_playback(now);
                            info!(playing, "playback toggled");
                        }
                        Command::Reset => shell.reset(now),
                        Command::Export => match shell.export(&options.output_dir) {
                            Ok(exported) => info!(path = %exported.path.display(), "shader exported"),
                            Err(err) => error!(error = %err, "shader export failed"),
                        },
                        Command::Snapshot => {
                            let path = options.output_dir.join(snapshot_name());
                            match shell.current_frame(now) {
                                Some((context, program, uniforms)) => {
                                    match context
                                        .capture(program, &uniforms)
                                        .and_then(|image| save_png(&image, &path))
                                    {
                                        Ok(()) => info!(path = %path.display(), "snapshot saved"),
                                        Err(err) => error!(error = %err, "snapshot failed"),
                                    }
                                }
                                None => warn!("nothing on screen to snapshot"),
                            }
                        }
                        Command::NextTemplate | Command::PreviousTemplate => {
                            let template =
                                shell.cycle_template(command == Command::NextTemplate, now);
                            if let Some(mirror) = &options.mirror {
                                if let Err(err) = std::fs::write(mirror, template.source) {
                                    warn!(path = %mirror.display(), error = %err, "failed to mirror template");
                                }
                            }
                        }
                        Command::Quit => elwt.exit(),
                    }
                }
                WindowEvent::RedrawRequested if fault.is_none() => {
                    let now = Instant::now();
                    let displayed = CanvasDimensions::from(window.inner_size());
                    let outcome = supervised(|| match shell.scheduler_mut().take(now) {
                        Some(handle) => shell.on_frame(handle, displayed, now),
                        None => shell.redraw(displayed, now),
                    });
                    match outcome {
                        Ok(FrameOutcome::ContextLost) => {
                            error!("GPU context lost; edits will no longer render");
                        }
                        Ok(outcome) => pace_after(shell.scheduler_mut(), &outcome, now),
                        Err(message) => {
                            error!(%message, "preview crashed while rendering");
                            fault = Some(message);
                        }
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                let now = Instant::now();
                if fault.is_none() {
                    if let Err(message) = supervised(|| shell.poll(now)) {
                        error!(%message, "preview crashed while compiling");
                        fault = Some(message);
                    }
                }

                let status = match &fault {
                    Some(message) => format!("preview crashed: {message}"),
                    None => shell.status_line(),
                };
                let title = window_title(&options.title, shell.template(), &status);
                if title != shown_title {
                    window.set_title(&title);
                    shown_title = title;
                }

                let scheduler = shell.render_loop().scheduler();
                if fault.is_some() {
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if scheduler.ready(now) {
                    window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else {
                    match earliest([shell.next_deadline(), scheduler.deadline()]) {
                        Some(deadline) => elwt.set_control_flow(ControlFlow::WaitUntil(deadline)),
                        None => elwt.set_control_flow(ControlFlow::Wait),
                    }
                }
            }
            Event::LoopExiting => shell.teardown(),
            _ => {}
        });

        run_result.map_err(|err| anyhow!("window event loop error: {err}"))
    }
}

fn snapshot_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("shadepad-{millis}.png")
}
