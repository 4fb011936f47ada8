use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, warn};

use crate::compile::QUAD_VERTICES;
use crate::context::{ContextError, Diagnostic, DrawError, GraphicsContext, StageKind};
use crate::types::CanvasDimensions;
use crate::uniforms::{FrameUniforms, PreviewParams};

use super::pipeline::{self, PipelineLayouts};

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Adapter details worth logging.
#[derive(Debug, Clone)]
pub struct AdapterSummary {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl AdapterSummary {
    fn from_info(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

pub(super) enum RenderTarget {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

pub struct GpuStage {
    kind: StageKind,
    module: Option<wgpu::ShaderModule>,
}

pub struct GpuProgram {
    pub(super) pipeline: wgpu::RenderPipeline,
}

/// wgpu device, queue and drawing target behind [`GraphicsContext`].
pub struct GpuContext {
    _instance: wgpu::Instance,
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
    pub(super) target: RenderTarget,
    pub(super) format: wgpu::TextureFormat,
    pub(super) size: CanvasDimensions,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    pub(super) uniform_bind_group: wgpu::BindGroup,
    max_dimension: u32,
    adapter: AdapterSummary,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Creates a context presenting to `target`'s window surface.
    ///
    /// The surface is created from raw handles, so `target` must outlive the
    /// returned context.
    pub fn for_window<T>(target: &T, size: CanvasDimensions) -> Result<Self, ContextError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();
        let window_handle = target
            .window_handle()
            .map_err(|err| ContextError::Surface(format!("window handle unavailable: {err}")))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| ContextError::Surface(format!("display handle unavailable: {err}")))?;
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| ContextError::Surface(err.to_string()))?;

        let (adapter, device, queue) = request_device(&instance, Some(&surface))?;
        let max_dimension = check_size(&adapter, size)?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| ContextError::Surface("surface reports no formats".to_string()))?;
        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            caps.present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::AutoVsync)
        };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        debug!(?format, ?present_mode, %size, "configured window surface");

        Ok(Self::assemble(
            instance,
            &adapter,
            device,
            queue,
            RenderTarget::Window { surface, config },
            format,
            size,
            max_dimension,
        ))
    }

    /// Creates a context rendering into an offscreen texture.
    pub fn headless(size: CanvasDimensions) -> Result<Self, ContextError> {
        let instance = create_instance();
        let (adapter, device, queue) = request_device(&instance, None)?;
        let max_dimension = check_size(&adapter, size)?;
        let texture = create_offscreen_texture(&device, OFFSCREEN_FORMAT, size);
        Ok(Self::assemble(
            instance,
            &adapter,
            device,
            queue,
            RenderTarget::Offscreen { texture },
            OFFSCREEN_FORMAT,
            size,
            max_dimension,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        instance: wgpu::Instance,
        adapter: &wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: RenderTarget,
        format: wgpu::TextureFormat,
        size: CanvasDimensions,
        max_dimension: u32,
    ) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            if !matches!(reason, wgpu::DeviceLostReason::Destroyed) {
                error!(?reason, %message, "GPU device lost");
                lost_flag.store(true, Ordering::SeqCst);
            }
        });
        device.on_uncaptured_error(Box::new(|err| {
            error!(error = %err, "uncaptured GPU error");
        }));

        let layouts = PipelineLayouts::new(&device);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("preview params"),
            size: std::mem::size_of::<PreviewParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("preview params bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let adapter = AdapterSummary::from_info(&adapter.get_info());
        debug!(
            name = %adapter.name,
            backend = ?adapter.backend,
            device_type = ?adapter.device_type,
            "selected GPU adapter"
        );

        Self {
            _instance: instance,
            device,
            queue,
            target,
            format,
            size,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            max_dimension,
            adapter,
            lost,
        }
    }

    pub fn adapter(&self) -> &AdapterSummary {
        &self.adapter
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> CanvasDimensions {
        self.size
    }

    pub(super) fn write_uniforms(&self, uniforms: &FrameUniforms) {
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&uniforms.to_block()),
        );
    }

    /// Records a clear plus one quad draw into `view`.
    pub(super) fn encode_draw(&self, view: &wgpu::TextureView, program: &GpuProgram) -> wgpu::CommandEncoder {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("preview encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("preview pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&program.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.draw(0..QUAD_VERTICES, 0..1);
        }
        encoder
    }

    fn mark_lost(&self) {
        self.lost.store(true, Ordering::SeqCst);
    }
}

impl GraphicsContext for GpuContext {
    type Stage = GpuStage;
    type Program = GpuProgram;

    fn create_stage(&mut self, kind: StageKind) -> Result<GpuStage, Diagnostic> {
        if self.is_lost() {
            return Err(Diagnostic::new("GPU device lost"));
        }
        Ok(GpuStage { kind, module: None })
    }

    fn compile_stage(&mut self, stage: &mut GpuStage, source: &str) -> Result<(), Diagnostic> {
        stage.module = Some(pipeline::create_module(&self.device, stage.kind, source)?);
        Ok(())
    }

    fn link(&mut self, vertex: &GpuStage, fragment: &GpuStage) -> Result<GpuProgram, Diagnostic> {
        let (Some(vertex), Some(fragment)) = (vertex.module.as_ref(), fragment.module.as_ref())
        else {
            return Err(Diagnostic::new("cannot link stages that failed to compile"));
        };
        let pipeline =
            pipeline::create_pipeline(&self.device, &self.layouts, vertex, fragment, self.format)?;
        Ok(GpuProgram { pipeline })
    }

    fn release_stage(&mut self, stage: GpuStage) {
        drop(stage);
    }

    fn release_program(&mut self, program: GpuProgram) {
        drop(program);
    }

    fn resize(&mut self, size: CanvasDimensions) -> CanvasDimensions {
        let clamped = CanvasDimensions::new(
            size.width.min(self.max_dimension),
            size.height.min(self.max_dimension),
        );
        if clamped != size {
            warn!(requested = %size, %clamped, "surface clamped to GPU limit");
        }
        self.size = clamped;
        match &mut self.target {
            RenderTarget::Window { surface, config } => {
                config.width = clamped.width;
                config.height = clamped.height;
                surface.configure(&self.device, config);
            }
            RenderTarget::Offscreen { texture } => {
                *texture = create_offscreen_texture(&self.device, self.format, clamped);
            }
        }
        clamped
    }

    fn draw(&mut self, program: &GpuProgram, uniforms: &FrameUniforms) -> Result<(), DrawError> {
        if self.is_lost() {
            return Err(DrawError::ContextLost);
        }
        self.write_uniforms(uniforms);
        match &self.target {
            RenderTarget::Window { surface, config } => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        surface.configure(&self.device, config);
                        return Err(DrawError::Surface("surface outdated".to_string()));
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        self.mark_lost();
                        return Err(DrawError::ContextLost);
                    }
                    Err(other) => return Err(DrawError::Surface(other.to_string())),
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let encoder = self.encode_draw(&view, program);
                self.queue.submit(std::iter::once(encoder.finish()));
                frame.present();
            }
            RenderTarget::Offscreen { texture } => {
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                let encoder = self.encode_draw(&view, program);
                self.queue.submit(std::iter::once(encoder.finish()));
            }
        }
        Ok(())
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), ContextError> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface,
        force_fallback_adapter: false,
    }))
    .map_err(|_| ContextError::NoAdapter)?;

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("shadepad device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .map_err(|err| ContextError::Device(err.to_string()))?;
    Ok((adapter, device, queue))
}

fn check_size(adapter: &wgpu::Adapter, size: CanvasDimensions) -> Result<u32, ContextError> {
    let max = adapter.limits().max_texture_dimension_2d;
    if size.width > max || size.height > max {
        return Err(ContextError::TooLarge {
            requested: size,
            max,
        });
    }
    Ok(max)
}

pub(super) fn create_offscreen_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    size: CanvasDimensions,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("preview target"),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}
