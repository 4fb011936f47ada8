use std::borrow::Cow;

use wgpu::naga::front::glsl::{Frontend, Options, ParseErrors};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

use crate::context::{Diagnostic, StageKind};

fn naga_stage(kind: StageKind) -> ShaderStage {
    match kind {
        StageKind::Vertex => ShaderStage::Vertex,
        StageKind::Fragment => ShaderStage::Fragment,
    }
}

/// Parses and validates GLSL with naga so errors come back with the front
/// end's own text and a line number, before wgpu sees the module.
pub(crate) fn validate_glsl(kind: StageKind, source: &str) -> Result<(), Diagnostic> {
    let module = Frontend::default()
        .parse(&Options::from(naga_stage(kind)), source)
        .map_err(|errors| parse_diagnostic(&errors, source))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator.validate(&module).map_err(|err| {
        let diagnostic = Diagnostic::new(err.emit_to_string(source));
        match err.location(source) {
            Some(location) => diagnostic.at_line(location.line_number),
            None => diagnostic,
        }
    })?;
    Ok(())
}

fn parse_diagnostic(errors: &ParseErrors, source: &str) -> Diagnostic {
    let diagnostic = Diagnostic::new(errors.emit_to_string(source));
    match errors.errors.first() {
        Some(first) if first.meta.is_defined() => {
            diagnostic.at_line(first.meta.location(source).line_number)
        }
        _ => diagnostic,
    }
}

/// Runs `build` inside a validation error scope and turns a captured error
/// into a diagnostic.
pub(crate) fn scoped<T>(device: &wgpu::Device, build: impl FnOnce() -> T) -> Result<T, Diagnostic> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(Diagnostic::new(err.to_string())),
        None => Ok(value),
    }
}

pub(crate) fn create_module(
    device: &wgpu::Device,
    kind: StageKind,
    source: &str,
) -> Result<wgpu::ShaderModule, Diagnostic> {
    validate_glsl(kind, source)?;
    let label = match kind {
        StageKind::Vertex => "shadepad quad vertex",
        StageKind::Fragment => "shadepad fragment",
    };
    scoped(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(source.to_string()),
                stage: naga_stage(kind),
                defines: &[],
            },
        })
    })
}

pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("preview params layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("preview pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        Self {
            uniform_layout,
            pipeline_layout,
        }
    }
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, Diagnostic> {
    scoped(device, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("preview pipeline"),
            layout: Some(&layouts.pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{preamble_lines, WrappedFragment, VERTEX_SHADER};
    use crate::types::ShaderSource;

    #[test]
    fn fixed_vertex_stage_validates() {
        validate_glsl(StageKind::Vertex, VERTEX_SHADER).unwrap();
    }

    #[test]
    fn wrapped_white_shader_validates() {
        let source = ShaderSource::new("void mainImage(out vec4 c, in vec2 p){ c = vec4(1.0); }").unwrap();
        validate_glsl(StageKind::Fragment, WrappedFragment::new(&source).text()).unwrap();
    }

    #[test]
    fn undeclared_identifier_reports_wrapped_line() {
        let source = ShaderSource::new(
            "void mainImage(out vec4 c, in vec2 p) {\n    c = vec4(missing);\n}\n",
        )
        .unwrap();
        let wrapped = WrappedFragment::new(&source);
        let err = validate_glsl(StageKind::Fragment, wrapped.text()).unwrap_err();
        assert!(!err.message.is_empty());
        assert_eq!(err.line, Some(preamble_lines() + 2));
        assert_eq!(wrapped.user_line(preamble_lines() + 2), Some(2));
    }

    #[test]
    fn truncated_source_is_rejected() {
        let source = ShaderSource::new("void mainImage(").unwrap();
        let err = validate_glsl(StageKind::Fragment, WrappedFragment::new(&source).text()).unwrap_err();
        assert!(!err.message.is_empty());
    }
}
