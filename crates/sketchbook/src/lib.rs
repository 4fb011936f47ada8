//! Everything the preview keeps outside the GPU: the built-in shader
//! templates, the per-tool draft store, and plain-text shader export.

mod drafts;
mod export;
mod templates;

pub use drafts::{draft_key, DraftError, DraftStore, FileDraftStore, MemoryDraftStore};
pub use export::{export_shader, ExportError, ExportedShader, SHADER_EXTENSION, SHADER_MEDIA_TYPE};
pub use templates::{
    catalog, default_template, find_template, next_template, previous_template,
    template_with_source, ShaderTemplate, DEFAULT_TEMPLATE,
};

/// Function name every preview shader must define.
pub const ENTRY_POINT: &str = "mainImage";
