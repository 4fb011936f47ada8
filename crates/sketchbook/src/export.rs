use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

pub const SHADER_EXTENSION: &str = "glsl";
pub const SHADER_MEDIA_TYPE: &str = "text/plain";

const FALLBACK_STEM: &str = "shader";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export directory {path} could not be created: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A shader written to disk by [`export_shader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedShader {
    pub path: PathBuf,
    pub media_type: &'static str,
    pub bytes: usize,
}

/// Writes `text` verbatim to `<dir>/<stem>.glsl`. Existing files are never
/// replaced; a numeric suffix is appended instead.
pub fn export_shader(dir: &Path, stem: &str, text: &str) -> Result<ExportedShader, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let stem = sanitize_stem(stem);
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.{SHADER_EXTENSION}")
        } else {
            format!("{stem}-{attempt}.{SHADER_EXTENSION}")
        };
        let path = dir.join(name);
        match write_new(&path, text) {
            Ok(()) => {
                info!(path = %path.display(), bytes = text.len(), "exported shader");
                return Ok(ExportedShader {
                    path,
                    media_type: SHADER_MEDIA_TYPE,
                    bytes: text.len(),
                });
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(ExportError::Write { path, source }),
        }
    }
}

fn write_new(path: &Path, text: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(text.as_bytes())
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}
