use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches `path` and hands its contents to `sink` after every change.
///
/// The parent directory is watched so editors that save by renaming a
/// temporary file over the original are still picked up. The returned watcher
/// must be kept alive for events to keep flowing.
pub fn forward_changes<F>(path: &Path, mut sink: F) -> Result<RecommendedWatcher>
where
    F: FnMut(String) + Send + 'static,
{
    let target = path.to_path_buf();
    let file_name = target
        .file_name()
        .map(OsString::from)
        .ok_or_else(|| anyhow!("{} does not name a file", target.display()))?;
    let directory = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let watched = target.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !touches(&event, &file_name) {
                return;
            }
            match fs::read_to_string(&watched) {
                Ok(text) => {
                    tracing::debug!(path = %watched.display(), kind = ?event.kind, "shader file changed");
                    sink(text);
                }
                // Removed between the event and the read; the next event catches up.
                Err(err) => tracing::debug!(path = %watched.display(), error = %err, "shader file unreadable"),
            }
        }
        Err(err) => tracing::warn!(error = %err, "file watcher error"),
    })
    .context("failed to create file watcher")?;

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", directory.display()))?;
    tracing::info!(path = %target.display(), "watching shader file");
    Ok(watcher)
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}
