use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use renderer::{CanvasDimensions, HostEvent, PreviewConfig, PreviewHost, WindowOptions};
use settings::Settings;
use sketchbook::{default_template, draft_key, find_template, DraftStore, FileDraftStore, ShaderTemplate};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::watch;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn load_settings(paths: &AppPaths, explicit: Option<&Path>) -> Result<Settings> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file());
    let settings = Settings::load_or_default(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?settings, "resolved settings");
    Ok(settings)
}

pub fn preview_config(settings: &Settings) -> PreviewConfig {
    let preview = &settings.preview;
    PreviewConfig {
        compile_debounce: preview.compile_debounce,
        persist_debounce: preview.persist_debounce,
        min_canvas: CanvasDimensions::new(preview.min_canvas.width, preview.min_canvas.height),
        remap_error_lines: preview.remap_error_lines,
        tool_key: preview.tool_key.clone(),
    }
}

pub fn resolve_template(name: &str) -> Result<&'static ShaderTemplate> {
    match find_template(name) {
        Some(template) => Ok(template),
        None => {
            let known: Vec<&str> = sketchbook::catalog().iter().map(|t| t.name).collect();
            bail!("unknown template '{name}'; available: {}", known.join(", "))
        }
    }
}

/// Which file the preview follows and what text it starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPlan {
    pub watch: PathBuf,
    pub initial: String,
    /// Set for the scratch file only; a user's own file is never rewritten
    /// by template switches.
    pub mirror: Option<PathBuf>,
}

/// An existing FILE wins over everything. A missing FILE or the scratch file
/// is seeded with the template, the stored draft, or the default template, in
/// that order.
pub fn plan_start(
    file: Option<&Path>,
    template: Option<&'static ShaderTemplate>,
    draft: Option<String>,
    scratch: &Path,
) -> Result<StartPlan> {
    let seed = || {
        template
            .map(|template| template.source.to_string())
            .or_else(|| draft.clone())
            .unwrap_or_else(|| default_template().source.to_string())
    };

    match file {
        Some(path) if path.exists() => {
            if template.is_some() {
                tracing::warn!(path = %path.display(), "file exists; ignoring --template");
            }
            let initial = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(StartPlan {
                watch: path.to_path_buf(),
                initial,
                mirror: None,
            })
        }
        Some(path) => {
            let initial = template
                .map(|template| template.source.to_string())
                .unwrap_or_else(|| default_template().source.to_string());
            write_seed(path, &initial)?;
            Ok(StartPlan {
                watch: path.to_path_buf(),
                initial,
                mirror: None,
            })
        }
        None => {
            let initial = seed();
            write_seed(scratch, &initial)?;
            Ok(StartPlan {
                watch: scratch.to_path_buf(),
                initial,
                mirror: Some(scratch.to_path_buf()),
            })
        }
    }
}

fn write_seed(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let settings = load_settings(&paths, args.config.as_deref())?;
    let preview = preview_config(&settings);
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        cache = %paths.cache_dir().display(),
        "resolved shadepad paths"
    );

    let template = args.template.as_deref().map(resolve_template).transpose()?;
    let drafts = FileDraftStore::open_or_reset(paths.drafts_file())
        .context("failed to open draft store")?;
    let draft = drafts.load(&draft_key(&preview.tool_key));
    let plan = plan_start(args.file.as_deref(), template, draft, &paths.scratch_file())?;

    let output_dir = match args.output.or_else(|| settings.export.directory.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };
    let size = args.size.unwrap_or(settings.window.size);
    let fps = match args.fps {
        Some(fps) if fps > 0.0 => Some(fps),
        Some(_) => None,
        None => settings.preview.fps_cap(),
    };

    let host = PreviewHost::new()?;
    let proxy = host.proxy();
    let _watcher = watch::forward_changes(&plan.watch, move |text| {
        let _ = proxy.send_event(HostEvent::SourceChanged(text));
    })?;

    tracing::info!(
        file = %plan.watch.display(),
        output = %output_dir.display(),
        fps = ?fps,
        "starting shadepad preview"
    );
    host.run(
        WindowOptions {
            title: settings.window.title.clone(),
            size: CanvasDimensions::new(size.width, size.height),
            fps,
            preview,
            initial: Some(plan.initial),
            output_dir,
            mirror: plan.mirror,
        },
        drafts,
    )
}
