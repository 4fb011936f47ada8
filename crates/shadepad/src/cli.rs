use std::path::PathBuf;

use clap::{Parser, Subcommand};
use settings::{parse_size, SurfaceSize};

#[derive(Parser, Debug)]
#[command(
    name = "shadepad",
    author,
    version,
    about = "Live GLSL fragment shader preview",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Shader file to watch; edits are recompiled after a short pause.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Start from a built-in template instead of the stored draft.
    #[arg(long, value_name = "NAME")]
    pub template: Option<String>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<SurfaceSize>,

    /// Frame-rate cap (0 = one frame per vblank).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Configuration file to load instead of the default location.
    #[arg(long, value_name = "PATH", env = "SHADEPAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for exported shaders and snapshots.
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the built-in shader templates.
    Templates(TemplatesCommand),
    /// Manage the stored draft.
    Drafts(DraftsCommand),
}

#[derive(Parser, Debug)]
pub struct TemplatesCommand {
    #[command(subcommand)]
    pub action: TemplatesAction,
}

#[derive(Subcommand, Debug)]
pub enum TemplatesAction {
    /// List template names and titles.
    List,
    /// Print a template's source.
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(Parser, Debug)]
pub struct DraftsCommand {
    #[command(subcommand)]
    pub action: DraftsAction,
}

#[derive(Subcommand, Debug)]
pub enum DraftsAction {
    /// Print resolved directories and the draft file location.
    Where,
    /// Remove the stored draft.
    Clear,
}

pub fn parse() -> Cli {
    Cli::parse()
}
