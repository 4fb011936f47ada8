mod cli;
mod paths;
mod run;
mod watch;

use anyhow::{Context, Result};
use cli::{Command, DraftsAction, TemplatesAction};
use paths::AppPaths;
use sketchbook::{catalog, draft_key, DraftStore, FileDraftStore, DEFAULT_TEMPLATE};

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Templates(templates)) => handle_templates_command(templates.action),
        Some(Command::Drafts(drafts)) => handle_drafts_command(drafts.action, &cli.run),
        None => run::run(cli.run),
    }
}

fn handle_templates_command(action: TemplatesAction) -> Result<()> {
    match action {
        TemplatesAction::List => {
            println!("Templates:");
            for template in catalog() {
                let marker = if template.name == DEFAULT_TEMPLATE {
                    " (default)"
                } else {
                    ""
                };
                println!("  {:<10} {}{marker}", template.name, template.title);
            }
            Ok(())
        }
        TemplatesAction::Show { name } => {
            let template = run::resolve_template(&name)?;
            print!("{}", template.source);
            if !template.source.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

fn handle_drafts_command(action: DraftsAction, args: &cli::RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let settings = run::load_settings(&paths, args.config.as_deref())?;
    let key = draft_key(&settings.preview.tool_key);

    match action {
        DraftsAction::Where => {
            let store = FileDraftStore::open_or_reset(paths.drafts_file())
                .context("failed to open draft store")?;
            println!("Directories:");
            println!("  config:   {}", paths.config_dir().display());
            println!("  data:     {}", paths.data_dir().display());
            println!("  cache:    {}", paths.cache_dir().display());
            println!("Files:");
            println!("  settings: {}", paths.config_file().display());
            println!("  drafts:   {}", paths.drafts_file().display());
            println!("  scratch:  {}", paths.scratch_file().display());
            let status = if store.load(&key).is_some() {
                "stored"
            } else {
                "none"
            };
            println!("Draft {key}: {status}");
            Ok(())
        }
        DraftsAction::Clear => {
            let mut store = FileDraftStore::open_or_reset(paths.drafts_file())
                .context("failed to open draft store")?;
            if store.remove(&key).context("failed to update draft store")? {
                println!("Removed draft {key}.");
            } else {
                println!("No draft stored under {key}.");
            }
            Ok(())
        }
    }
}
