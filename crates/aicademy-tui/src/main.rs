use std::io::Write;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use aicademy_core::{Config, HttpBackend, WorkflowType};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};

mod app;
mod form;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WorkflowArg {
    /// Outline, briefs, connect and test
    Full,
    /// Executive summary only
    Summary,
}

impl From<WorkflowArg> for WorkflowType {
    fn from(arg: WorkflowArg) -> Self {
        match arg {
            WorkflowArg::Full => WorkflowType::FullTutorial,
            WorkflowArg::Summary => WorkflowType::ExecutiveSummary,
        }
    }
}

#[derive(Parser)]
#[command(name = "aicademy")]
#[command(about = "Turn PDF sources into a curriculum with an AI backend", version)]
struct Cli {
    /// Backend base URL (overrides the config file and AICADEMY_API_BASE_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Which workflow to run
    #[arg(short, long, value_enum, default_value = "full")]
    workflow: WorkflowArg,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(&cli.log_level);

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    info!(api = %config.api_base_url, workflow = ?cli.workflow, "starting");

    let backend = HttpBackend::with_timeout(
        &config.api_base_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let mut app = App::new(config, cli.workflow.into(), Arc::new(backend));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut app, &mut terminal).await;
    tui::restore()?;

    if let Err(e) = &result {
        error!(error = %e, "exiting with error");
    }
    result
}

async fn run(app: &mut App, terminal: &mut tui::Tui) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;

        if app.edit_requested {
            app.edit_requested = false;
            events.stop();
            edit_current_artifact(app, terminal)?;
            events = tui::EventHandler::new();
        }
    }
    Ok(())
}

/// Hand the artifact to `$EDITOR` and store whatever comes back
fn edit_current_artifact(app: &mut App, terminal: &mut tui::Tui) -> Result<()> {
    let Some(handle) = app.current_handle() else {
        return Ok(());
    };
    let original = handle.artifact();

    match tui::suspend(terminal, || edit_in_editor(&original))? {
        Ok(edited) if edited != original => {
            handle.set_artifact(edited);
            app.status = Some("Saved your edits.".to_string());
        }
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "external editor failed");
            app.status = Some(format!("Editor failed: {}", e));
        }
    }
    Ok(())
}

fn edit_in_editor(content: &str) -> Result<String> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string());

    let mut file = tempfile::Builder::new()
        .prefix("aicademy-")
        .suffix(".md")
        .tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;

    let status = Command::new(&editor)
        .arg(file.path())
        .status()
        .with_context(|| format!("launching {}", editor))?;
    if !status.success() {
        bail!("{} exited with {}", editor, status);
    }

    let edited = std::fs::read_to_string(file.path())?;
    Ok(edited)
}
