// CLI binary: exits with a message on unrecoverable errors.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gantt_pilot::audit::{self, AuditRecord};
use gantt_pilot::chart::HeadlessChart;
use gantt_pilot::dispatcher::{CommandDispatcher, Outcome, OutcomeStatus, Workspace};
use gantt_pilot::registry::{catalog, execute::execute_tool_call, CommandOutput};
use gantt_pilot::session::{Session, SessionServices};
use gantt_pilot::settings::{self, AppSettings};
use gantt_pilot::store::{self, ProjectFile};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "gantt-pilot-cli", about = "Drive a Gantt project file from the command line", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project file to operate on
    #[arg(long, global = true, default_value = gantt_pilot::paths::DEFAULT_PROJECT_FILE)]
    project: PathBuf,

    /// Config directory override (settings, credentials, audit logs)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the command registry as JSON
    Tools,
    /// Command discovery: categories, a category, or one command
    Help { topic: Option<String> },
    /// Run one command directly and save the project
    Run {
        /// Command name, e.g. add_task
        command: String,
        /// Command parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
    /// Translate a message with the model and apply the result
    Chat { message: String },
    /// Print the id snapshot the translator would see
    Snapshot,
    /// Human-readable outline of the project
    Describe,
    /// Restore the project file saved before the last change
    Undo,
}

// ── Helpers ──────────────────────────────────────────────────────

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    process::exit(1);
}

fn load_workspace(path: &Path) -> Workspace {
    let file = store::load_or_default(path).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())));
    Workspace::new(file.project, file.view, Box::new(HeadlessChart::new()))
}

fn save_workspace(path: &Path, ws: &Workspace) {
    let file = ProjectFile::new(ws.project.clone(), ws.view.clone());
    if let Err(e) = store::save_project_file(path, &file) {
        fail(format!("{}: {e}", path.display()));
    }
}

fn print_output(output: &CommandOutput, raw_json: bool) {
    if raw_json {
        let json = serde_json::json!({
            "message": output.message,
            "result": output.result,
            "changes": output.changes,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        return;
    }

    println!("{}", output.message);

    let result_json = serde_json::to_value(&output.result).unwrap_or(Value::Null);
    if let Some(data) = result_json.get("data").filter(|d| !d.is_null()) {
        if let Some(s) = data.as_str() {
            println!("{s}");
        } else {
            println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
        }
    }
}

fn print_outcome(outcome: &Outcome, raw_json: bool) {
    if raw_json {
        println!("{}", serde_json::to_string_pretty(outcome).unwrap_or_default());
    } else {
        println!("{}", outcome.message);
    }
}

// ── Subcommands ──────────────────────────────────────────────────

fn run_direct(cli: &Cli, settings: &AppSettings, config_dir: &Path, name: &str, params: Option<&str>) {
    let input: Value = match params {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| fail(format!("--params is not JSON: {e}"))),
        None => serde_json::json!({}),
    };

    let mut ws = load_workspace(&cli.project);
    let dispatcher = CommandDispatcher::new(settings.dispatcher);
    let started = Instant::now();
    let result = execute_tool_call(&dispatcher, &mut ws, name, &input);

    if settings.audit {
        let message = result.as_ref().map(|o| o.message.clone()).map_err(ToString::to_string);
        audit::log_command(
            config_dir,
            &AuditRecord {
                session: None,
                source: "direct",
                command: name,
                params: &input,
                result: message.as_deref().map_err(String::as_str),
                duration: started.elapsed(),
            },
        );
    }

    match result {
        Ok(output) => {
            save_workspace(&cli.project, &ws);
            print_output(&output, cli.json);
        }
        Err(e) => fail(e),
    }
}

async fn run_chat(cli: &Cli, settings: &AppSettings, config_dir: &Path, message: &str) {
    let services = SessionServices::from_settings(settings, config_dir);
    if services.translator.is_none() {
        fail("No model backend configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY.");
    }
    let session = Session::new("cli", Arc::new(services), load_workspace(&cli.project));
    let reply = session.submit(message, None).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reply).unwrap_or_default());
    } else if let Some(text) = &reply.assistant_text {
        println!("{text}");
    }

    if let Some(outcome) = &reply.outcome {
        if !cli.json {
            print_outcome(outcome, false);
        }
        if outcome.status == OutcomeStatus::Applied {
            session.with_workspace(|ws| save_workspace(&cli.project, ws));
        }
    }
    if let Some(e) = reply.error {
        fail(e);
    }
}

fn run_undo(cli: &Cli) {
    let backup = store::backup_path(&cli.project);
    if !backup.exists() {
        fail("Nothing to undo");
    }
    let previous = store::load_project_file(&backup).unwrap_or_else(|e| fail(format!("{}: {e}", backup.display())));
    if let Err(e) = store::save_project_file(&cli.project, &previous) {
        fail(e);
    }
    println!("Restored {}", cli.project.display());
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gantt_pilot=warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.clone().unwrap_or_else(gantt_pilot::paths::app_config_dir);
    let settings = settings::resolve_settings(&config_dir).unwrap_or_else(|e| fail(e));

    match &cli.command {
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&catalog::to_json_schema()).unwrap_or_default());
        }
        Commands::Help { topic } => println!("{}", catalog::help_text(topic.as_deref())),
        Commands::Run { command, params } => run_direct(&cli, &settings, &config_dir, command, params.as_deref()),
        Commands::Chat { message } => run_chat(&cli, &settings, &config_dir, message).await,
        Commands::Snapshot => {
            let ws = load_workspace(&cli.project);
            let snapshot = ws.snapshot(settings.translator.snapshot_limit);
            println!("{}", serde_json::to_string_pretty(&snapshot).unwrap_or_default());
        }
        Commands::Describe => {
            let ws = load_workspace(&cli.project);
            println!("{}", gantt_pilot::describe::describe_project(&ws.project, &ws.view));
        }
        Commands::Undo => run_undo(&cli),
    }
}
