// ABOUTME: Command-line entry point for muxkeep
// Wires config, logging, the adapter registry and the session service, then renders results as text

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use muxkeep::config::AppConfig;
use muxkeep::models::Session;
use muxkeep::multiplexer::AdapterRegistry;
use muxkeep::session::{SessionError, SessionRepository, SessionService};
use std::path::Path;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "muxkeep", version, about = "Named, durable tmux sessions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a session and start it in the background
    New {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Working directory (defaults to the current one)
        #[arg(short, long, default_value = "")]
        path: String,
    },
    /// List all sessions with their live status
    List,
    /// Show one session by id or name
    Show { session: String },
    /// Attach the terminal to a session until you detach
    Attach { session: String },
    /// Kill a session and forget it
    Delete { session: String },
    /// Kill and forget every session
    KillAll,
    /// Print the multiplexer backend in use
    Backend,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config
        .ensure_directories()
        .context("Failed to prepare data directories")?;
    setup_logging(&config.log_dir);

    let registry = AdapterRegistry::new();
    let multiplexer = registry
        .get(&config.backend, &config.prefix)
        .with_context(|| format!("Failed to initialise the {} backend", config.backend))?;

    let repository = SessionRepository::open(&config.sessions_dir).with_context(|| {
        format!(
            "Failed to open session store at {}",
            config.sessions_dir.display()
        )
    })?;
    let service = SessionService::new(Arc::new(repository), multiplexer)
        .with_default_command(config.default_command.clone());

    if let Err(err) = run(cli.command, &service).await {
        if let Some(hint) = hint_for(&err) {
            eprintln!("{hint}");
        }
        return Err(err.into());
    }

    Ok(())
}

async fn run(command: Command, service: &SessionService) -> Result<(), SessionError> {
    match command {
        Command::New {
            name,
            description,
            path,
        } => match service.create_session(&name, &description, &path).await {
            Ok(session) => println!("Created {} ({}) in {}", session.name, session.id, session.project_path),
            Err(err) => {
                if let Some(session) = err.partial_session() {
                    eprintln!(
                        "Saved {} ({}) but it did not start; it is listed as {}",
                        session.name, session.id, session.status
                    );
                }
                return Err(err);
            }
        },
        Command::List => {
            let report = service.list_sessions_with_report().await?;
            if report.sessions.is_empty() {
                println!("No sessions. Create one with `muxkeep new <name>`.");
            }
            for session in &report.sessions {
                println!("{}", format_row(session));
            }
            if !report.skipped.is_empty() {
                eprintln!("Skipped {} unreadable session record(s)", report.skipped.len());
            }
        }
        Command::Show { session } => {
            let session = service.get_session(&session).await?;
            print_details(&session);
        }
        Command::Attach { session } => service.attach_to_session(&session).await?,
        Command::Delete { session } => {
            service.delete_session(&session).await?;
            println!("Deleted {session}");
        }
        Command::KillAll => {
            let removed = service.kill_all_sessions().await?;
            println!("Deleted {removed} session(s)");
        }
        Command::Backend => {
            let availability = if service.is_backend_available() {
                "available"
            } else {
                "not installed"
            };
            println!("{} ({})", service.get_backend_name(), availability);
        }
    }

    Ok(())
}

fn hint_for(err: &SessionError) -> Option<&'static str> {
    if err.is_backend_unavailable() {
        Some("hint: install tmux or make sure it is on your PATH")
    } else if err.is_not_found() {
        Some("hint: run `muxkeep list` to see sessions, or `muxkeep new <name>` to create one")
    } else {
        None
    }
}

fn format_row(session: &Session) -> String {
    format!(
        "{} {:<24} {:<10} {:>3} panes  {}  {}",
        session.status.indicator(),
        session.name,
        session.status.to_string(),
        session.pane_count,
        session.last_active.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
        session.project_path
    )
}

fn print_details(session: &Session) {
    println!("Name:        {}", session.name);
    println!("ID:          {}", session.id);
    println!("Status:      {} {}", session.status.indicator(), session.status);
    println!("Backend:     {}", session.backend);
    println!("Panes:       {}", session.pane_count);
    println!("Project:     {}", session.project_path);
    if !session.description.is_empty() {
        println!("Description: {}", session.description);
    }
    println!("Created:     {}", session.created_at.with_timezone(&chrono::Local));
    println!("Last active: {}", session.last_active.with_timezone(&chrono::Local));
}

fn setup_logging(log_dir: &Path) {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_file = log_dir.join(format!(
        "muxkeep-{}.log",
        chrono::Local::now().format("%Y%m%d")
    ));

    // Logging is best effort; a CLI must still work on a read-only data dir
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_file) else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false), // No ANSI colors in log file
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "muxkeep=info".into()),
        )
        .init();
}
