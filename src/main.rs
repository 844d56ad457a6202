use active_sessions::{
    ActiveSession, ActiveSessions, GlobalActiveSessions, LegacyStoreFactory, RegistryConfig,
    SessionCountWatcher,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "active-sessions")]
#[command(about = "Inspect and manage the active session registry")]
#[command(version)]
#[command(long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("ACTIVE_SESSIONS_GIT_SHA"), ")"))]
#[command(arg_required_else_help = true)]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List valid sessions, most relevant first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the number of valid sessions
    Count,
    /// Create a new session
    Create {
        /// Project path, or "none"
        #[arg(long, default_value = "none")]
        project: String,
        /// Working directory
        #[arg(long, default_value = "~")]
        working_dir: String,
        /// Do not start in the default working directory
        #[arg(long)]
        no_initial: bool,
    },
    /// Show one session's properties
    Show { id: String },
    /// Remove a session and its suspended data
    Destroy { id: String },
    /// Print the session count whenever it changes (Ctrl-C to stop)
    Watch,
    /// List server-wide session process records
    GlobalList,
}

#[derive(Serialize)]
struct SessionSummary {
    id: String,
    label: String,
    project: String,
    working_dir: String,
    r_version: String,
    running: bool,
    executing: bool,
    last_used: f64,
    suspend_size: u64,
}

impl SessionSummary {
    fn from_session(session: &ActiveSession) -> Self {
        Self {
            id: session.id().to_string(),
            label: session.label(),
            project: session.project(),
            working_dir: session.working_dir(),
            r_version: session.r_version(),
            running: session.running(),
            executing: session.executing(),
            last_used: session.last_used(),
            suspend_size: session.suspend_size(),
        }
    }
}

fn format_last_used(ms: f64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .filter(|_| ms > 0.0)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "never".to_string())
}

fn state_label(summary: &SessionSummary) -> &'static str {
    if summary.executing {
        "executing"
    } else if summary.running {
        "running"
    } else {
        "idle"
    }
}

fn print_session(session: &ActiveSession) {
    let summary = SessionSummary::from_session(session);
    println!("id:           {}", summary.id);
    println!("label:        {}", summary.label);
    println!("project:      {}", summary.project);
    println!("working dir:  {}", summary.working_dir);
    println!("initial:      {}", session.initial());
    println!("state:        {}", state_label(&summary));
    println!("r version:    {} ({})", summary.r_version, session.r_version_home());
    println!("last used:    {}", format_last_used(summary.last_used));
    println!("suspend size: {} bytes", summary.suspend_size);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RegistryConfig::resolve(cli.config.as_deref())?;
    let registry = ActiveSessions::new(Arc::new(LegacyStoreFactory), &config.root_storage_path);

    match cli.command {
        Command::List { json } => {
            let summaries: Vec<SessionSummary> = registry
                .list(&config.user_home, config.project_sharing_enabled)
                .iter()
                .map(SessionSummary::from_session)
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for summary in &summaries {
                    println!(
                        "{:<10} {:<10} {:<20} {}",
                        summary.id,
                        state_label(summary),
                        format_last_used(summary.last_used),
                        summary.project
                    );
                }
            }
        }
        Command::Count => {
            println!(
                "{}",
                registry.count(&config.user_home, config.project_sharing_enabled)
            );
        }
        Command::Create {
            project,
            working_dir,
            no_initial,
        } => {
            let session = registry
                .create(&project, &working_dir, !no_initial)
                .context("Failed to create session")?;
            println!("{}", session.id());
        }
        Command::Show { id } => {
            let session = registry.get(&id);
            if session.is_empty() {
                anyhow::bail!("No session with id {}", id);
            }
            print_session(&session);
        }
        Command::Destroy { id } => {
            let session = registry.get(&id);
            if session.is_empty() {
                anyhow::bail!("No session with id {}", id);
            }
            session
                .destroy()
                .with_context(|| format!("Failed to destroy session {}", id))?;
        }
        Command::Watch => {
            let watcher = SessionCountWatcher::start(
                Arc::new(registry),
                config.user_home.clone(),
                config.project_sharing_enabled,
                config.poll_interval(),
                |count| println!("{}", count),
            );
            tokio::signal::ctrl_c()
                .await
                .context("Failed to wait for Ctrl-C")?;
            watcher.stop().await;
        }
        Command::GlobalList => {
            let sessions = GlobalActiveSessions::new(config.global_sessions_path());
            for session in sessions.list() {
                println!(
                    "{:<10} {:<16} {:<30} kill after {}h",
                    session.session_id(),
                    session.username(),
                    session.user_home_dir(),
                    session.session_timeout_kill_hours()
                );
            }
        }
    }

    Ok(())
}
