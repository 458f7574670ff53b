mod config;
mod services;

use crate::config::{AppConfig, Overrides};
use crate::services::schedules::{init_schedules, server_policy, sweep_all};
use backup_core::{utils, BackupService, Outcome, Scheduler};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data directory holding servers/<id> (overrides config and PANEL_DATA_DIR)
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run configured schedules until SIGINT/SIGTERM
    Run,
    /// Create a backup now
    Create { server: String },
    /// List backups, newest first
    List { server: String },
    /// Restore a backup onto the live server data
    Restore { server: String, backup: String },
    /// Delete one backup
    Delete { server: String, backup: String },
    /// Apply the server's retention policy now
    Cleanup { server: String },
    /// Print the server's normalized backup policy
    CheckPolicy { server: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config = AppConfig::load(
        args.config.as_deref(),
        Overrides {
            data_dir: args.data_dir,
            log_level: args.log_level,
        },
    )?;
    utils::logger::init(&config.log_level)?;

    let service = Arc::new(
        BackupService::new(&config.data_dir).with_compression_level(config.compression_level),
    );

    let command = args.command.unwrap_or(Command::Run);
    let succeeded = match command {
        Command::Run => {
            run(service, &config).await?;
            true
        }
        Command::Create { server } => print(service.create(&server).await)?,
        Command::List { server } => print(service.list(&server).await)?,
        Command::Restore { server, backup } => print(service.restore(&server, &backup).await)?,
        Command::Delete { server, backup } => print(service.delete(&server, &backup).await)?,
        Command::Cleanup { server } => {
            let result = match server_policy(&service, &config.file, &server) {
                Ok(policy) => service.apply_retention(&server, &policy).await,
                Err(e) => Err(e),
            };
            print(result)?
        }
        Command::CheckPolicy { server } => print(server_policy(&service, &config.file, &server))?,
    };

    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn run(service: Arc<BackupService>, config: &AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        "Starting panel-backupd v{} (data_dir: {})",
        env!("CARGO_PKG_VERSION"),
        config.data_dir.display()
    );
    std::fs::create_dir_all(&config.data_dir)?;

    sweep_all(&service, &config.file).await;

    let scheduler = Scheduler::new(Arc::clone(&service));
    init_schedules(&scheduler, &service, &config.file);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));
    cancel.cancelled().await;

    tracing::info!("Shutting down...");
    let stopped = scheduler.stop_all();
    tracing::info!("Stopped {} schedules", stopped);
    Ok(())
}

/// Print the outcome as JSON; returns whether it succeeded.
fn print<T: Serialize>(result: backup_core::Result<T>) -> anyhow::Result<bool> {
    let outcome = Outcome::from(result);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.success)
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    cancel.cancel();
}
