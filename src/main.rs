//! Price Tracker Service
//!
//! Main entry point. `serve` runs the background scheduler:
//! - high-priority and regular tracking sweeps
//! - daily maintenance summary
//! - weekly full scan with volatility report
//!
//! Every other subcommand performs one operation and prints JSON.

use clap::Parser;
use price_tracker::cli::{self, Cli, Command};
use price_tracker::{AppConfig, AppError, AppResult, AppState};
use tracing::{error, info};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("price_tracker={},reqwest=warn", config.log_level).into());

    // Logs go to stderr so command output on stdout stays machine-readable
    if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;
    if let Some(data_file) = cli.data_file.clone() {
        config.storage.data_file = data_file;
    }
    if let Some(reports_dir) = cli.reports_dir.clone() {
        config.storage.reports_dir = Some(reports_dir);
    }

    init_tracing(&config);

    let state = AppState::from_config(config)?;

    match cli.command {
        Command::Serve => serve(state).await,
        command => cli::execute(command, &state).await.map_err(|e| {
            error!("{}", e);
            e
        }),
    }
}

async fn serve(state: AppState) -> AppResult<()> {
    let config = &state.config;

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Price Tracker Service Starting                  ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Data file: {}", config.storage.data_file.display());

    // =========================================================================
    // STORE CHECK
    // =========================================================================
    let product_count = state.product_repo.count().await.map_err(|e| {
        error!("Failed to read product store: {}", e);
        AppError::Store(e)
    })?;
    info!("✓ Product store loaded ({} products)", product_count);

    match &config.storage.reports_dir {
        Some(dir) => info!("✓ Weekly reports will be written to {}", dir.display()),
        None => info!("REPORTS_DIR not configured - weekly reports are only logged"),
    }
    if config.notifications.webhook_urls.is_empty() {
        info!("✓ Log notifier initialized");
    } else {
        info!(
            "✓ Log and webhook notifiers initialized ({} webhooks)",
            config.notifications.webhook_urls.len()
        );
    }

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    info!("Starting background tasks...");
    state.scheduler.start().await;

    let status = state.scheduler.status().await;
    for job in &status.jobs {
        info!(
            "✓ {} scheduled ({}), next run {}",
            job.id,
            job.trigger,
            job.next_run.as_deref().unwrap_or("never")
        );
    }

    // =========================================================================
    // READY
    // =========================================================================
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Price Tracker Service Ready!                    ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  Jobs:         {}                                         ║", status.jobs.len());
    info!("║  Environment:  {}                                    ║", config.environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = async {
            if status.jobs.is_empty() {
                info!("No jobs enabled; waiting for shutdown signal");
            }
            // Jobs run until aborted
            futures::future::pending::<()>().await;
        } => {}
    }

    state.scheduler.stop().await;
    info!("Price tracker service shutdown complete");
    Ok(())
}
