//! Command-line surface. Each subcommand maps onto one service operation and
//! prints its result as pretty JSON.

use crate::error::AppResult;
use crate::services::JobKind;
use crate::AppState;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "price-tracker")]
#[command(about = "Track e-commerce product prices over time")]
#[command(version)]
pub struct Cli {
    /// Product document path
    #[arg(long, global = true, env = "DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Directory for weekly reports
    #[arg(long, global = true, env = "REPORTS_DIR")]
    pub reports_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the background scheduler until Ctrl+C
    Serve,
    /// Start tracking a product URL (or record a fresh reading)
    Track { url: String },
    /// List tracked products
    List,
    /// Show one product
    Show { product_id: String },
    /// Price history of one product
    History { product_id: String },
    /// Statistics for one product
    Stats { product_id: String },
    /// Stop tracking a product
    Delete { product_id: String },
    /// Check one product now
    Update { product_id: String },
    /// Check every product in the background
    UpdateAll,
    /// Products not checked recently
    Stale {
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Check every stale product now
    UpdateStale {
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Run one scheduled job immediately
    RunJob { job: JobKind },
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute a one-shot command. `serve` is handled by the binary.
pub async fn execute(command: Command, state: &AppState) -> AppResult<()> {
    let stale_default = state.config.scheduler.stale_threshold_hours;
    let tracker = &state.tracker;

    match command {
        Command::Serve => Ok(()),
        Command::Track { url } => print_json(&tracker.track_product(&url).await?),
        Command::List => {
            let products = tracker.list_products().await?;
            print_json(&serde_json::json!({
                "total_count": products.len(),
                "products": products,
            }))
        }
        Command::Show { product_id } => print_json(&tracker.get_product(&product_id).await?),
        Command::History { product_id } => print_json(&tracker.price_history(&product_id).await?),
        Command::Stats { product_id } => print_json(&tracker.product_stats(&product_id).await?),
        Command::Delete { product_id } => {
            let message = tracker.delete_product(&product_id).await?;
            print_json(&serde_json::json!({ "message": message }))
        }
        Command::Update { product_id } => print_json(&tracker.update_product_now(&product_id).await?),
        Command::UpdateAll => {
            // The one-shot binary waits for the batch instead of detaching it
            let report = tracker.update_all().await?;
            print_json(&report)
        }
        Command::Stale { hours } => {
            print_json(&tracker.stale_products(hours.unwrap_or(stale_default)).await?)
        }
        Command::UpdateStale { hours } => {
            print_json(&tracker.update_stale_products(hours.unwrap_or(stale_default)).await?)
        }
        Command::RunJob { job } => {
            let outcome = state
                .scheduler
                .run_job(job)
                .await
                .map_err(|e| crate::AppError::Message(format!("{:#}", e)))?;
            print_json(&outcome)
        }
    }
}
