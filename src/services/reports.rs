use crate::engine::{top_volatile, VolatilityEntry};
use crate::models::{format_timestamp, Product};
use crate::services::batch_runner::BatchReport;
use crate::store::StoreError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Snapshot of the whole catalogue, logged once a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: String,
    pub total_products: usize,
    pub total_price_checks: u64,
    pub total_price_changes: u64,
    /// Products checked within the last 24 hours
    pub active_products: usize,
}

/// Weekly volatility report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub report_date: String,
    pub total_products: usize,
    pub products_with_changes: usize,
    pub top_volatile_products: Vec<VolatilityEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan: Option<BatchReport>,
}

fn is_recently_updated(product: &Product, now: DateTime<Utc>) -> bool {
    product
        .last_updated_time()
        .map_or(false, |last_updated| now - last_updated < ChronoDuration::days(1))
}

/// Summarize the catalogue as of `now`
pub fn daily_summary(products: &[Product], now: DateTime<Utc>) -> DailySummary {
    DailySummary {
        date: format_timestamp(now),
        total_products: products.len(),
        total_price_checks: products.iter().map(|p| p.total_price_checks).sum(),
        total_price_changes: products.iter().map(|p| p.price_changes).sum(),
        active_products: products
            .iter()
            .filter(|p| is_recently_updated(p, now))
            .count(),
    }
}

/// Rank products by price spread and keep the `top_n` most volatile
pub fn weekly_report(products: &[Product], top_n: usize, now: DateTime<Utc>) -> WeeklyReport {
    WeeklyReport {
        report_date: format_timestamp(now),
        total_products: products.len(),
        products_with_changes: products.iter().filter(|p| p.price_changes > 0).count(),
        top_volatile_products: top_volatile(products, top_n),
        scan: None,
    }
}

/// File name used for a report generated on `date`
pub fn weekly_report_file_name(date: DateTime<Utc>) -> String {
    format!("weekly_report_{}.json", date.format("%Y%m%d"))
}

/// Write a weekly report as pretty JSON into `dir`, returning the file path
pub async fn write_weekly_report(
    report: &WeeklyReport,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, StoreError> {
    let path = dir.join(weekly_report_file_name(now));
    let bytes = serde_json::to_vec_pretty(report)?;

    let write_error = |source| StoreError::Write {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(dir).await.map_err(write_error)?;
    fs::write(&path, bytes).await.map_err(write_error)?;

    info!("Weekly report written to {:?}", path);
    Ok(path)
}
