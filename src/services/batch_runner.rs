use crate::engine::{apply_observation, ChangeResult, Observation, PriorityPolicy, PriorityTier};
use crate::error::{AppError, AppResult};
use crate::extractor::{ExtractionError, Extractor};
use crate::models::{format_timestamp, Product};
use crate::repositories::ProductRepository;
use crate::services::notifier::Notifier;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of one batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub label: String,
    pub run_id: Uuid,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub price_changes: usize,
    pub started_at: String,
    pub finished_at: String,
}

/// Whether a product has gone unchecked for longer than `threshold_hours`.
///
/// A `last_updated` that cannot be read counts as stale.
pub fn is_stale(product: &Product, threshold_hours: i64, now: DateTime<Utc>) -> bool {
    match product.last_updated_time() {
        Some(last_updated) => now - last_updated > ChronoDuration::hours(threshold_hours),
        None => true,
    }
}

/// Stale products, in stored order
pub fn select_stale(products: &[Product], threshold_hours: i64, now: DateTime<Utc>) -> Vec<&Product> {
    products
        .iter()
        .filter(|product| is_stale(product, threshold_hours, now))
        .collect()
}

/// Drives products through fetch, history update and notification.
///
/// Products are processed one at a time with a fixed pause between fetches.
/// A failure on one product is counted and never stops the batch.
#[derive(Clone)]
pub struct BatchRunner {
    repo: ProductRepository,
    extractor: Arc<dyn Extractor>,
    notifier: Arc<dyn Notifier>,
    policy: PriorityPolicy,
    delay: Duration,
}

impl BatchRunner {
    /// Create a new BatchRunner
    pub fn new(repo: ProductRepository, extractor: Arc<dyn Extractor>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repo,
            extractor,
            notifier,
            policy: PriorityPolicy::default(),
            delay: Duration::from_secs(2),
        }
    }

    /// Set the pause between consecutive fetches
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the priority thresholds used by [`BatchRunner::run_tier`]
    pub fn with_policy(mut self, policy: PriorityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn repository(&self) -> &ProductRepository {
        &self.repo
    }

    pub fn extractor(&self) -> &Arc<dyn Extractor> {
        &self.extractor
    }

    /// Fetch one product page and apply the reading to the stored product.
    ///
    /// The store is re-read after the fetch, so the update lands on the
    /// freshest copy. A product deleted in the meantime is reported as
    /// not found and nothing is written.
    pub async fn refresh_product(&self, product_id: &str, url: &str) -> AppResult<ChangeResult> {
        if url.trim().is_empty() {
            return Err(AppError::Validation(format!("No URL stored for product {}", product_id)));
        }

        let snapshot = self.extractor.fetch(url).await?;
        if !snapshot.has_price() {
            return Err(ExtractionError::PriceNotFound(url.to_string()).into());
        }
        let observation: Observation = snapshot.into();

        let updated = self
            .repo
            .update_with(product_id, |product| {
                let change = apply_observation(product, &observation);
                (product.clone(), change)
            })
            .await?;

        let (product, change) = updated.ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;
        self.announce(&product, &change);

        Ok(change)
    }

    /// Report a persisted check, notifying when the price changed
    pub fn announce(&self, product: &Product, change: &ChangeResult) {
        if change.is_change() {
            info!(
                "Price change detected for {}: {} -> {}",
                product.product_id, change.old_price, change.new_price
            );
            self.notifier.on_price_change(product, change);
        } else {
            debug!(
                "Price check completed for {}: {} (no change)",
                product.product_id, change.new_price
            );
        }
    }

    /// Run a batch over the given products
    pub async fn run(&self, products: &[Product], label: &str) -> BatchReport {
        let started_at = format_timestamp(Utc::now());
        let run_id = Uuid::new_v4();
        let mut successful = 0;
        let mut failed = 0;
        let mut price_changes = 0;

        if products.is_empty() {
            info!("No products to track for {}", label);
        } else {
            info!("Tracking {} products for {} (run {})", products.len(), label, run_id);
        }

        for (i, product) in products.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.refresh_product(&product.product_id, &product.original_url).await {
                Ok(change) => {
                    successful += 1;
                    if change.is_change() {
                        price_changes += 1;
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!("Failed to update {} during {}: {}", product.product_id, label, e);
                }
            }
        }

        let report = BatchReport {
            label: label.to_string(),
            run_id,
            total: products.len(),
            successful,
            failed,
            price_changes,
            started_at,
            finished_at: format_timestamp(Utc::now()),
        };

        info!(
            "{} completed: {} successful, {} failed, {} price changes",
            label, report.successful, report.failed, report.price_changes
        );
        report
    }

    /// Run every stored product
    pub async fn run_all(&self, label: &str) -> AppResult<BatchReport> {
        let products = self.repo.find_all().await?;
        Ok(self.run(&products, label).await)
    }

    /// Run the products currently classified into `tier`
    pub async fn run_tier(&self, tier: PriorityTier, label: &str) -> AppResult<BatchReport> {
        let products = self.repo.find_all().await?;
        let selected: Vec<Product> = self
            .policy
            .select(&products, tier, Utc::now())
            .into_iter()
            .cloned()
            .collect();
        Ok(self.run(&selected, label).await)
    }

    /// Run the products not checked within `threshold_hours`
    pub async fn run_stale(&self, threshold_hours: i64, label: &str) -> AppResult<BatchReport> {
        let products = self.repo.find_all().await?;
        let stale: Vec<Product> = select_stale(&products, threshold_hours, Utc::now())
            .into_iter()
            .cloned()
            .collect();
        Ok(self.run(&stale, label).await)
    }
}
