use crate::engine::{apply_observation, create_product, product_stats, ChangeResult, Observation, ProductStats};
use crate::error::{option_to_result, AppError, AppResult};
use crate::extractor::{ExtractionError, Extractor};
use crate::identity::{canonicalize, resolve_id};
use crate::models::{ChangeType, LegacyPriceRecord, PriceHistoryEntry, Product};
use crate::repositories::ProductRepository;
use crate::services::batch_runner::{select_stale, BatchReport, BatchRunner};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of a tracking request for a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    NewProduct,
    PriceChanged,
    NoChange,
}

/// Response to [`TrackerService::track_product`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackResult {
    pub message: String,
    pub product_id: String,
    pub clean_url: String,
    pub current_price: String,
    pub product_name: Option<String>,
    pub image_url: Option<String>,
    pub status: TrackStatus,
}

/// Product listing row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: Product,
    pub price_history_count: usize,
}

/// Price history, either embedded or reconstructed from legacy records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceHistory {
    Embedded(Vec<PriceHistoryEntry>),
    Legacy(Vec<LegacyPriceRecord>),
}

impl PriceHistory {
    pub fn len(&self) -> usize {
        match self {
            PriceHistory::Embedded(entries) => entries.len(),
            PriceHistory::Legacy(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response to [`TrackerService::price_history`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryResponse {
    pub product_id: String,
    pub price_history: PriceHistory,
    pub total_records: usize,
}

/// Response to [`TrackerService::update_product_now`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualUpdateResult {
    pub success: bool,
    pub message: String,
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ManualUpdateResult {
    fn failed(product_id: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            product_id: product_id.to_string(),
            old_price: None,
            new_price: None,
            change_type: None,
            status: None,
        }
    }

    fn from_change(product_id: &str, change: ChangeResult) -> Self {
        Self {
            success: true,
            message: change.message,
            product_id: product_id.to_string(),
            old_price: Some(change.old_price),
            new_price: Some(change.new_price),
            change_type: Some(change.change_type),
            status: Some(change.status.as_str().to_string()),
        }
    }
}

/// Acknowledgment for a batch started in the background
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundAck {
    pub success: bool,
    pub message: String,
    pub total_products: usize,
}

/// Product that has not been checked recently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleProduct {
    pub product_id: String,
    pub product_name: String,
    pub last_updated: String,
    /// None when `last_updated` cannot be read
    pub hours_since_update: Option<f64>,
}

/// Response to [`TrackerService::update_stale_products`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleUpdateResult {
    pub success: bool,
    pub message: String,
    pub updated_count: usize,
    pub failed_count: usize,
    pub total_stale: usize,
}

/// On-demand tracking operations
#[derive(Clone)]
pub struct TrackerService {
    runner: BatchRunner,
    manual_delay: Duration,
}

impl TrackerService {
    /// Create a new TrackerService
    pub fn new(runner: BatchRunner) -> Self {
        Self {
            runner,
            manual_delay: Duration::from_secs(1),
        }
    }

    /// Set the pause between fetches for on-demand batches
    pub fn with_manual_delay(mut self, delay: Duration) -> Self {
        self.manual_delay = delay;
        self
    }

    fn repo(&self) -> &ProductRepository {
        self.runner.repository()
    }

    fn manual_runner(&self) -> BatchRunner {
        self.runner.clone().with_delay(self.manual_delay)
    }

    /// Start tracking a URL, or record a fresh reading if it is already tracked
    pub async fn track_product(&self, url: &str) -> AppResult<TrackResult> {
        let product_id = resolve_id(url);
        let clean_url = canonicalize(url);

        let snapshot = self.runner.extractor().fetch(url).await?;
        if !snapshot.has_price() {
            return Err(ExtractionError::PriceNotFound(url.to_string()).into());
        }
        let observation: Observation = snapshot.into();

        let (product, change) = self
            .repo()
            .mutate(|document| match document.find_mut(&product_id) {
                Some(existing) => {
                    let change = apply_observation(existing, &observation);
                    (existing.clone(), Some(change))
                }
                None => {
                    let product = create_product(&product_id, url, &clean_url, observation.clone());
                    document.products.push(product.clone());
                    (product, None)
                }
            })
            .await?;

        let (status, message) = match change {
            Some(change) => {
                self.runner.announce(&product, &change);
                let status = if change.is_change() {
                    TrackStatus::PriceChanged
                } else {
                    TrackStatus::NoChange
                };
                (status, change.message)
            }
            None => (TrackStatus::NewProduct, "New product added for tracking".to_string()),
        };

        info!("Tracked {} ({:?}): {}", product_id, status, product.current_price);

        Ok(TrackResult {
            message,
            product_id,
            clean_url,
            current_price: product.current_price,
            product_name: product.product_name,
            image_url: product.image_url,
            status,
        })
    }

    /// Every tracked product with its history length
    pub async fn list_products(&self) -> AppResult<Vec<ProductSummary>> {
        let products = self.repo().find_all().await?;
        Ok(products
            .into_iter()
            .map(|product| ProductSummary {
                price_history_count: product.price_history.len(),
                product,
            })
            .collect())
    }

    pub async fn get_product(&self, product_id: &str) -> AppResult<Product> {
        let product = self.repo().find_by_id(product_id).await?;
        option_to_result(product, &format!("Product {} not found", product_id))
    }

    /// Embedded history, falling back to legacy flat records
    pub async fn price_history(&self, product_id: &str) -> AppResult<PriceHistoryResponse> {
        let document = self.repo().load().await?;

        let embedded = document
            .find(product_id)
            .map(|product| product.price_history.clone())
            .filter(|entries| !entries.is_empty());

        let price_history = match embedded {
            Some(entries) => PriceHistory::Embedded(entries),
            None => PriceHistory::Legacy(document.legacy_history(product_id)),
        };

        if price_history.is_empty() {
            return Err(AppError::NotFound(format!(
                "No price history found for product {}",
                product_id
            )));
        }

        Ok(PriceHistoryResponse {
            product_id: product_id.to_string(),
            total_records: price_history.len(),
            price_history,
        })
    }

    pub async fn product_stats(&self, product_id: &str) -> AppResult<ProductStats> {
        let product = self.get_product(product_id).await?;
        Ok(product_stats(&product))
    }

    /// Remove a product and its legacy records
    pub async fn delete_product(&self, product_id: &str) -> AppResult<String> {
        if !self.repo().delete(product_id).await? {
            return Err(AppError::NotFound(format!("Product {} not found", product_id)));
        }
        info!("Deleted product {}", product_id);
        Ok(format!("Product {} deleted successfully", product_id))
    }

    /// Check one product right now
    pub async fn update_product_now(&self, product_id: &str) -> AppResult<ManualUpdateResult> {
        let product = self.get_product(product_id).await?;
        Ok(self.update_one(&product).await)
    }

    /// Extraction problems become an unsuccessful result; anything else is
    /// reported in the message
    async fn update_one(&self, product: &Product) -> ManualUpdateResult {
        let product_id = product.product_id.as_str();

        match self.runner.refresh_product(product_id, &product.original_url).await {
            Ok(change) => ManualUpdateResult::from_change(product_id, change),
            Err(AppError::Extraction(e)) => {
                warn!("Could not fetch current price for {}: {}", product_id, e);
                ManualUpdateResult::failed(product_id, "Could not fetch current price")
            }
            Err(e) => {
                error!("Error updating product {}: {}", product_id, e);
                ManualUpdateResult::failed(product_id, format!("Error updating product: {}", e))
            }
        }
    }

    /// Start a batch over every product without waiting for it
    pub async fn update_all_in_background(&self) -> AppResult<BackgroundAck> {
        let total_products = self.repo().count().await?;

        if total_products == 0 {
            return Ok(BackgroundAck {
                success: false,
                message: "No products found to update".to_string(),
                total_products: 0,
            });
        }

        let runner = self.manual_runner();
        tokio::spawn(async move {
            if let Err(e) = runner.run_all("Manual update").await {
                error!("Background update failed: {}", e);
            }
        });

        Ok(BackgroundAck {
            success: true,
            message: format!("Queued batch update for {} products", total_products),
            total_products,
        })
    }

    /// Check every product and wait for the batch to finish
    pub async fn update_all(&self) -> AppResult<BatchReport> {
        self.manual_runner().run_all("Manual update").await
    }

    /// Products not checked within `threshold_hours`
    pub async fn stale_products(&self, threshold_hours: i64) -> AppResult<Vec<StaleProduct>> {
        let products = self.repo().find_all().await?;
        let now = Utc::now();

        Ok(select_stale(&products, threshold_hours, now)
            .into_iter()
            .map(|product| StaleProduct {
                product_id: product.product_id.clone(),
                product_name: product.display_name().to_string(),
                last_updated: product.last_updated.clone(),
                hours_since_update: product
                    .last_updated_time()
                    .map(|at| ((now - at).num_seconds() as f64 / 3600.0 * 10.0).round() / 10.0),
            })
            .collect())
    }

    /// Check every stale product now, one at a time
    pub async fn update_stale_products(&self, threshold_hours: i64) -> AppResult<StaleUpdateResult> {
        let products = self.repo().find_all().await?;
        let stale: Vec<Product> = select_stale(&products, threshold_hours, Utc::now())
            .into_iter()
            .cloned()
            .collect();

        if stale.is_empty() {
            return Ok(StaleUpdateResult {
                success: true,
                message: "All products are up to date".to_string(),
                updated_count: 0,
                failed_count: 0,
                total_stale: 0,
            });
        }

        let report = self.manual_runner().run(&stale, "Stale update").await;

        Ok(StaleUpdateResult {
            success: true,
            message: format!(
                "Updated {} stale products, {} failed",
                report.successful, report.failed
            ),
            updated_count: report.successful,
            failed_count: report.failed,
            total_stale: report.total,
        })
    }
}
