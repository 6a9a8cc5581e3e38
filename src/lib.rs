//! Price Tracker Library
//!
//! Tracks e-commerce product prices over time. Exposes the history engine,
//! the product store, page extractors and the scheduled tracking services for
//! use by the binary and by tests.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod models;
pub mod repositories;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use extractor::{Extractor, ExtractorRegistry, PageFetcher};
use repositories::ProductRepository;
use services::{
    BatchRunner, CompositeNotifier, JobContext, LogNotifier, Notifier, PriceScheduler, TrackerService,
    WebhookNotifier,
};
use std::sync::Arc;
use store::{DocumentStore, JsonFileStore};

/// Application state wiring the store, extractors and services together
pub struct AppState {
    pub config: AppConfig,
    pub product_repo: ProductRepository,
    pub runner: BatchRunner,
    pub tracker: TrackerService,
    pub scheduler: Arc<PriceScheduler>,
}

impl AppState {
    /// Create a new AppState from explicit collaborators
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn Extractor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let product_repo = ProductRepository::new(store);

        let runner = BatchRunner::new(product_repo.clone(), extractor, notifier)
            .with_delay(config.scheduler.scheduled_request_delay())
            .with_policy(config.scheduler.priority);

        let tracker = TrackerService::new(runner.clone())
            .with_manual_delay(config.scheduler.manual_request_delay());

        let context = JobContext::new(runner.clone())
            .with_reports_dir(config.storage.reports_dir.clone())
            .with_volatility_top_n(config.scheduler.volatility_top_n);
        let scheduler = Arc::new(PriceScheduler::new(context, config.scheduler.clone()));

        Self {
            config,
            product_repo,
            runner,
            tracker,
            scheduler,
        }
    }

    /// Production wiring: JSON file store, HTML extractors, log and webhook notifiers
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(config.storage.data_file.clone()));

        let fetcher = PageFetcher::new(&config.scraping.user_agent, config.scraping.request_timeout())
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        let extractor: Arc<dyn Extractor> = Arc::new(ExtractorRegistry::html(fetcher));

        let mut notifier = CompositeNotifier::new().with(Arc::new(LogNotifier));
        if !config.notifications.webhook_urls.is_empty() {
            let webhook = WebhookNotifier::new(
                config.notifications.webhook_urls.clone(),
                config.notifications.policy,
                config.scraping.request_timeout(),
            )
            .map_err(|e| AppError::Config(format!("Failed to build webhook client: {}", e)))?;
            notifier = notifier.with(Arc::new(webhook));
        }

        Ok(Self::new(config, store, extractor, Arc::new(notifier)))
    }
}
