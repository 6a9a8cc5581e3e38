#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use price_tracker::engine::{create_product_at, ChangeResult, Observation};
use price_tracker::extractor::{ExtractionError, Extractor, ProductSnapshot};
use price_tracker::models::{PriceDocument, Product};
use price_tracker::repositories::ProductRepository;
use price_tracker::services::{BatchRunner, Notifier, TrackerService};
use price_tracker::store::{DocumentStore, MemoryStore, StoreError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scripted extractor answers for a URL
#[derive(Debug, Clone)]
pub enum Scripted {
    Page(ProductSnapshot),
    /// Page fetched but no price on it
    Miss,
    /// Request failed outright
    Fail,
}

/// Extractor that answers from a per-URL script instead of the network
#[derive(Default)]
pub struct ScriptedExtractor {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, response: Scripted) {
        self.script.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_price(&self, url: &str, price: &str) {
        self.set(
            url,
            Scripted::Page(ProductSnapshot {
                price: price.to_string(),
                name: None,
                image_url: None,
            }),
        );
    }

    pub fn set_page(&self, url: &str, price: &str, name: &str, image_url: &str) {
        self.set(
            url,
            Scripted::Page(ProductSnapshot {
                price: price.to_string(),
                name: Some(name.to_string()),
                image_url: Some(image_url.to_string()),
            }),
        );
    }

    pub fn fail(&self, url: &str) {
        self.set(url, Scripted::Fail);
    }

    pub fn miss(&self, url: &str) {
        self.set(url, Scripted::Miss);
    }

    /// URLs fetched so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn fetch(&self, url: &str) -> Result<ProductSnapshot, ExtractionError> {
        self.calls.lock().unwrap().push(url.to_string());

        let scripted = self.script.lock().unwrap().get(url).cloned();
        match scripted {
            Some(Scripted::Page(snapshot)) => Ok(snapshot),
            Some(Scripted::Miss) => Ok(ProductSnapshot::not_found()),
            Some(Scripted::Fail) => Err(ExtractionError::HttpStatus {
                status: 503,
                url: url.to_string(),
            }),
            None => Err(ExtractionError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// Notifier that remembers every change it was told about
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, ChangeResult)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(String, ChangeResult)> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn on_price_change(&self, product: &Product, change: &ChangeResult) {
        self.events
            .lock()
            .unwrap()
            .push((product.product_id.clone(), change.clone()));
    }
}

/// Store whose reads always fail
#[derive(Default)]
pub struct FailingStore {
    loads: AtomicUsize,
}

impl FailingStore {
    /// Number of load attempts so far
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn load(&self) -> Result<PriceDocument, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Read {
            path: PathBuf::from("unreadable.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        })
    }

    async fn save(&self, _document: &PriceDocument) -> Result<(), StoreError> {
        Err(StoreError::Write {
            path: PathBuf::from("unreadable.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        })
    }
}

/// Services wired over an in-memory store with no pacing delays
pub struct TestContext {
    pub store: Arc<dyn DocumentStore>,
    pub extractor: Arc<ScriptedExtractor>,
    pub notifier: Arc<RecordingNotifier>,
    pub repo: ProductRepository,
    pub runner: BatchRunner,
    pub tracker: TrackerService,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_document(document: PriceDocument) -> Self {
        Self::with_store(Arc::new(MemoryStore::with_document(document)))
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        let extractor = Arc::new(ScriptedExtractor::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let repo = ProductRepository::new(store.clone());

        let runner = BatchRunner::new(repo.clone(), extractor.clone(), notifier.clone())
            .with_delay(Duration::ZERO);
        let tracker = TrackerService::new(runner.clone()).with_manual_delay(Duration::ZERO);

        Self {
            store,
            extractor,
            notifier,
            repo,
            runner,
            tracker,
        }
    }

    /// Stored copy of a product
    pub async fn stored(&self, product_id: &str) -> Product {
        self.repo
            .find_by_id(product_id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("product {} missing", product_id))
    }
}

/// Product created `age` ago and last checked at the same time
pub fn product_aged(id: &str, url: &str, price: &str, age: ChronoDuration) -> Product {
    create_product_at(id, url, url, Observation::new(price), Utc::now() - age)
}

/// Product created at a fixed instant
pub fn product_at(id: &str, url: &str, price: &str, at: DateTime<Utc>) -> Product {
    create_product_at(id, url, url, Observation::new(price), at)
}

pub fn url_for(id: &str) -> String {
    format!("https://shop.example.com/items/{}", id)
}
