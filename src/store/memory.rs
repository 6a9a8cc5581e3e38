use crate::models::PriceDocument;
use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Volatile store holding the document in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: RwLock<PriceDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document
    pub fn with_document(document: PriceDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self) -> Result<PriceDocument, StoreError> {
        Ok(self.document.read().await.clone())
    }

    async fn save(&self, document: &PriceDocument) -> Result<(), StoreError> {
        *self.document.write().await = document.clone();
        Ok(())
    }
}
