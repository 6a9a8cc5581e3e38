//! Durable storage for the product document.
//!
//! The store only knows how to load and save the whole [`PriceDocument`].
//! Every mutation elsewhere is a load, mutate-in-memory, save cycle, so two
//! writers racing on the same store are last-writer-wins: an update made by
//! one can be silently dropped by the other's save. Callers narrow the window
//! by re-loading right before each mutation; nothing here eliminates it.
//! Per-record storage with real concurrency control can replace this trait
//! without touching the engine or the batch runner.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::models::PriceDocument;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading or writing the product document
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored document is corrupt: {0}")]
    Corrupt(String),

    #[error("Failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whole-document persistence
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the current document. A store that was never written yields an
    /// empty document.
    async fn load(&self) -> Result<PriceDocument, StoreError>;

    /// Replace the stored document. Readers see either the old or the new
    /// document, never a partial write.
    async fn save(&self, document: &PriceDocument) -> Result<(), StoreError>;
}
