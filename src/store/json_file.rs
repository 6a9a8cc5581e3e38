use crate::models::PriceDocument;
use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// Product document kept in a single pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file. The file is created on the
    /// first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Unique sibling path so concurrent saves never share a temp file
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "price_data.json".to_string());
        self.directory()
            .join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()))
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load(&self) -> Result<PriceDocument, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Store file {:?} does not exist yet, starting empty", self.path);
                return Ok(PriceDocument::default());
            }
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(PriceDocument::default());
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.path.display(), e)))
    }

    async fn save(&self, document: &PriceDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)?;

        fs::create_dir_all(self.directory())
            .await
            .map_err(|e| self.write_error(e))?;

        // Write the full document next to the target, then swap it in
        let temp = self.temp_path();
        let written: std::io::Result<()> = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            fs::rename(&temp, &self.path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp).await {
                debug!("Could not remove temp file {:?}: {}", temp, cleanup);
            }
            return Err(self.write_error(e));
        }

        debug!(
            "Saved {} products to {:?}",
            document.products.len(),
            self.path
        );
        Ok(())
    }
}
