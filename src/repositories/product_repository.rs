use crate::models::{PriceDocument, Product};
use crate::store::{DocumentStore, StoreError};
use std::sync::Arc;

/// Repository for product data access.
///
/// Each method performs its own load (and save, for writes), so every
/// mutation works on freshly read state.
#[derive(Clone)]
pub struct ProductRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProductRepository {
    /// Create a new ProductRepository
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Load the whole document
    pub async fn load(&self) -> Result<PriceDocument, StoreError> {
        self.store.load().await
    }

    /// All tracked products, in stored order
    pub async fn find_all(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.store.load().await?.products)
    }

    /// Find a product by its identifier
    pub async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        let document = self.store.load().await?;
        Ok(document.find(product_id).cloned())
    }

    /// Append a new product
    pub async fn insert(&self, product: Product) -> Result<(), StoreError> {
        self.mutate(|document| document.products.push(product)).await
    }

    /// Re-load, mutate exactly one product, and save.
    ///
    /// Returns `None` without writing when the product no longer exists.
    pub async fn update_with<F, T>(&self, product_id: &str, f: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut Product) -> T + Send,
        T: Send,
    {
        let mut document = self.store.load().await?;

        let result = match document.find_mut(product_id) {
            Some(product) => f(product),
            None => return Ok(None),
        };

        self.store.save(&document).await?;
        Ok(Some(result))
    }

    /// Re-load, apply an arbitrary change to the document, and save
    pub async fn mutate<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PriceDocument) -> T + Send,
        T: Send,
    {
        let mut document = self.store.load().await?;
        let result = f(&mut document);
        self.store.save(&document).await?;
        Ok(result)
    }

    /// Delete a product and its legacy history records.
    ///
    /// Returns false (and writes nothing) when the product does not exist.
    pub async fn delete(&self, product_id: &str) -> Result<bool, StoreError> {
        let mut document = self.store.load().await?;

        if !document.remove(product_id) {
            return Ok(false);
        }

        self.store.save(&document).await?;
        Ok(true)
    }

    /// Number of tracked products
    pub async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.store.load().await?.products.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{create_product, Observation};
    use crate::store::MemoryStore;

    fn repo() -> ProductRepository {
        ProductRepository::new(Arc::new(MemoryStore::new()))
    }

    fn product(id: &str) -> Product {
        create_product(id, "https://example.com/a", "https://example.com/a", Observation::new("$5"))
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = repo();
        repo.insert(product("a")).await.unwrap();
        repo.insert(product("b")).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert!(repo.find_by_id("b").await.unwrap().is_some());
        assert!(repo.find_by_id("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_with_missing_product() {
        let repo = repo();
        let touched = repo
            .update_with("ghost", |p| p.current_price = "$1".into())
            .await
            .unwrap();
        assert!(touched.is_none());
    }

    #[tokio::test]
    async fn test_update_with_persists() {
        let repo = repo();
        repo.insert(product("a")).await.unwrap();
        repo.update_with("a", |p| p.current_price = "$7".into())
            .await
            .unwrap();
        let stored = repo.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.current_price, "$7");
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo();
        repo.insert(product("a")).await.unwrap();
        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
        assert!(repo.find_by_id("a").await.unwrap().is_none());
    }
}
