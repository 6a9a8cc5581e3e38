pub mod product_repository;

// Re-export all repositories for convenient access
pub use product_repository::ProductRepository;
