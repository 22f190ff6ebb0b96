// src/services/core/infrastructure/mod.rs

pub mod catalog_cache;
pub mod retry_service;
pub mod service_container;

pub use catalog_cache::{CatalogCache, CatalogCacheConfig, ProductIndex};
pub use retry_service::{RetryConfig, RetryService};
pub use service_container::{AppConfig, ServiceContainer};
