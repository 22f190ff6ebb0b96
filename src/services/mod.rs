// src/services/mod.rs

// Core services organized by domain
pub mod core;

// Re-export commonly used services
pub use core::analysis::{
    CategoryClassifier, OrderAggregator, ProductivityCalculator, ReportGenerator, SalesAggregator,
};
pub use core::auth::TokenManager;
pub use core::backends::{CloudPosClient, OnPremPosClient, ReqwestTransport};
pub use core::diagnostics::DiagnosticsReport;
pub use core::infrastructure::{AppConfig, CatalogCache, RetryService, ServiceContainer};
pub use core::normalize::{FieldResolver, ResponseNormalizer};
pub use core::planner::QueryPlanner;
