// Module declarations
pub mod services;
pub mod types;
pub mod utils;

// Re-export the pieces callers touch most often
pub use services::core::analysis::{
    CategoryClassifier, OrderAggregator, ProductivityCalculator, SalesAggregator, StationClass,
};
pub use services::core::auth::TokenManager;
pub use services::core::backends::{CloudPosClient, HttpTransport, OnPremPosClient};
pub use services::core::diagnostics::DiagnosticsReport;
pub use services::core::infrastructure::{CatalogCache, RetryService, ServiceContainer};
pub use services::core::normalize::{FieldResolver, LogicalField, ResponseNormalizer};
pub use services::core::planner::QueryPlanner;
pub use types::{PeriodTotals, Row};
pub use utils::{RestoError, RestoResult};
