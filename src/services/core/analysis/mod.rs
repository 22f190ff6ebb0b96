// src/services/core/analysis/mod.rs

pub mod category_classifier;
pub mod order_aggregator;
pub mod productivity;
pub mod report_generator;
pub mod sales_aggregator;
pub mod stop_list;

pub use category_classifier::{CategoryClassifier, StationClass};
pub use order_aggregator::{OrderAggregator, OrderMetrics};
pub use productivity::{
    ProductivityBand, ProductivityCalculator, ProductivityConfig, ProductivityOutcome,
    WagePolicy, WageSource,
};
pub use report_generator::ReportGenerator;
pub use sales_aggregator::{SalesAggregator, SalesMetrics};
pub use stop_list::{StopBucket, StopListReport};
