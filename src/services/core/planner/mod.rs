// src/services/core/planner/mod.rs

pub mod query_planner;

pub use query_planner::{
    DayCollection, PlannerConfig, ProductivityRowSets, QueryPlanner, SalesRowSets,
};
