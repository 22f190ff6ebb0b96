//! Per-run diagnostics.
//!
//! Every report carries a record of which sub-methods ran, which produced
//! data, and what failed, so a partial-data situation reads differently
//! from a total outage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Errors kept per run; later ones are dropped and counted.
const MAX_ERRORS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub run_id: Uuid,
    pub methods_tried: Vec<String>,
    pub methods_succeeded: Vec<String>,
    pub row_counts: BTreeMap<String, usize>,
    pub excluded_deleted_orders: u64,
    pub errors: Vec<String>,
    pub suppressed_errors: u64,
}

impl DiagnosticsReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            methods_tried: Vec::new(),
            methods_succeeded: Vec::new(),
            row_counts: BTreeMap::new(),
            excluded_deleted_orders: 0,
            errors: Vec::new(),
            suppressed_errors: 0,
        }
    }

    pub fn record_attempt(&mut self, method: &str) {
        self.methods_tried.push(method.to_string());
    }

    pub fn record_success(&mut self, method: &str, row_count: usize) {
        self.methods_succeeded.push(method.to_string());
        self.row_counts.insert(method.to_string(), row_count);
    }

    pub fn record_error(&mut self, method: &str, error: &str) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(format!("{}: {}", method, error));
        } else {
            self.suppressed_errors += 1;
        }
    }

    pub fn note_deleted_orders(&mut self, count: u64) {
        self.excluded_deleted_orders += count;
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty() || self.suppressed_errors > 0
    }

    /// The footer appended to every human-facing summary.
    pub fn render(&self) -> String {
        let mut lines = vec!["--- diagnostics ---".to_string()];
        lines.push(format!(
            "methods: {} tried, {} returned data",
            self.methods_tried.len(),
            self.methods_succeeded.len()
        ));
        for (method, count) in &self.row_counts {
            lines.push(format!("  {}: {} rows", method, count));
        }
        if self.excluded_deleted_orders > 0 {
            lines.push(format!(
                "excluded deleted orders: {}",
                self.excluded_deleted_orders
            ));
        }
        if self.errors.is_empty() {
            lines.push("errors: none".to_string());
        } else {
            lines.push(format!("errors: {}", self.errors.len()));
            for error in &self.errors {
                lines.push(format!("  ! {}", error));
            }
            if self.suppressed_errors > 0 {
                lines.push(format!("  ... and {} more", self.suppressed_errors));
            }
        }
        lines.join("\n")
    }
}

impl Default for DiagnosticsReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_success_error_flow() {
        let mut diag = DiagnosticsReport::new();
        diag.record_attempt("olap[OpenDate.Typed]");
        diag.record_success("olap[OpenDate.Typed]", 7);
        diag.record_attempt("olap[HourOpen]");
        diag.record_error("olap[HourOpen]", "connection failed");

        assert_eq!(diag.methods_tried.len(), 2);
        assert_eq!(diag.methods_succeeded.len(), 1);
        assert_eq!(diag.row_counts["olap[OpenDate.Typed]"], 7);
        assert!(diag.has_failures());

        let text = diag.render();
        assert!(text.contains("2 tried, 1 returned data"));
        assert!(text.contains("olap[HourOpen]: connection failed"));
    }

    #[test]
    fn test_error_list_is_bounded() {
        let mut diag = DiagnosticsReport::new();
        for i in 0..30 {
            diag.record_error("m", &format!("error {}", i));
        }
        assert_eq!(diag.errors.len(), 20);
        assert_eq!(diag.suppressed_errors, 10);
        assert!(diag.render().contains("and 10 more"));
    }

    #[test]
    fn test_deleted_orders_counter() {
        let mut diag = DiagnosticsReport::new();
        diag.note_deleted_orders(2);
        diag.note_deleted_orders(1);
        assert_eq!(diag.excluded_deleted_orders, 3);
        assert!(diag.render().contains("excluded deleted orders: 3"));
    }
}
