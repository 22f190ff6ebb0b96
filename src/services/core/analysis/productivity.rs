//! Cook productivity.
//!
//! `coefficient = (kitchen revenue / days / cooks per shift) / shift wage`.
//! The wage comes from an ordered list of sources (timesheet average,
//! manually entered average, static fallback) because no single source has
//! proven authoritative across deployments.

use crate::utils::{RestoError, RestoResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WageSource {
    /// Average hourly rate from the payroll timesheet times shift length.
    Timesheet {
        avg_hourly_rate: f64,
        shift_hours: f64,
    },
    /// Operator-entered per-shift average.
    ManualAverage { per_shift: f64 },
    /// Static configured fallback.
    StaticFallback { per_shift: f64 },
}

impl WageSource {
    fn per_shift_wage(&self) -> f64 {
        match self {
            WageSource::Timesheet {
                avg_hourly_rate,
                shift_hours,
            } => avg_hourly_rate * shift_hours,
            WageSource::ManualAverage { per_shift } => *per_shift,
            WageSource::StaticFallback { per_shift } => *per_shift,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WageSource::Timesheet { .. } => "timesheet",
            WageSource::ManualAverage { .. } => "manual",
            WageSource::StaticFallback { .. } => "fallback",
        }
    }
}

/// Ordered wage sources; the first strictly positive value wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WagePolicy {
    pub sources: Vec<WageSource>,
}

impl WagePolicy {
    pub fn resolve(&self) -> Option<(f64, &'static str)> {
        for source in &self.sources {
            let wage = source.per_shift_wage();
            if wage > 0.0 {
                return Some((wage, source.name()));
            }
        }
        None
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductivityConfig {
    pub cooks_per_shift: u32,
    pub wage_policy: WagePolicy,
}

impl ProductivityConfig {
    pub fn validate(&self) -> RestoResult<()> {
        for source in &self.wage_policy.sources {
            if let WageSource::Timesheet { shift_hours, .. } = source {
                if *shift_hours < 0.0 {
                    return Err(RestoError::config_error("shift_hours must not be negative"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductivityBand {
    Excellent,
    Good,
    Satisfactory,
    Low,
}

impl ProductivityBand {
    pub fn from_coefficient(coefficient: f64) -> Self {
        if coefficient >= 3.0 {
            ProductivityBand::Excellent
        } else if coefficient >= 2.0 {
            ProductivityBand::Good
        } else if coefficient >= 1.0 {
            ProductivityBand::Satisfactory
        } else {
            ProductivityBand::Low
        }
    }

    pub fn verdict(&self) -> &'static str {
        match self {
            ProductivityBand::Excellent => "excellent: kitchen revenue covers the cooks many times over",
            ProductivityBand::Good => "good: cooks comfortably pay for themselves",
            ProductivityBand::Satisfactory => "satisfactory: staffing cost is covered, with little margin",
            ProductivityBand::Low => "low: attributable kitchen revenue does not cover staffing cost",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryProductivity {
    pub group: String,
    pub daily_revenue: f64,
    pub per_cook: f64,
    pub coefficient: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductivityReport {
    pub days: u32,
    pub headcount: u32,
    pub shift_wage: f64,
    pub wage_source: String,
    pub total_kitchen_revenue: f64,
    pub daily_revenue: f64,
    pub per_cook: f64,
    pub daily_payroll: f64,
    pub coefficient: f64,
    pub band: ProductivityBand,
    pub categories: Vec<CategoryProductivity>,
}

/// Either a computed report or an instruction to the operator. Missing
/// configuration is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProductivityOutcome {
    Report(ProductivityReport),
    ConfigurationMissing { message: String },
}

pub struct ProductivityCalculator;

impl ProductivityCalculator {
    /// `kitchen_revenue_by_group`: (group, revenue) pairs, bar already
    /// filtered out. `days`: distinct reporting days in the period.
    pub fn calculate(
        kitchen_revenue_by_group: &[(String, f64)],
        days: u32,
        config: &ProductivityConfig,
    ) -> ProductivityOutcome {
        let headcount = config.cooks_per_shift;
        let resolved = config.wage_policy.resolve();

        let (shift_wage, wage_source) = match resolved {
            Some(resolved) if headcount > 0 => resolved,
            _ => {
                return ProductivityOutcome::ConfigurationMissing {
                    message: "cook headcount and shift wage are not configured; \
                              set cooks per shift and at least one wage source"
                        .to_string(),
                };
            }
        };

        let days = days.max(1);
        let total: f64 = kitchen_revenue_by_group.iter().map(|(_, r)| r).sum();
        let daily_revenue = total / days as f64;
        let per_cook = daily_revenue / headcount as f64;
        let coefficient = per_cook / shift_wage;

        let categories = kitchen_revenue_by_group
            .iter()
            .map(|(group, revenue)| {
                let daily = revenue / days as f64;
                let per_cook = daily / headcount as f64;
                CategoryProductivity {
                    group: group.clone(),
                    daily_revenue: daily,
                    per_cook,
                    coefficient: per_cook / shift_wage,
                }
            })
            .collect();

        ProductivityOutcome::Report(ProductivityReport {
            days,
            headcount,
            shift_wage,
            wage_source: wage_source.to_string(),
            total_kitchen_revenue: total,
            daily_revenue,
            per_cook,
            daily_payroll: shift_wage * headcount as f64,
            coefficient,
            band: ProductivityBand::from_coefficient(coefficient),
            categories,
        })
    }
}
