// src/utils/time.rs

use chrono::{Datelike, Days, Local, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

fn explicit_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex"))
}

/// Reporting period as requested by the command layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Yesterday,
    Week,
    Month,
    /// One explicit `YYYY-MM-DD` day.
    Date(NaiveDate),
}

impl Period {
    /// Parses the command-layer period words plus explicit dates.
    pub fn parse(s: &str) -> Option<Period> {
        match s.trim().to_lowercase().as_str() {
            "today" => Some(Period::Today),
            "yesterday" => Some(Period::Yesterday),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            other => {
                if explicit_date_re().is_match(other) {
                    NaiveDate::parse_from_str(other, "%Y-%m-%d")
                        .ok()
                        .map(Period::Date)
                } else {
                    None
                }
            }
        }
    }

    /// Resolves the period against a given "today".
    pub fn resolve_at(&self, today: NaiveDate) -> PeriodRange {
        match self {
            Period::Today => PeriodRange::new(today, today, "today"),
            Period::Yesterday => {
                let d = today - Days::new(1);
                PeriodRange::new(d, d, "yesterday")
            }
            Period::Week => PeriodRange::new(today - Days::new(7), today, "last 7 days"),
            Period::Month => {
                let first = today.with_day(1).unwrap_or(today);
                PeriodRange::new(first, today, "this month")
            }
            Period::Date(d) => PeriodRange::new(*d, *d, &d.format("%Y-%m-%d").to_string()),
        }
    }

    pub fn resolve(&self) -> PeriodRange {
        self.resolve_at(Local::now().date_naive())
    }
}

/// Resolved inclusive date range with a human label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRange {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub label: String,
}

impl PeriodRange {
    pub fn new(date_from: NaiveDate, date_to: NaiveDate, label: &str) -> Self {
        // A reversed range is a caller slip; normalize instead of failing.
        let (date_from, date_to) = if date_from <= date_to {
            (date_from, date_to)
        } else {
            (date_to, date_from)
        };
        Self {
            date_from,
            date_to,
            label: label.to_string(),
        }
    }

    pub fn date_from_str(&self) -> String {
        self.date_from.format("%Y-%m-%d").to_string()
    }

    pub fn date_to_str(&self) -> String {
        self.date_to.format("%Y-%m-%d").to_string()
    }

    /// Every calendar day of the range, in order.
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut d = self.date_from;
        while d <= self.date_to {
            out.push(d);
            match d.succ_opt() {
                Some(next) => d = next,
                None => break,
            }
        }
        out
    }

    pub fn day_count(&self) -> u32 {
        (self.date_to - self.date_from).num_days() as u32 + 1
    }

    /// The same range shifted back one calendar year, for year-over-year
    /// comparison. Feb 29 falls back to Feb 28.
    pub fn prior_year(&self) -> PeriodRange {
        PeriodRange::new(
            shift_year_back(self.date_from),
            shift_year_back(self.date_to),
            &format!("{} (prior year)", self.label),
        )
    }
}

fn shift_year_back(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year() - 1, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(date.year() - 1, date.month(), date.day() - 1))
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_periods() {
        assert_eq!(Period::parse("today"), Some(Period::Today));
        assert_eq!(Period::parse("WEEK"), Some(Period::Week));
        assert_eq!(
            Period::parse("2026-08-01"),
            Some(Period::Date(day(2026, 8, 1)))
        );
        assert_eq!(Period::parse("fortnight"), None);
        assert_eq!(Period::parse("2026-8-1"), None);
    }

    #[test]
    fn test_resolve_ranges() {
        let today = day(2026, 8, 7);

        let r = Period::Yesterday.resolve_at(today);
        assert_eq!(r.date_from, day(2026, 8, 6));
        assert_eq!(r.date_to, day(2026, 8, 6));
        assert_eq!(r.day_count(), 1);

        let r = Period::Week.resolve_at(today);
        assert_eq!(r.date_from, day(2026, 7, 31));
        assert_eq!(r.day_count(), 8);

        let r = Period::Month.resolve_at(today);
        assert_eq!(r.date_from, day(2026, 8, 1));
        assert_eq!(r.date_to, today);
    }

    #[test]
    fn test_days_iteration() {
        let r = PeriodRange::new(day(2026, 7, 30), day(2026, 8, 2), "x");
        let days = r.days();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], day(2026, 7, 30));
        assert_eq!(days[3], day(2026, 8, 2));
    }

    #[test]
    fn test_prior_year_handles_leap_day() {
        let r = PeriodRange::new(day(2024, 2, 29), day(2024, 2, 29), "leap");
        let prior = r.prior_year();
        assert_eq!(prior.date_from, day(2023, 2, 28));
    }

    #[test]
    fn test_reversed_range_is_normalized() {
        let r = PeriodRange::new(day(2026, 8, 7), day(2026, 8, 1), "swapped");
        assert_eq!(r.date_from, day(2026, 8, 1));
        assert_eq!(r.date_to, day(2026, 8, 7));
    }
}
