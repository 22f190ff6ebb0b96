//! Logical-field alias resolution.
//!
//! OLAP rows arrive keyed either by the English API field names or by
//! localized display labels, depending on the server version and report
//! encoding. Every logical quantity has one ordered alias list here, so the
//! supported-aliases contract is data and can be tested on its own.

use crate::types::Row;
use crate::utils::helpers::safe_parse_float;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    /// Revenue after discounts
    Revenue,
    /// Revenue before discounts
    GrossRevenue,
    /// Dishes sold
    Qty,
    /// Distinct orders
    Orders,
    /// Accounting day
    Date,
    /// Waiter who owns the order
    Waiter,
    /// Cook, when the server tracks preparation
    Cook,
    /// Hour the order was opened
    Hour,
    DishName,
    DishGroup,
}

pub struct FieldAliases {
    pub field: LogicalField,
    pub keys: &'static [&'static str],
}

/// Canonical English key first, then known localized labels.
pub const FIELD_ALIASES: &[FieldAliases] = &[
    FieldAliases {
        field: LogicalField::Revenue,
        keys: &["DishDiscountSumInt", "Сумма со скидкой"],
    },
    FieldAliases {
        field: LogicalField::GrossRevenue,
        keys: &["DishSumInt", "Сумма без скидки"],
    },
    FieldAliases {
        field: LogicalField::Qty,
        keys: &["DishAmountInt", "Количество блюд"],
    },
    FieldAliases {
        field: LogicalField::Orders,
        keys: &["UniqOrderId.OrdersCount", "Заказов"],
    },
    FieldAliases {
        field: LogicalField::Date,
        keys: &["OpenDate.Typed", "Учетный день"],
    },
    FieldAliases {
        field: LogicalField::Waiter,
        keys: &["OrderWaiter.Name", "Официант заказа"],
    },
    FieldAliases {
        field: LogicalField::Cook,
        keys: &["Cooking.Name", "Повар"],
    },
    FieldAliases {
        field: LogicalField::Hour,
        keys: &["HourOpen", "Час открытия"],
    },
    FieldAliases {
        field: LogicalField::DishName,
        keys: &["DishName", "Блюдо"],
    },
    FieldAliases {
        field: LogicalField::DishGroup,
        keys: &["DishGroup", "Группа блюда"],
    },
];

pub struct FieldResolver;

impl FieldResolver {
    /// The ordered candidate keys for a logical field.
    pub fn aliases(field: LogicalField) -> &'static [&'static str] {
        FIELD_ALIASES
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.keys)
            .unwrap_or(&[])
    }

    /// First alias carrying a non-empty string; `""` when none does.
    pub fn resolve_string(row: &Row, field: LogicalField) -> String {
        for key in Self::aliases(field) {
            match row.get(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_string(),
                Some(Value::Number(n)) => return n.to_string(),
                _ => {}
            }
        }
        String::new()
    }

    /// First alias parsing to a non-zero number; `0.0` when none does.
    /// Localized numeric strings ("1 234,50") are accepted.
    pub fn resolve_number(row: &Row, field: LogicalField) -> f64 {
        for key in Self::aliases(field) {
            if let Some(value) = row.get(*key) {
                let parsed = safe_parse_float(value, 0.0);
                if parsed != 0.0 {
                    return parsed;
                }
            }
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_canonical_key_wins() {
        let r = row(&[
            ("DishDiscountSumInt", json!(1500)),
            ("Сумма со скидкой", json!(9999)),
        ]);
        assert_eq!(FieldResolver::resolve_number(&r, LogicalField::Revenue), 1500.0);
    }

    #[test]
    fn test_localized_fallback() {
        let r = row(&[("Сумма со скидкой", json!("1 234,50"))]);
        assert_eq!(
            FieldResolver::resolve_number(&r, LogicalField::Revenue),
            1234.5
        );

        let r = row(&[("Официант заказа", json!("Анна"))]);
        assert_eq!(
            FieldResolver::resolve_string(&r, LogicalField::Waiter),
            "Анна"
        );
    }

    #[test]
    fn test_type_appropriate_zero() {
        let r = row(&[("unrelated", json!("x"))]);
        assert_eq!(FieldResolver::resolve_number(&r, LogicalField::Qty), 0.0);
        assert_eq!(FieldResolver::resolve_string(&r, LogicalField::DishName), "");
    }

    #[test]
    fn test_empty_string_falls_through() {
        let r = row(&[("DishName", json!("  ")), ("Блюдо", json!("Борщ"))]);
        assert_eq!(
            FieldResolver::resolve_string(&r, LogicalField::DishName),
            "Борщ"
        );
    }

    #[test]
    fn test_every_field_has_aliases() {
        for entry in FIELD_ALIASES {
            assert!(
                !entry.keys.is_empty(),
                "alias table entry without keys: {:?}",
                entry.field
            );
        }
        assert_eq!(
            FieldResolver::aliases(LogicalField::Hour),
            &["HourOpen", "Час открытия"]
        );
    }
}
