//! Bar-vs-kitchen classification.
//!
//! A pure function over (dish name, dish group): exact group match against
//! the operator's bar group list, then keyword search in the group, then in
//! the dish name, otherwise kitchen. There is no "unknown" outcome; the
//! productivity split needs every item on one side or the other.

/// Menu groups handled by the bar station.
const BAR_GROUPS: &[&str] = &[
    "алкогольные коктейли",
    "бар",
    "безалкогольные напитки",
    "бренди и коньяк",
    "вермут",
    "вино",
    "вино безалкогольное",
    "вино белое",
    "вино игристое",
    "вино красное",
    "вино оранжевое",
    "вино розовое",
    "вино по бокалам",
    "виски",
    "вода",
    "водка",
    "газированные напитки",
    "джин",
    "кофе",
    "крафтовый чай",
    "крепкий алкоголь",
    "ликеры и настойки",
    "лимонады",
    "милкшейки и сладкие напитки",
    "пиво",
    "пиво бутылочное",
    "разливное пиво",
    "ром",
    "сок",
    "текила",
    "чай",
    "соки&морс&gazirovka",
    "water",
];

/// Substrings that mark a group or dish name as bar-made when the group is
/// not in the exact list.
const BAR_KEYWORDS: &[&str] = &[
    "бар",
    "коктейл",
    "напит",
    "пиво",
    "вино",
    "кофе",
    "лимонад",
    "морс",
    "виски",
    "водка",
    "джин",
    "текила",
    "вермут",
    "ликер",
    "ликёр",
    "коньяк",
    "бренди",
    "шампан",
    "глинтвейн",
    "смузи",
    "милкшейк",
    "фреш",
    "cocktail",
    "drink",
    "beer",
    "wine",
    "smoothie",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationClass {
    Bar,
    Kitchen,
}

pub struct CategoryClassifier;

impl CategoryClassifier {
    /// Total and deterministic; the same `(name, group)` always classifies
    /// the same way.
    pub fn classify(dish_name: &str, dish_group: &str) -> StationClass {
        let group = dish_group.trim().to_lowercase();
        if BAR_GROUPS.contains(&group.as_str()) {
            return StationClass::Bar;
        }
        if BAR_KEYWORDS.iter().any(|kw| group.contains(kw)) {
            return StationClass::Bar;
        }
        let name = dish_name.trim().to_lowercase();
        if BAR_KEYWORDS.iter().any(|kw| name.contains(kw)) {
            return StationClass::Bar;
        }
        StationClass::Kitchen
    }

    pub fn is_bar(dish_name: &str, dish_group: &str) -> bool {
        Self::classify(dish_name, dish_group) == StationClass::Bar
    }

    pub fn is_kitchen(dish_name: &str, dish_group: &str) -> bool {
        Self::classify(dish_name, dish_group) == StationClass::Kitchen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_group_match_is_case_insensitive() {
        assert_eq!(CategoryClassifier::classify("Мохито", "БАР"), StationClass::Bar);
        assert_eq!(
            CategoryClassifier::classify("Эспрессо", "Кофе"),
            StationClass::Bar
        );
        assert_eq!(
            CategoryClassifier::classify("Борщ", "Супы"),
            StationClass::Kitchen
        );
    }

    #[test]
    fn test_keyword_match_on_group_then_name() {
        // Group not in the exact list, caught by keyword.
        assert_eq!(
            CategoryClassifier::classify("Пина колада", "Авторские коктейли"),
            StationClass::Bar
        );
        // Group says nothing, name does.
        assert_eq!(
            CategoryClassifier::classify("Кофе по-венски", "Прочее"),
            StationClass::Bar
        );
    }

    #[test]
    fn test_kitchen_is_the_default() {
        assert_eq!(
            CategoryClassifier::classify("Паста карбонара", "Горячие блюда"),
            StationClass::Kitchen
        );
        assert_eq!(CategoryClassifier::classify("", ""), StationClass::Kitchen);
    }

    #[test]
    fn test_idempotent() {
        let first = CategoryClassifier::classify("Борщ", "Супы");
        let second = CategoryClassifier::classify("Борщ", "Супы");
        assert_eq!(first, second);
    }
}
