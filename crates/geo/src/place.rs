//! Place-name extraction from free-text questions.
//!
//! A small ordered table of patterns over runs of capitalized words. It is a
//! heuristic: lowercase place names are missed and capitalized non-places can
//! match.

use regex::Regex;
use std::sync::LazyLock;

/// One or more capitalized words.
const CAPITALIZED_RUN: &str = r"[A-Z][a-zA-Z'\-]*(?:[ \t]+[A-Z][a-zA-Z'\-]*)*";

/// A named extraction pattern whose first capture group is the place.
#[derive(Debug)]
pub struct PlaceRule {
    pub name: &'static str,
    pub pattern: Regex,
}

static PLACE_RULES: LazyLock<Vec<PlaceRule>> = LazyLock::new(|| {
    let rule = |name: &'static str, pattern: String| PlaceRule {
        name,
        pattern: Regex::new(&pattern).expect("place rule regex is valid"),
    };

    vec![
        rule(
            "preposition",
            format!(r"\b(?i:in|at|near|around)[ \t]+({})", CAPITALIZED_RUN),
        ),
        rule(
            "named-fire",
            format!(r"\b({})[ \t]+(?i:fire|wildfire)\b", CAPITALIZED_RUN),
        ),
        rule(
            "fire-of",
            format!(
                r"\b(?i:fire|wildfire)[ \t]+(?i:of|outside|by|from)[ \t]+({})",
                CAPITALIZED_RUN
            ),
        ),
    ]
});

/// The extraction rules in the order they are tried.
pub fn place_rules() -> &'static [PlaceRule] {
    &PLACE_RULES
}

/// First place name found in `text`, trying each rule in order.
pub fn extract_place(text: &str) -> Option<String> {
    place_rules().iter().find_map(|rule| {
        let caps = rule.pattern.captures(text)?;
        let place = caps.get(1)?.as_str().trim();
        if place.is_empty() {
            return None;
        }
        tracing::debug!("Place rule '{}' matched '{}'", rule.name, place);
        Some(place.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preposition_rule() {
        assert_eq!(extract_place("Wildfire near Los Angeles"), Some("Los Angeles".to_string()));
        assert_eq!(
            extract_place("What should residents in Paradise do?"),
            Some("Paradise".to_string())
        );
        assert_eq!(extract_place("Smoke AT Big Bear"), Some("Big Bear".to_string()));
    }

    #[test]
    fn test_named_fire_rule() {
        assert_eq!(
            extract_place("How is the Camp Creek fire spreading?"),
            Some("Camp Creek".to_string())
        );
    }

    #[test]
    fn test_fire_of_rule() {
        assert_eq!(
            extract_place("the wildfire outside Santa Rosa"),
            Some("Santa Rosa".to_string())
        );
    }

    #[test]
    fn test_rule_order() {
        // Both the preposition and named-fire rules could match; preposition wins.
        assert_eq!(
            extract_place("Dixie fire crews near Greenville"),
            Some("Greenville".to_string())
        );
    }

    #[test]
    fn test_no_place() {
        assert_eq!(extract_place("It's windy today"), None);
        assert_eq!(extract_place("near los angeles"), None);
        assert_eq!(extract_place(""), None);
    }

    #[test]
    fn test_rule_table() {
        let names: Vec<&str> = place_rules().iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["preposition", "named-fire", "fire-of"]);
    }
}
