//! Resource categorization by raw type tag.

use crate::types::ResourceCategory;

/// Ordered category rules; the first rule with a matching keyword wins.
pub const CATEGORY_RULES: &[(ResourceCategory, &[&str])] = &[
    (ResourceCategory::FireStation, &["fire_station"]),
    (ResourceCategory::Police, &["police"]),
    (ResourceCategory::Hospital, &["hospital", "clinic"]),
    (
        ResourceCategory::WaterSource,
        &["water", "reservoir", "fire_hydrant", "river", "lake"],
    ),
    (ResourceCategory::ResidentialArea, &["residential"]),
    (ResourceCategory::Forest, &["forest", "wood"]),
];

/// Bucket a raw type tag by case-insensitive substring match.
pub fn categorize(kind: &str) -> ResourceCategory {
    let kind = kind.to_ascii_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| kind.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(ResourceCategory::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags() {
        assert_eq!(categorize("fire_station"), ResourceCategory::FireStation);
        assert_eq!(categorize("POLICE"), ResourceCategory::Police);
        assert_eq!(categorize("clinic"), ResourceCategory::Hospital);
        assert_eq!(categorize("reservoir"), ResourceCategory::WaterSource);
        assert_eq!(categorize("fire_hydrant"), ResourceCategory::WaterSource);
        assert_eq!(categorize("residential"), ResourceCategory::ResidentialArea);
        assert_eq!(categorize("wood"), ResourceCategory::Forest);
    }

    #[test]
    fn test_first_match_wins() {
        // Contains both "water" and "wood"; the water rule comes first.
        assert_eq!(categorize("waterwood"), ResourceCategory::WaterSource);
    }

    #[test]
    fn test_unmatched_is_unknown() {
        assert_eq!(categorize("parking"), ResourceCategory::Unknown);
        assert_eq!(categorize(""), ResourceCategory::Unknown);
    }

    #[test]
    fn test_rule_order() {
        let order: Vec<ResourceCategory> = CATEGORY_RULES.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            order,
            vec![
                ResourceCategory::FireStation,
                ResourceCategory::Police,
                ResourceCategory::Hospital,
                ResourceCategory::WaterSource,
                ResourceCategory::ResidentialArea,
                ResourceCategory::Forest,
            ]
        );
    }
}
