//! Plain-text resource report and map markers for an incident.

use crate::category::CATEGORY_RULES;
use crate::types::{Coordinate, Marker, Markers, ResourceCategory, ResourcePoint};

/// Name given to the incident marker.
pub const FIRE_MARKER_NAME: &str = "Reported fire";

/// Render ranked resources as a report grouped by category.
///
/// Categories appear in rule order; empty ones are skipped. Each category
/// lists at most `max_per_category` entries as `name (type) - D.DD km away`.
/// Unknown resources are left out.
pub fn build_report(points: &[ResourcePoint], max_per_category: usize) -> String {
    let mut sections = Vec::new();

    for (category, _) in CATEGORY_RULES {
        let entries: Vec<String> = points
            .iter()
            .filter(|p| p.category == *category)
            .take(max_per_category)
            .map(|p| format!("{} ({}) - {:.2} km away", p.name, p.kind, p.distance_km))
            .collect();

        if entries.is_empty() {
            continue;
        }

        sections.push(format!("{}:\n{}", category.heading(), entries.join("\n")));
    }

    sections.join("\n\n")
}

/// Map markers for an incident at `fire`.
///
/// Safe zones are the first `safe_zone_count` residential areas by distance.
pub fn build_markers(fire: Coordinate, points: &[ResourcePoint], safe_zone_count: usize) -> Markers {
    let of = |category: ResourceCategory| -> Vec<Marker> {
        points
            .iter()
            .filter(|p| p.category == category)
            .map(Marker::from)
            .collect()
    };

    let mut safe_zones = of(ResourceCategory::ResidentialArea);
    safe_zones.truncate(safe_zone_count);

    Markers {
        fire: Marker::new(FIRE_MARKER_NAME, fire.lat, fire.lon),
        safe_zones,
        crews: of(ResourceCategory::FireStation),
        hospitals: of(ResourceCategory::Hospital),
        water_sources: of(ResourceCategory::WaterSource),
        aerial: Vec::new(),
    }
}
