//! Geospatial enrichment for FireGPT.
//!
//! - Place-name extraction from questions
//! - Geocoding (Nominatim)
//! - Nearby-resource lookup (Overpass), distance ranking and categorization
//! - Resource report and map markers for action plans

pub mod category;
pub mod geocode;
pub mod place;
pub mod report;
pub mod resources;
pub mod types;

// Re-export main types
pub use category::{categorize, CATEGORY_RULES};
pub use geocode::{Geocoder, NominatimGeocoder};
pub use place::{extract_place, place_rules, PlaceRule};
pub use report::{build_markers, build_report, FIRE_MARKER_NAME};
pub use resources::{haversine_km, rank_resources, OverpassLookup, ResourceLookup};
pub use types::{Coordinate, Marker, Markers, RawResource, ResourceCategory, ResourcePoint};
