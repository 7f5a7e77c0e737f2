//! Nearby-resource lookup via the Overpass API, plus distance ranking.

use crate::category::categorize;
use crate::types::{Coordinate, RawResource, ResourcePoint};
use firegpt_core::config::GeoSettings;
use firegpt_core::{AppError, AppResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Tag keys consulted, in order, for an element's raw type.
const TYPE_KEYS: &[&str] = &["amenity", "emergency", "landuse", "natural", "waterway"];

/// Features that can help or threaten an incident response.
const FEATURE_FILTERS: &[&str] = &[
    r#"["amenity"="fire_station"]"#,
    r#"["amenity"="police"]"#,
    r#"["amenity"~"^(hospital|clinic)$"]"#,
    r#"["emergency"="fire_hydrant"]"#,
    r#"["natural"="water"]"#,
    r#"["landuse"="reservoir"]"#,
    r#"["waterway"="river"]"#,
    r#"["landuse"="residential"]"#,
    r#"["landuse"="forest"]"#,
    r#"["natural"="wood"]"#,
];

/// Finds mapped features around a coordinate.
#[async_trait::async_trait]
pub trait ResourceLookup: Send + Sync {
    async fn nearby(&self, center: Coordinate, radius_km: f64) -> AppResult<Vec<RawResource>>;
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

/// Overpass API client.
pub struct OverpassLookup {
    url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OverpassLookup {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::Geo(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
            timeout_secs: timeout.as_secs().max(1),
        })
    }

    pub fn from_settings(settings: &GeoSettings) -> AppResult<Self> {
        Self::new(
            &settings.overpass_url,
            &settings.user_agent,
            Duration::from_secs(settings.overpass_timeout_secs),
        )
    }
}

#[async_trait::async_trait]
impl ResourceLookup for OverpassLookup {
    async fn nearby(&self, center: Coordinate, radius_km: f64) -> AppResult<Vec<RawResource>> {
        let query = build_query(center, radius_km, self.timeout_secs);
        tracing::debug!("Querying Overpass around {} ({} km)", center, radius_km);

        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Geo(format!("Overpass request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Geo(format!(
                "Overpass API error ({})",
                response.status()
            )));
        }

        let body: OverpassResponse = response
            .json()
            .await
            .map_err(|e| AppError::Geo(format!("Failed to parse Overpass response: {}", e)))?;

        let resources = parse_elements(body);
        tracing::info!("Overpass returned {} resources", resources.len());
        Ok(resources)
    }
}

/// Overpass QL for every feature filter within `radius_km` of `center`.
pub fn build_query(center: Coordinate, radius_km: f64, timeout_secs: u64) -> String {
    let around = format!(
        "(around:{:.0},{},{})",
        radius_km * 1000.0,
        center.lat,
        center.lon
    );
    let mut query = format!("[out:json][timeout:{}];\n(\n", timeout_secs);
    for filter in FEATURE_FILTERS {
        query.push_str(&format!("  nwr{}{};\n", filter, around));
    }
    query.push_str(");\nout center;");
    query
}

fn parse_elements(body: OverpassResponse) -> Vec<RawResource> {
    body.elements
        .into_iter()
        .filter_map(|element| {
            let (lat, lon) = match (element.lat, element.lon, &element.center) {
                (Some(lat), Some(lon), _) => (lat, lon),
                (_, _, Some(center)) => (center.lat, center.lon),
                _ => return None,
            };
            let kind = TYPE_KEYS
                .iter()
                .find_map(|key| element.tags.get(*key))
                .cloned()
                .unwrap_or_default();
            let name = element
                .tags
                .get("name")
                .cloned()
                .unwrap_or_else(|| "Unnamed".to_string());

            Some(RawResource {
                name,
                kind,
                lat,
                lon,
            })
        })
        .collect()
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Attach distances and categories, sort nearest first and keep `limit`.
pub fn rank_resources(center: Coordinate, raw: Vec<RawResource>, limit: usize) -> Vec<ResourcePoint> {
    let mut points: Vec<ResourcePoint> = raw
        .into_iter()
        .map(|r| {
            let distance_km = haversine_km(center, Coordinate { lat: r.lat, lon: r.lon });
            ResourcePoint {
                category: categorize(&r.kind),
                name: r.name,
                kind: r.kind,
                lat: r.lat,
                lon: r.lon,
                distance_km,
            }
        })
        .collect();

    points.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    points.truncate(limit);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceCategory;

    fn at(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }

    fn raw(name: &str, kind: &str, lat: f64, lon: f64) -> RawResource {
        RawResource {
            name: name.to_string(),
            kind: kind.to_string(),
            lat,
            lon,
        }
    }

    #[test]
    fn test_haversine() {
        assert_eq!(haversine_km(at(10.0, 10.0), at(10.0, 10.0)), 0.0);
        // One degree of latitude is about 111.19 km
        let d = haversine_km(at(0.0, 0.0), at(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.01, "got {}", d);
        // Los Angeles to San Francisco, roughly 559 km
        let d = haversine_km(at(34.0522, -118.2437), at(37.7749, -122.4194));
        assert!((d - 559.0).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_rank_sorts_and_truncates() {
        let center = at(0.0, 0.0);
        let ranked = rank_resources(
            center,
            vec![
                raw("Far", "police", 0.05, 0.0),
                raw("Near", "fire_station", 0.01, 0.0),
                raw("Mid", "hospital", 0.03, 0.0),
            ],
            2,
        );

        let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Near", "Mid"]);
        assert_eq!(ranked[0].category, ResourceCategory::FireStation);
        assert!(ranked[0].distance_km < ranked[1].distance_km);
    }

    #[test]
    fn test_parse_elements() {
        let body: OverpassResponse = serde_json::from_value(serde_json::json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 34.1, "lon": -118.2,
                 "tags": {"amenity": "fire_station", "name": "Station 9"}},
                {"type": "way", "id": 2, "center": {"lat": 34.2, "lon": -118.3},
                 "tags": {"landuse": "reservoir"}},
                {"type": "relation", "id": 3, "tags": {"natural": "wood"}},
                {"type": "node", "id": 4, "lat": 34.3, "lon": -118.4,
                 "tags": {"emergency": "fire_hydrant", "amenity": "police"}}
            ]
        }))
        .unwrap();

        let resources = parse_elements(body);

        assert_eq!(
            resources,
            vec![
                raw("Station 9", "fire_station", 34.1, -118.2),
                raw("Unnamed", "reservoir", 34.2, -118.3),
                raw("Unnamed", "police", 34.3, -118.4),
            ]
        );
    }

    #[test]
    fn test_empty_response() {
        let body: OverpassResponse = serde_json::from_str("{}").unwrap();
        assert!(parse_elements(body).is_empty());
    }

    #[test]
    fn test_build_query() {
        let query = build_query(at(34.05, -118.25), 10.0, 25);

        assert!(query.starts_with("[out:json][timeout:25];"));
        assert!(query.contains(r#"nwr["amenity"="fire_station"](around:10000,34.05,-118.25);"#));
        assert!(query.ends_with("out center;"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_geo_error() {
        let lookup =
            OverpassLookup::new("http://127.0.0.1:1/api/interpreter", "firegpt-test", Duration::from_secs(2))
                .unwrap();
        let result = lookup.nearby(at(0.0, 0.0), 1.0).await;
        assert!(matches!(result, Err(AppError::Geo(_))));
    }
}
