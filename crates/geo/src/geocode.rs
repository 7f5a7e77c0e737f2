//! Place-name geocoding via Nominatim.
//!
//! API: https://nominatim.org/release-docs/latest/api/Search/

use crate::types::Coordinate;
use firegpt_core::config::GeoSettings;
use firegpt_core::{AppError, AppResult};
use serde::Deserialize;
use std::time::Duration;

/// Resolves a place name to a coordinate.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the service has no usable result for `place`.
    async fn geocode(&self, place: &str) -> AppResult<Option<Coordinate>>;
}

/// Nominatim search result. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde(default)]
    lat: Option<String>,
    #[serde(default)]
    lon: Option<String>,
}

/// Nominatim HTTP client.
pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::Geo(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &GeoSettings) -> AppResult<Self> {
        Self::new(
            &settings.nominatim_url,
            &settings.user_agent,
            Duration::from_secs(settings.geocode_timeout_secs),
        )
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> AppResult<Option<Coordinate>> {
        let url = format!("{}/search", self.base_url);
        tracing::debug!("Geocoding '{}'", place);

        let response = self
            .client
            .get(&url)
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| AppError::Geo(format!("Nominatim request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Geo(format!(
                "Nominatim API error ({})",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| AppError::Geo(format!("Failed to parse Nominatim response: {}", e)))?;

        Ok(first_coordinate(&places))
    }
}

fn first_coordinate(places: &[NominatimPlace]) -> Option<Coordinate> {
    let place = places.first()?;
    let lat = place.lat.as_deref()?.trim().parse::<f64>().ok()?;
    let lon = place.lon.as_deref()?.trim().parse::<f64>().ok()?;
    Coordinate::new(lat, lon).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<Coordinate> {
        let places: Vec<NominatimPlace> = serde_json::from_str(json).unwrap();
        first_coordinate(&places)
    }

    #[test]
    fn test_parses_string_coordinates() {
        let coord = parse(r#"[{"lat": "34.0536909", "lon": "-118.242766", "display_name": "Los Angeles"}]"#);
        assert_eq!(
            coord,
            Some(Coordinate {
                lat: 34.0536909,
                lon: -118.242766
            })
        );
    }

    #[test]
    fn test_missing_or_bad_coordinates() {
        assert_eq!(parse("[]"), None);
        assert_eq!(parse(r#"[{"lat": "34.05"}]"#), None);
        assert_eq!(parse(r#"[{"lat": "north", "lon": "-118.2"}]"#), None);
        assert_eq!(parse(r#"[{"lat": "134.0", "lon": "-118.2"}]"#), None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_geo_error() {
        let geocoder =
            NominatimGeocoder::new("http://127.0.0.1:1", "firegpt-test", Duration::from_secs(2)).unwrap();
        let result = geocoder.geocode("Los Angeles").await;
        assert!(matches!(result, Err(AppError::Geo(_))));
    }
}
