//! Geodata type definitions.

use firegpt_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lon: f64) -> AppResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::InvalidInput(format!(
                "Latitude must be between -90 and 90, got {}",
                lat
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::InvalidInput(format!(
                "Longitude must be between -180 and 180, got {}",
                lon
            )));
        }
        Ok(Self { lat, lon })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Category an incident resource is bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    FireStation,
    Police,
    Hospital,
    WaterSource,
    ResidentialArea,
    Forest,
    Unknown,
}

impl ResourceCategory {
    /// Report heading for this category.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::FireStation => "Fire Stations",
            Self::Police => "Police Stations",
            Self::Hospital => "Hospitals",
            Self::WaterSource => "Water Sources",
            Self::ResidentialArea => "Residential Areas",
            Self::Forest => "Forests",
            Self::Unknown => "Other",
        }
    }
}

/// A mapped feature as returned by a resource lookup, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResource {
    pub name: String,
    /// Raw type tag, e.g. `fire_station` or `reservoir`
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
}

/// A nearby resource with its distance from the incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePoint {
    pub name: String,
    pub category: ResourceCategory,
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
}

/// A named point on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Marker {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
        }
    }
}

impl From<&ResourcePoint> for Marker {
    fn from(point: &ResourcePoint) -> Self {
        Marker::new(point.name.clone(), point.lat, point.lon)
    }
}

/// Map markers returned with an action plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Markers {
    pub fire: Marker,
    pub safe_zones: Vec<Marker>,
    pub crews: Vec<Marker>,
    pub hospitals: Vec<Marker>,
    pub water_sources: Vec<Marker>,
    /// No data source provides aircraft positions; always empty.
    pub aerial: Vec<Marker>,
}
