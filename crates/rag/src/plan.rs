//! Incident action planning for a reported fire location.

use crate::pipeline::RagPipeline;
use firegpt_core::AppResult;
use firegpt_geo::{build_markers, build_report, rank_resources, Coordinate, Markers};
use firegpt_prompt::build_prompt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A generated action plan with its map overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub plan: String,
    pub markers: Markers,
}

impl RagPipeline {
    /// Produce an action plan for a fire at (`lat`, `lon`).
    ///
    /// Nearby resources feed the prompt in place of corpus context. A failed
    /// resource lookup degrades to a plan without resources.
    pub async fn plan_action(&self, lat: f64, lon: f64) -> AppResult<ActionPlan> {
        let fire = Coordinate::new(lat, lon)?;
        let radius_km = self.options.search_radius_km;

        let raw = match self.lookup.nearby(fire, radius_km).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Resource lookup around {} failed: {}", fire, e);
                Vec::new()
            }
        };

        let points = rank_resources(fire, raw, self.options.max_resources);
        let mut report = build_report(&points, self.options.max_per_category);
        if report.is_empty() {
            report = format!("No mapped resources were found within {} km.", radius_km);
        }
        tracing::info!("Planning for fire at {} with {} resources", fire, points.len());

        let mut variables = HashMap::new();
        variables.insert("latitude".to_string(), fire.lat.to_string());
        variables.insert("longitude".to_string(), fire.lon.to_string());
        variables.insert("radiusKm".to_string(), radius_km.to_string());
        let built = build_prompt(&self.prompts.plan, variables, Some(report))?;

        let plan = self.generate(&built).await?;
        let markers = build_markers(fire, &points, self.options.safe_zone_count);

        Ok(ActionPlan { plan, markers })
    }
}
