//! Plan command handler.

use clap::Args;
use firegpt_core::{config::AppConfig, AppResult};

use super::print_json;
use crate::state::AppState;

/// Generate an action plan for a fire location
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Latitude of the fire
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the fire
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Output as JSON (plan and map markers)
    #[arg(long)]
    pub json: bool,
}

impl PlanCommand {
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        tracing::info!("Executing plan command for {}, {}", self.lat, self.lon);

        let state = AppState::initialize(&config).await?;
        let plan = state.pipeline.plan_action(self.lat, self.lon).await?;

        if self.json {
            print_json(&plan)?;
        } else {
            println!("{}", plan.plan);
            tracing::debug!(
                "Markers - crews: {}, hospitals: {}, water: {}, safe zones: {}",
                plan.markers.crews.len(),
                plan.markers.hospitals.len(),
                plan.markers.water_sources.len(),
                plan.markers.safe_zones.len()
            );
        }

        Ok(())
    }
}
