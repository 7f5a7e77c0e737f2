//! Models command handler.

use clap::Args;
use firegpt_core::{config::AppConfig, AppResult};
use firegpt_llm::discover_models;

use super::print_json;

/// List available model files
#[derive(Args, Debug)]
pub struct ModelsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ModelsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let dir = config.resolve_path(&config.models.dir);
        tracing::info!("Listing models in {:?}", dir);

        let names: Vec<String> = discover_models(&dir)?
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();

        if self.json {
            print_json(&serde_json::json!({ "dir": dir, "models": names }))?;
        } else if names.is_empty() {
            println!("No model files found in {}", dir.display());
        } else {
            for name in names {
                println!("{}", name);
            }
        }

        Ok(())
    }
}
