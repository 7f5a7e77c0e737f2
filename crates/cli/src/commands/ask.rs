//! Ask command handler.
//!
//! Answers a single question through the same pipeline the server uses.

use clap::Args;
use firegpt_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

use super::print_json;
use crate::state::AppState;

/// Ask a wildfire question against the local corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.question()?;
        let state = AppState::initialize(&config).await?;

        let answer = state.pipeline.ask(&question).await?;

        if self.json {
            print_json(&answer)?;
        } else {
            println!("{}", answer.text);
            if let Some(location) = answer.location {
                println!();
                println!(
                    "Location: {} ({:.4}, {:.4})",
                    location.name, location.lat, location.lon
                );
            }
        }

        Ok(())
    }

    fn question(&self) -> AppResult<String> {
        if let Some(question) = &self.question {
            return Ok(question.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path).map_err(|e| {
                AppError::InvalidInput(format!("Failed to read question file {:?}: {}", path, e))
            });
        }
        Err(AppError::InvalidInput("No query provided.".to_string()))
    }
}
