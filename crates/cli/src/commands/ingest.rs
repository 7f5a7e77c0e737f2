//! Ingest command handler.

use clap::Args;
use firegpt_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

use super::print_json;
use crate::state::AppState;

/// Add a PDF or image to the knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Document to ingest (pdf, png, jpg, jpeg, bmp, tiff)
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {:?}", self.file);

        let filename = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AppError::InvalidInput(format!("Not a file: {:?}", self.file)))?;
        let bytes = tokio::fs::read(&self.file).await?;

        let state = AppState::initialize(&config).await?;
        let result = state.ingestor.ingest(&filename, &bytes).await?;

        if self.json {
            print_json(&serde_json::json!({
                "file": filename,
                "chunksAdded": result.chunks_added,
                "chars": result.text.chars().count(),
            }))?;
        } else {
            println!(
                "Ingested {} ({} chars, {} new chunks)",
                filename,
                result.text.chars().count(),
                result.chunks_added
            );
        }

        Ok(())
    }
}
