//! Shared application state.
//!
//! Built once at startup and shared by every HTTP request or CLI command.

use firegpt_core::{config::AppConfig, AppError, AppResult};
use firegpt_geo::{NominatimGeocoder, OverpassLookup};
use firegpt_knowledge::{ChunkOptions, ChunkStore, CommandExtractor, Ingestor, SqliteChunkStore};
use firegpt_llm::{InferenceParams, LlamaServerLoader, ModelRegistry};
use firegpt_prompt::ChatFormat;
use firegpt_rag::{PipelineOptions, Prompts, RagPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub pipeline: RagPipeline,
    pub ingestor: Ingestor,

    /// Directory listed by `/models`; relative `/set_model` paths resolve here
    pub models_dir: PathBuf,
}

impl AppState {
    /// Wire the production components from configuration.
    ///
    /// Fails only when the chunk index can be neither opened nor built; a
    /// missing or broken model leaves the stub backend active.
    pub async fn initialize(config: &AppConfig) -> AppResult<Self> {
        let format: ChatFormat = config.models.prompt_format.parse()?;

        let index_path = config.resolve_path(&config.knowledge.index_path);
        let corpus_path = config.resolve_path(&config.knowledge.corpus_path);
        let options = ChunkOptions {
            chunk_size: config.knowledge.chunk_size,
            chunk_overlap: config.knowledge.chunk_overlap,
        };
        let store = tokio::task::spawn_blocking(move || {
            SqliteChunkStore::open_or_build(&index_path, &corpus_path, options)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Index task failed: {}", e)))??;
        let store: Arc<dyn ChunkStore> = Arc::new(store);

        let stats = store.stats()?;
        tracing::info!(
            "Knowledge index ready: {} sources, {} chunks",
            stats.sources_count,
            stats.chunks_count
        );

        let models = &config.models;
        let models_dir = config.resolve_path(&models.dir);
        let loader = Arc::new(LlamaServerLoader::new(
            &models.server_binary,
            Duration::from_secs(models.startup_timeout_secs),
            Duration::from_secs(models.generation_timeout_secs),
        ));
        let params = InferenceParams::from_settings(models).with_stop(format.stop_sequences());
        let registry = Arc::new(ModelRegistry::bootstrap(loader, params, &models_dir, models.dummy).await);

        let pipeline = RagPipeline::new(
            registry,
            Arc::clone(&store),
            Arc::new(NominatimGeocoder::from_settings(&config.geo)?),
            Arc::new(OverpassLookup::from_settings(&config.geo)?),
            Prompts::load(&config.workspace)?,
            format,
            PipelineOptions::from_settings(&config.knowledge, &config.geo),
        );

        let ingestor = Ingestor::new(
            store,
            Arc::new(CommandExtractor::from_settings(&config.ingest)),
            config.resolve_path(&config.ingest.upload_dir),
            config.ingest.max_upload_bytes,
        );

        Ok(Self {
            pipeline,
            ingestor,
            models_dir,
        })
    }

    /// Resolve a model path from a client against the models directory.
    pub fn model_path(&self, requested: &str) -> PathBuf {
        let path = Path::new(requested);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.models_dir.join(path)
        }
    }
}
