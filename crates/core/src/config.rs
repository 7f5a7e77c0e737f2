//! Configuration management for FireGPT.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - Config file (`.firegpt/config.yaml` or `FIREGPT_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: relative paths resolve against
//! the workspace root and runtime state lives in `.firegpt/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .firegpt/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub server: ServerSettings,

    pub models: ModelSettings,

    pub knowledge: KnowledgeSettings,

    pub geo: GeoSettings,

    pub ingest: IngestSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Accepted `models.promptFormat` values, matched case-insensitively.
pub const PROMPT_FORMATS: &[&str] = &["llama-2", "llama2", "plain"];

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelSettings {
    /// Directory scanned for `*.gguf` artifacts
    pub dir: PathBuf,

    /// Start with the stub backend instead of loading a model
    pub dummy: bool,

    /// Context window passed to the runtime
    pub context_size: u32,

    /// Inference threads; `None` means all available cores
    pub threads: Option<u32>,

    pub temperature: f32,

    /// Output token cap per generation
    pub max_tokens: u32,

    /// Chat template used to render prompts ("llama-2" or "plain")
    pub prompt_format: String,

    /// `llama-server` executable
    pub server_binary: PathBuf,

    pub startup_timeout_secs: u64,

    pub generation_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            dummy: false,
            context_size: 4096,
            threads: None,
            temperature: 0.7,
            max_tokens: 256,
            prompt_format: "llama-2".to_string(),
            server_binary: PathBuf::from("llama-server"),
            startup_timeout_secs: 60,
            generation_timeout_secs: 300,
        }
    }
}

/// Chunk store and retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KnowledgeSettings {
    /// Source corpus used to build the index when none exists
    pub corpus_path: PathBuf,

    /// SQLite index location
    pub index_path: PathBuf,

    /// Characters per chunk
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,

    /// Chunks retrieved per question
    pub top_k: usize,

    /// Character budget of the assembled context
    pub context_chars: usize,

    pub retrieval_timeout_secs: u64,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("wildfire_docs/data.txt"),
            index_path: PathBuf::from(".firegpt/index/chunks.sqlite"),
            chunk_size: 2000,
            chunk_overlap: 200,
            top_k: 3,
            context_chars: 6000,
            retrieval_timeout_secs: 10,
        }
    }
}

/// Geocoding and nearby-resource lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeoSettings {
    pub nominatim_url: String,
    pub overpass_url: String,
    pub user_agent: String,
    pub geocode_timeout_secs: u64,
    pub overpass_timeout_secs: u64,
    pub search_radius_km: f64,

    /// Closest points kept after sorting by distance
    pub max_resources: usize,

    /// Report lines rendered per category
    pub max_per_category: usize,

    /// Residential areas offered as safe zones
    pub safe_zone_count: usize,
}

impl Default for GeoSettings {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            user_agent: concat!("firegpt/", env!("CARGO_PKG_VERSION")).to_string(),
            geocode_timeout_secs: 10,
            overpass_timeout_secs: 25,
            search_radius_km: 10.0,
            max_resources: 30,
            max_per_category: 10,
            safe_zone_count: 3,
        }
    }
}

/// Document upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestSettings {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub pdftotext_binary: PathBuf,
    pub tesseract_binary: PathBuf,
    pub extract_timeout_secs: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(".firegpt/uploads"),
            max_upload_bytes: 16 * 1024 * 1024,
            pdftotext_binary: PathBuf::from("pdftotext"),
            tesseract_binary: PathBuf::from("tesseract"),
            extract_timeout_secs: 120,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    server: Option<ServerSettings>,
    models: Option<ModelSettings>,
    knowledge: Option<KnowledgeSettings>,
    geo: Option<GeoSettings>,
    ingest: Option<IngestSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            server: ServerSettings::default(),
            models: ModelSettings::default(),
            knowledge: KnowledgeSettings::default(),
            geo: GeoSettings::default(),
            ingest: IngestSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `FIREGPT_WORKSPACE`: Override workspace path
    /// - `FIREGPT_CONFIG`: Path to config file
    /// - `FIREGPT_MODELS_DIR`: Directory scanned for model artifacts
    /// - `FIREGPT_DUMMY`: Start with the stub backend (`1`/`true`)
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use firegpt_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration, letting explicit workspace and config file
    /// arguments take precedence over the environment.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("FIREGPT_WORKSPACE")) {
            config.workspace = workspace;
        }

        config.config_file = config_file.or_else(|| env_path("FIREGPT_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.firegpt_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Some(dir) = env_path("FIREGPT_MODELS_DIR") {
            config.models.dir = dir;
        }

        if let Ok(dummy) = std::env::var("FIREGPT_DUMMY") {
            config.models.dummy = parse_flag(&dummy);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(server) = config_file.server {
            result.server = server;
        }
        if let Some(models) = config_file.models {
            result.models = models;
        }
        if let Some(knowledge) = config_file.knowledge {
            result.knowledge = knowledge;
        }
        if let Some(geo) = config_file.geo {
            result.geo = geo;
        }
        if let Some(ingest) = config_file.ingest {
            result.ingest = ingest;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        dummy: bool,
        models_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if dummy {
            self.models.dummy = true;
        }

        if let Some(dir) = models_dir {
            self.models.dir = dir;
        }

        self
    }

    /// Get the path to the .firegpt directory.
    pub fn firegpt_dir(&self) -> PathBuf {
        self.workspace.join(".firegpt")
    }

    /// Ensure the .firegpt directory exists.
    pub fn ensure_firegpt_dir(&self) -> AppResult<()> {
        let dir = self.firegpt_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .firegpt directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve a possibly relative path against the workspace.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Validate numeric settings.
    pub fn validate(&self) -> AppResult<()> {
        let knowledge = &self.knowledge;
        if knowledge.chunk_size == 0 {
            return Err(AppError::Config("knowledge.chunkSize must be positive".to_string()));
        }
        if knowledge.chunk_overlap >= knowledge.chunk_size {
            return Err(AppError::Config(format!(
                "knowledge.chunkOverlap ({}) must be smaller than chunkSize ({})",
                knowledge.chunk_overlap, knowledge.chunk_size
            )));
        }
        if knowledge.top_k == 0 {
            return Err(AppError::Config("knowledge.topK must be at least 1".to_string()));
        }

        let models = &self.models;
        if !(0.0..=2.0).contains(&models.temperature) {
            return Err(AppError::Config(format!(
                "models.temperature must be within 0.0-2.0, got {}",
                models.temperature
            )));
        }
        if models.context_size == 0 || models.max_tokens == 0 {
            return Err(AppError::Config(
                "models.contextSize and models.maxTokens must be positive".to_string(),
            ));
        }
        let format = models.prompt_format.trim().to_ascii_lowercase();
        if !PROMPT_FORMATS.contains(&format.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown prompt format: {}. Supported: {}",
                models.prompt_format,
                PROMPT_FORMATS.join(", ")
            )));
        }

        let radius = self.geo.search_radius_km;
        if radius.is_nan() || radius <= 0.0 {
            return Err(AppError::Config("geo.searchRadiusKm must be positive".to_string()));
        }

        Ok(())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
