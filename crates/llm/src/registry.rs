//! Model registry: the single active generation backend.
//!
//! The registry owns exactly one [`Backend`] at all times. Swapping loads a
//! new backend under the registry lock and publishes it atomically; a load
//! that fails installs a [`StubModel`] instead, so callers of
//! [`ModelRegistry::invoke`] always have something to talk to.
//!
//! Lock discipline: `swap` holds the lock across load-and-publish. `invoke`
//! holds it only long enough to clone the `Arc` of the active backend and
//! generates outside the lock, so a generation that started before a swap
//! finishes against the backend it cloned.

use crate::client::{LlmClient, LlmRequest};
use firegpt_core::config::ModelSettings;
use firegpt_core::{AppError, AppResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// File extension of loadable model artifacts.
pub const MODEL_EXTENSION: &str = "gguf";

/// Fixed inference parameters applied to every real backend.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceParams {
    pub context_size: u32,
    pub threads: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl InferenceParams {
    /// Build parameters from configuration, defaulting threads to the
    /// number of available cores.
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            context_size: settings.context_size,
            threads: settings.threads.unwrap_or_else(available_cores),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stop: Vec::new(),
        }
    }

    /// Add sequences that terminate generation.
    pub fn with_stop(mut self, stop: impl IntoIterator<Item = String>) -> Self {
        self.stop.extend(stop);
        self
    }
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self::from_settings(&ModelSettings::default())
    }
}

fn available_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

/// A backend generating with a loaded model artifact.
pub struct RealModel {
    id: String,
    path: PathBuf,
    client: Arc<dyn LlmClient>,
    params: InferenceParams,
}

impl RealModel {
    /// Wrap a client serving the artifact at `path`.
    pub fn new(path: &Path, client: Arc<dyn LlmClient>, params: InferenceParams) -> Self {
        Self {
            id: model_id_for(path),
            path: path.to_path_buf(),
            client,
            params,
        }
    }

    /// Artifact file name.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt, &self.id)
            .with_temperature(self.params.temperature)
            .with_max_tokens(self.params.max_tokens);
        for stop in &self.params.stop {
            request = request.with_stop(stop.clone());
        }

        let response = self.client.complete(&request).await?;

        tracing::debug!(
            "Token usage - Prompt: {}, Completion: {}, Total: {}",
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
            response.usage.total_tokens
        );

        Ok(response.content)
    }
}

impl fmt::Debug for RealModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealModel")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("provider", &self.client.provider_name())
            .finish()
    }
}

/// Placeholder backend used when no real model is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubModel {
    message: String,
}

impl StubModel {
    /// Create a stub whose reply explains why no model is active.
    pub fn new(reason: impl fmt::Display) -> Self {
        Self {
            message: format!(
                "[stub model] No language model is active ({}). \
                 This is a placeholder response; load a model to get real answers.",
                reason
            ),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The active generation backend.
#[derive(Debug)]
pub enum Backend {
    Real(RealModel),
    Stub(StubModel),
}

impl Backend {
    /// Identifier of the loaded model; `None` for the stub.
    pub fn model_id(&self) -> Option<&str> {
        match self {
            Backend::Real(model) => Some(model.id()),
            Backend::Stub(_) => None,
        }
    }

    /// Turn a rendered prompt into text. The stub never fails.
    pub async fn invoke(&self, prompt: &str) -> AppResult<String> {
        match self {
            Backend::Real(model) => model.generate(prompt).await,
            Backend::Stub(stub) => Ok(stub.message().to_string()),
        }
    }
}

/// Result of trying to construct a real backend.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(RealModel),
    Failed { reason: String },
}

/// Constructs real backends from model artifacts.
#[async_trait::async_trait]
pub trait BackendLoader: Send + Sync {
    async fn load(&self, path: &Path, params: &InferenceParams) -> LoadOutcome;
}

/// Single-slot registry holding the active backend.
pub struct ModelRegistry {
    active: Mutex<Arc<Backend>>,
    loader: Arc<dyn BackendLoader>,
    params: InferenceParams,
}

impl ModelRegistry {
    /// Create a registry that starts on the stub backend.
    pub fn with_stub(
        loader: Arc<dyn BackendLoader>,
        params: InferenceParams,
        reason: impl fmt::Display,
    ) -> Self {
        Self {
            active: Mutex::new(Arc::new(Backend::Stub(StubModel::new(reason)))),
            loader,
            params,
        }
    }

    /// Select the startup backend.
    ///
    /// Dummy mode starts on the stub. Otherwise the first artifact found in
    /// `models_dir` is loaded; no artifact or a failed load leaves the stub
    /// active.
    pub async fn bootstrap(
        loader: Arc<dyn BackendLoader>,
        params: InferenceParams,
        models_dir: &Path,
        dummy: bool,
    ) -> Self {
        if dummy {
            tracing::info!("Dummy mode requested, starting with the stub backend");
            return Self::with_stub(loader, params, "dummy mode requested");
        }

        let candidates = match discover_models(models_dir) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("Failed to scan {:?} for models: {}", models_dir, e);
                Vec::new()
            }
        };

        let Some(first) = candidates.first() else {
            tracing::warn!("No model artifacts found in {:?}, using the stub backend", models_dir);
            return Self::with_stub(loader, params, "no model artifacts found");
        };

        let registry = Self::with_stub(loader, params, "model not loaded yet");
        if let Err(e) = registry.swap(first).await {
            tracing::warn!("Startup model load failed, continuing on the stub: {}", e);
        }
        registry
    }

    /// Replace the active backend with one loaded from `path`.
    ///
    /// A path that does not name an existing file is rejected without
    /// touching the active backend. A load failure installs a stub carrying
    /// the failure reason and is reported to the caller only.
    pub async fn swap(&self, path: &Path) -> AppResult<String> {
        if !path.is_file() {
            return Err(AppError::InvalidInput(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let mut active = self.active.lock().await;
        tracing::info!("Loading model from {:?}", path);

        match self.loader.load(path, &self.params).await {
            LoadOutcome::Loaded(model) => {
                let id = model.id().to_string();
                *active = Arc::new(Backend::Real(model));
                tracing::info!("Active model is now {}", id);
                Ok(id)
            }
            LoadOutcome::Failed { reason } => {
                tracing::warn!("Failed to load {:?}: {}; falling back to stub", path, reason);
                *active = Arc::new(Backend::Stub(StubModel::new(&reason)));
                Err(AppError::ModelLoad(reason))
            }
        }
    }

    /// Generate with whichever backend is active right now.
    pub async fn invoke(&self, prompt: &str) -> AppResult<String> {
        let backend = self.active().await;
        tracing::debug!(
            "Invoking {} with a {}-char prompt",
            backend.model_id().unwrap_or("stub"),
            prompt.len()
        );
        backend.invoke(prompt).await
    }

    /// Identifier of the active model, if a real one is loaded.
    pub async fn current(&self) -> Option<String> {
        self.active().await.model_id().map(str::to_string)
    }

    /// Snapshot of the active backend.
    pub async fn active(&self) -> Arc<Backend> {
        Arc::clone(&*self.active.lock().await)
    }
}

/// List model artifacts directly inside `dir`, sorted by file name.
pub fn discover_models(dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut models: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_model_artifact(p))
        .collect();

    models.dedup();
    Ok(models)
}

/// Whether `path` has the model artifact extension.
pub fn is_model_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(MODEL_EXTENSION))
        .unwrap_or(false)
}

fn model_id_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LlmResponse, LlmUsage};
    use std::time::Duration;
    use tempfile::TempDir;

    struct EchoClient {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LlmClient for EchoClient {
        fn provider_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            if self.fail {
                return Err(AppError::Llm("generation timed out".to_string()));
            }
            Ok(LlmResponse {
                content: format!("{} says: {}", request.model, request.prompt),
                model: request.model.clone(),
                usage: LlmUsage::new(1, 1),
            })
        }
    }

    /// Loads every file except those whose name contains "broken".
    struct FakeLoader {
        delay: Duration,
        failing_client: bool,
    }

    impl FakeLoader {
        fn new() -> Self {
            Self {
                delay: Duration::ZERO,
                failing_client: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl BackendLoader for FakeLoader {
        async fn load(&self, path: &Path, params: &InferenceParams) -> LoadOutcome {
            tokio::time::sleep(self.delay).await;
            if path.to_string_lossy().contains("broken") {
                return LoadOutcome::Failed {
                    reason: "unsupported model format".to_string(),
                };
            }
            let client = Arc::new(EchoClient {
                fail: self.failing_client,
            });
            LoadOutcome::Loaded(RealModel::new(path, client, params.clone()))
        }
    }

    fn write_model(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"GGUF....").unwrap();
        path
    }

    #[tokio::test]
    async fn test_dummy_mode_starts_on_stub() {
        let temp = TempDir::new().unwrap();
        write_model(temp.path(), "a.gguf");

        let registry = ModelRegistry::bootstrap(
            Arc::new(FakeLoader::new()),
            InferenceParams::default(),
            temp.path(),
            true,
        )
        .await;

        assert_eq!(registry.current().await, None);
        let reply = registry.invoke("hello").await.unwrap();
        assert!(reply.contains("dummy mode"));
    }

    #[tokio::test]
    async fn test_bootstrap_loads_first_artifact() {
        let temp = TempDir::new().unwrap();
        write_model(temp.path(), "b.gguf");
        write_model(temp.path(), "a.gguf");
        std::fs::write(temp.path().join("notes.txt"), "not a model").unwrap();

        let registry = ModelRegistry::bootstrap(
            Arc::new(FakeLoader::new()),
            InferenceParams::default(),
            temp.path(),
            false,
        )
        .await;

        assert_eq!(registry.current().await, Some("a.gguf".to_string()));
    }

    #[tokio::test]
    async fn test_bootstrap_without_artifacts_uses_stub() {
        let temp = TempDir::new().unwrap();
        let registry = ModelRegistry::bootstrap(
            Arc::new(FakeLoader::new()),
            InferenceParams::default(),
            temp.path(),
            false,
        )
        .await;

        assert_eq!(registry.current().await, None);
        let reply = registry.invoke("anything").await.unwrap();
        assert!(reply.contains("no model artifacts found"));
    }

    #[tokio::test]
    async fn test_bootstrap_load_failure_falls_back_to_stub() {
        let temp = TempDir::new().unwrap();
        write_model(temp.path(), "broken.gguf");

        let registry = ModelRegistry::bootstrap(
            Arc::new(FakeLoader::new()),
            InferenceParams::default(),
            temp.path(),
            false,
        )
        .await;

        assert_eq!(registry.current().await, None);
        let reply = registry.invoke("anything").await.unwrap();
        assert!(reply.contains("unsupported model format"));
    }

    #[tokio::test]
    async fn test_swap_to_missing_path_keeps_previous_backend() {
        let temp = TempDir::new().unwrap();
        let model = write_model(temp.path(), "a.gguf");
        let registry = ModelRegistry::with_stub(
            Arc::new(FakeLoader::new()),
            InferenceParams::default(),
            "test",
        );
        registry.swap(&model).await.unwrap();

        let result = registry.swap(&temp.path().join("missing.gguf")).await;

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(registry.current().await, Some("a.gguf".to_string()));
        let reply = registry.invoke("still there?").await.unwrap();
        assert_eq!(reply, "a.gguf says: still there?");
    }

    #[tokio::test]
    async fn test_swap_failure_installs_stub_with_reason() {
        let temp = TempDir::new().unwrap();
        let good = write_model(temp.path(), "a.gguf");
        let broken = write_model(temp.path(), "broken.gguf");
        let registry = ModelRegistry::with_stub(
            Arc::new(FakeLoader::new()),
            InferenceParams::default(),
            "test",
        );
        registry.swap(&good).await.unwrap();

        let result = registry.swap(&broken).await;

        assert!(matches!(result, Err(AppError::ModelLoad(_))));
        assert_eq!(registry.current().await, None);
        let reply = registry.invoke("hello").await.unwrap();
        assert!(reply.contains("unsupported model format"));
    }

    #[tokio::test]
    async fn test_invoke_error_is_typed_and_leaves_registry_alone() {
        let temp = TempDir::new().unwrap();
        let model = write_model(temp.path(), "a.gguf");
        let loader = FakeLoader {
            delay: Duration::ZERO,
            failing_client: true,
        };
        let registry =
            ModelRegistry::with_stub(Arc::new(loader), InferenceParams::default(), "test");
        registry.swap(&model).await.unwrap();

        let result = registry.invoke("hello").await;

        assert!(matches!(result, Err(AppError::Llm(_))));
        assert_eq!(registry.current().await, Some("a.gguf".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_during_swap_sees_a_complete_backend() {
        let temp = TempDir::new().unwrap();
        let first = write_model(temp.path(), "a.gguf");
        let second = write_model(temp.path(), "b.gguf");
        let loader = FakeLoader {
            delay: Duration::from_millis(50),
            failing_client: false,
        };
        let registry = Arc::new(ModelRegistry::with_stub(
            Arc::new(loader),
            InferenceParams::default(),
            "test",
        ));
        registry.swap(&first).await.unwrap();

        let swapper = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.swap(&second).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let reply = registry.invoke("ping").await.unwrap();
        assert!(reply == "a.gguf says: ping" || reply == "b.gguf says: ping");

        assert_eq!(swapper.await.unwrap().unwrap(), "b.gguf");
        assert_eq!(registry.invoke("ping").await.unwrap(), "b.gguf says: ping");
    }

    #[test]
    fn test_discover_models_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        write_model(temp.path(), "zeta.gguf");
        write_model(temp.path(), "alpha.GGUF");
        std::fs::write(temp.path().join("readme.md"), "docs").unwrap();
        std::fs::create_dir(temp.path().join("nested.gguf")).unwrap();

        let models = discover_models(temp.path()).unwrap();
        let names: Vec<String> = models.iter().map(|p| model_id_for(p)).collect();

        assert_eq!(names, vec!["alpha.GGUF".to_string(), "zeta.gguf".to_string()]);
    }

    #[test]
    fn test_discover_models_missing_dir_is_empty() {
        let models = discover_models(Path::new("/definitely/not/here")).unwrap();
        assert!(models.is_empty());
    }
}
