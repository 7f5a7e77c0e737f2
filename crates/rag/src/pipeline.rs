//! Retrieval-augmented question answering.

use firegpt_core::config::{GeoSettings, KnowledgeSettings};
use firegpt_core::{AppError, AppResult};
use firegpt_geo::{extract_place, Geocoder, ResourceLookup};
use firegpt_knowledge::{assemble_context, ChunkStore, DocumentChunk};
use firegpt_llm::ModelRegistry;
use firegpt_prompt::{
    build_prompt, builtin_prompt, load_prompt, normalize, BuiltPrompt, ChatFormat,
    PromptDefinition, ASK_PROMPT_ID, PLAN_PROMPT_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for retrieval and enrichment.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Chunks retrieved per question
    pub top_k: usize,

    /// Character budget of the assembled context
    pub context_chars: usize,

    pub retrieval_timeout: Duration,

    pub search_radius_km: f64,

    /// Closest resources kept for a plan
    pub max_resources: usize,

    pub max_per_category: usize,

    pub safe_zone_count: usize,
}

impl PipelineOptions {
    pub fn from_settings(knowledge: &KnowledgeSettings, geo: &GeoSettings) -> Self {
        Self {
            top_k: knowledge.top_k,
            context_chars: knowledge.context_chars,
            retrieval_timeout: Duration::from_secs(knowledge.retrieval_timeout_secs),
            search_radius_km: geo.search_radius_km,
            max_resources: geo.max_resources,
            max_per_category: geo.max_per_category,
            safe_zone_count: geo.safe_zone_count,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&KnowledgeSettings::default(), &GeoSettings::default())
    }
}

/// Prompt definitions used by the pipeline.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub ask: PromptDefinition,
    pub plan: PromptDefinition,
}

impl Prompts {
    /// Built-in prompts, with overrides from the workspace when present.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        Ok(Self {
            ask: load_prompt(workspace, ASK_PROMPT_ID)?,
            plan: load_prompt(workspace, PLAN_PROMPT_ID)?,
        })
    }

    pub fn builtin() -> AppResult<Self> {
        Ok(Self {
            ask: builtin_prompt(ASK_PROMPT_ID)?,
            plan: builtin_prompt(PLAN_PROMPT_ID)?,
        })
    }
}

/// A geocoded place mentioned in a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Answer to a free-text question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// Normalized model output
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// The RAG engine: retriever, prompt builder, model registry and geodata
/// clients composed into request/response operations.
pub struct RagPipeline {
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) store: Arc<dyn ChunkStore>,
    pub(crate) geocoder: Arc<dyn Geocoder>,
    pub(crate) lookup: Arc<dyn ResourceLookup>,
    pub(crate) prompts: Prompts,
    pub(crate) format: ChatFormat,
    pub(crate) options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(
        registry: Arc<ModelRegistry>,
        store: Arc<dyn ChunkStore>,
        geocoder: Arc<dyn Geocoder>,
        lookup: Arc<dyn ResourceLookup>,
        prompts: Prompts,
        format: ChatFormat,
        options: PipelineOptions,
    ) -> Self {
        Self {
            registry,
            store,
            geocoder,
            lookup,
            prompts,
            format,
            options,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Answer a question from the corpus, attaching a location when the
    /// question names a place that can be geocoded.
    pub async fn ask(&self, question: &str) -> AppResult<AskResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput("No query provided.".to_string()));
        }

        let chunks = self.retrieve(question).await?;
        let context = assemble_context(&chunks, self.options.context_chars);
        tracing::debug!(
            "Assembled {} chars of context from {} chunks",
            context.chars().count(),
            chunks.len()
        );

        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        let built = build_prompt(&self.prompts.ask, variables, Some(context))?;

        let text = self.generate(&built).await?;
        let location = self.locate(question).await;

        Ok(AskResponse { text, location })
    }

    /// Render, invoke the active backend and normalize its output.
    pub(crate) async fn generate(&self, built: &BuiltPrompt) -> AppResult<String> {
        let rendered = self.format.render(built);
        let raw = self.registry.invoke(&rendered).await?;

        Ok(if built.metadata.normalize {
            normalize(&raw)
        } else {
            raw.trim().to_string()
        })
    }

    async fn retrieve(&self, question: &str) -> AppResult<Vec<DocumentChunk>> {
        let k = self.options.top_k;
        let store = Arc::clone(&self.store);
        let query = question.to_string();
        let task = tokio::task::spawn_blocking(move || store.search(&query, k));

        match tokio::time::timeout(self.options.retrieval_timeout, task).await {
            Ok(Ok(result)) => {
                let mut chunks = result?;
                chunks.truncate(k);
                Ok(chunks)
            }
            Ok(Err(e)) => Err(AppError::Knowledge(format!("Retrieval task failed: {}", e))),
            Err(_) => {
                tracing::warn!(
                    "Retrieval timed out after {:?}, answering without context",
                    self.options.retrieval_timeout
                );
                Ok(Vec::new())
            }
        }
    }

    async fn locate(&self, question: &str) -> Option<Location> {
        let place = extract_place(question)?;

        match self.geocoder.geocode(&place).await {
            Ok(Some(coord)) => Some(Location {
                name: place,
                lat: coord.lat,
                lon: coord.lon,
            }),
            Ok(None) => {
                tracing::debug!("No geocoding result for '{}'", place);
                None
            }
            Err(e) => {
                tracing::warn!("Geocoding '{}' failed: {}", place, e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use firegpt_geo::{Coordinate, RawResource};
    use firegpt_knowledge::{SourceInfo, StoreStats};
    use firegpt_llm::{
        BackendLoader, InferenceParams, LlmClient, LlmRequest, LlmResponse, LlmUsage,
        LoadOutcome, RealModel,
    };
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    pub struct FakeStore {
        pub chunks: Vec<String>,
        pub delay: Duration,
        pub fail: bool,
        pub searches: Mutex<u32>,
    }

    impl FakeStore {
        pub fn with_chunks(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                delay: Duration::ZERO,
                fail: false,
                searches: Mutex::new(0),
            }
        }
    }

    impl ChunkStore for FakeStore {
        fn search(&self, _query: &str, k: usize) -> AppResult<Vec<DocumentChunk>> {
            *self.searches.lock().unwrap() += 1;
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(AppError::Knowledge("index is corrupt".to_string()));
            }
            Ok(self
                .chunks
                .iter()
                .enumerate()
                .map(|(i, text)| DocumentChunk {
                    id: format!("c{}", i),
                    source_id: "corpus".to_string(),
                    position: i as u32,
                    text: text.clone(),
                })
                .take(k)
                .collect())
        }

        fn add_document(&self, _source: &SourceInfo, _text: &str) -> AppResult<usize> {
            Ok(0)
        }

        fn flush(&self) -> AppResult<()> {
            Ok(())
        }

        fn stats(&self) -> AppResult<StoreStats> {
            Ok(StoreStats::default())
        }
    }

    pub struct FakeGeocoder {
        pub result: AppResult<Option<Coordinate>>,
    }

    #[async_trait::async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, _place: &str) -> AppResult<Option<Coordinate>> {
            match &self.result {
                Ok(coord) => Ok(*coord),
                Err(_) => Err(AppError::Geo("nominatim unavailable".to_string())),
            }
        }
    }

    pub struct FakeLookup {
        pub resources: Vec<RawResource>,
        pub fail: bool,
        pub calls: Mutex<u32>,
    }

    impl FakeLookup {
        pub fn with(resources: Vec<RawResource>) -> Self {
            Self {
                resources,
                fail: false,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ResourceLookup for FakeLookup {
        async fn nearby(&self, _center: Coordinate, _radius_km: f64) -> AppResult<Vec<RawResource>> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(AppError::Geo("overpass timed out".to_string()));
            }
            Ok(self.resources.clone())
        }
    }

    /// Records prompts and answers with a fixed reply.
    pub struct RecordingClient {
        pub reply: String,
        pub fail: bool,
        pub prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingClient {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if self.fail {
                return Err(AppError::Llm("generation timed out".to_string()));
            }
            Ok(LlmResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(1, 1),
            })
        }
    }

    struct RecordingLoader {
        client: Arc<RecordingClient>,
    }

    #[async_trait::async_trait]
    impl BackendLoader for RecordingLoader {
        async fn load(&self, path: &Path, params: &InferenceParams) -> LoadOutcome {
            LoadOutcome::Loaded(RealModel::new(path, self.client.clone(), params.clone()))
        }
    }

    /// Registry with a real backend that talks to a [`RecordingClient`].
    pub async fn recording_registry(
        reply: &str,
        fail: bool,
    ) -> (Arc<ModelRegistry>, Arc<RecordingClient>, TempDir) {
        let temp = TempDir::new().unwrap();
        let model: PathBuf = temp.path().join("test.gguf");
        std::fs::write(&model, b"GGUF").unwrap();

        let client = Arc::new(RecordingClient {
            reply: reply.to_string(),
            fail,
            prompts: Mutex::new(Vec::new()),
        });
        let registry = Arc::new(ModelRegistry::with_stub(
            Arc::new(RecordingLoader {
                client: client.clone(),
            }),
            InferenceParams::default(),
            "test",
        ));
        registry.swap(&model).await.unwrap();
        (registry, client, temp)
    }

    pub fn pipeline(
        registry: Arc<ModelRegistry>,
        store: FakeStore,
        geocoder: FakeGeocoder,
        lookup: Arc<FakeLookup>,
    ) -> RagPipeline {
        RagPipeline::new(
            registry,
            Arc::new(store),
            Arc::new(geocoder),
            lookup,
            Prompts::builtin().unwrap(),
            ChatFormat::Llama2,
            PipelineOptions {
                retrieval_timeout: Duration::from_millis(500),
                ..PipelineOptions::default()
            },
        )
    }

    fn no_geocode() -> FakeGeocoder {
        FakeGeocoder { result: Ok(None) }
    }

    fn stub_registry() -> Arc<ModelRegistry> {
        struct NeverLoader;

        #[async_trait::async_trait]
        impl BackendLoader for NeverLoader {
            async fn load(&self, _path: &Path, _params: &InferenceParams) -> LoadOutcome {
                LoadOutcome::Failed {
                    reason: "not available".to_string(),
                }
            }
        }

        Arc::new(ModelRegistry::with_stub(
            Arc::new(NeverLoader),
            InferenceParams::default(),
            "dummy mode requested",
        ))
    }

    #[tokio::test]
    async fn test_empty_question_rejected_before_retrieval() {
        let store = Arc::new(FakeStore::with_chunks(&["ctx"]));
        let pipeline = RagPipeline::new(
            stub_registry(),
            store.clone(),
            Arc::new(no_geocode()),
            Arc::new(FakeLookup::with(vec![])),
            Prompts::builtin().unwrap(),
            ChatFormat::Llama2,
            PipelineOptions::default(),
        );

        let result = pipeline.ask("   \n").await;

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(*store.searches.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stub_backend_answers() {
        let pipeline = pipeline(
            stub_registry(),
            FakeStore::with_chunks(&["Fire lines stop spread."]),
            no_geocode(),
            Arc::new(FakeLookup::with(vec![])),
        );

        let response = pipeline.ask("What is a fire line?").await.unwrap();

        assert!(response.text.contains("dummy mode requested"));
        assert_eq!(response.location, None);
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_question() {
        let (registry, client, _temp) = recording_registry("Answer", false).await;
        let pipeline = pipeline(
            registry,
            FakeStore::with_chunks(&["First chunk.", "Second chunk.", "Third chunk.", "Fourth chunk."]),
            no_geocode(),
            Arc::new(FakeLookup::with(vec![])),
        );

        let response = pipeline.ask("What is a backburn?").await.unwrap();

        assert_eq!(response.text, "Answer");
        let prompts = client.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.starts_with("[INST] <<SYS>>\nYou are a wildfire response expert."));
        assert!(prompt.contains(
            "Context:\nFirst chunk.\n\nSecond chunk.\n\nThird chunk.\n\nQuestion: What is a backburn? [/INST]"
        ));
        assert!(!prompt.contains("Fourth chunk."));
    }

    #[tokio::test]
    async fn test_output_is_normalized() {
        let (registry, _client, _temp) = recording_registry("\nsummary:\n1.Leave now\n-Take water\n", false).await;
        let pipeline = pipeline(
            registry,
            FakeStore::with_chunks(&[]),
            no_geocode(),
            Arc::new(FakeLookup::with(vec![])),
        );

        let response = pipeline.ask("What do I do?").await.unwrap();

        assert_eq!(response.text, "## Summary\n1. Leave now\n- Take water");
    }

    #[tokio::test]
    async fn test_retrieval_timeout_degrades_to_empty_context() {
        let (registry, client, _temp) = recording_registry("ok", false).await;
        let mut store = FakeStore::with_chunks(&["slow chunk"]);
        store.delay = Duration::from_millis(300);
        let pipeline = RagPipeline::new(
            registry,
            Arc::new(store),
            Arc::new(no_geocode()),
            Arc::new(FakeLookup::with(vec![])),
            Prompts::builtin().unwrap(),
            ChatFormat::Llama2,
            PipelineOptions {
                retrieval_timeout: Duration::from_millis(20),
                ..PipelineOptions::default()
            },
        );

        let response = pipeline.ask("Anything?").await.unwrap();

        assert_eq!(response.text, "ok");
        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("Context:\n\n\nQuestion: Anything?"));
    }

    #[tokio::test]
    async fn test_store_error_fails_request() {
        let mut store = FakeStore::with_chunks(&[]);
        store.fail = true;
        let pipeline = pipeline(stub_registry(), store, no_geocode(), Arc::new(FakeLookup::with(vec![])));

        let result = pipeline.ask("Anything?").await;
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }

    #[tokio::test]
    async fn test_model_failure_fails_request() {
        let (registry, _client, _temp) = recording_registry("", true).await;
        let pipeline = pipeline(
            registry,
            FakeStore::with_chunks(&[]),
            no_geocode(),
            Arc::new(FakeLookup::with(vec![])),
        );

        let result = pipeline.ask("Anything?").await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_location_attached_when_geocoded() {
        let pipeline = pipeline(
            stub_registry(),
            FakeStore::with_chunks(&[]),
            FakeGeocoder {
                result: Ok(Some(Coordinate {
                    lat: 34.05,
                    lon: -118.24,
                })),
            },
            Arc::new(FakeLookup::with(vec![])),
        );

        let response = pipeline.ask("Wildfire near Los Angeles").await.unwrap();

        assert_eq!(
            response.location,
            Some(Location {
                name: "Los Angeles".to_string(),
                lat: 34.05,
                lon: -118.24
            })
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["location"]["name"], "Los Angeles");
    }

    #[tokio::test]
    async fn test_geocoding_failure_yields_no_location() {
        let pipeline = pipeline(
            stub_registry(),
            FakeStore::with_chunks(&[]),
            FakeGeocoder {
                result: Err(AppError::Geo("down".to_string())),
            },
            Arc::new(FakeLookup::with(vec![])),
        );

        let response = pipeline.ask("Wildfire near Los Angeles").await.unwrap();

        assert_eq!(response.location, None);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("location").is_none());
    }
}
