//! llama.cpp server provider.
//!
//! Each loaded model runs in its own `llama-server` child process bound to a
//! free loopback port. The client owns the child; dropping the client (when
//! the registry replaces the backend) kills the process.
//! API: https://github.com/ggerganov/llama.cpp/tree/master/examples/server

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::registry::{BackendLoader, InferenceParams, LoadOutcome, RealModel};
use firegpt_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// First four bytes of every GGUF file.
const GGUF_MAGIC: &[u8; 4] = b"GGUF";

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// llama-server `/completion` request body.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_predict: Option<u32>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    stream: bool,
}

/// llama-server `/completion` response body.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    tokens_evaluated: u32,
    #[serde(default)]
    tokens_predicted: u32,
}

/// Client for one running llama-server process.
pub struct LlamaServerClient {
    /// Base URL, e.g. `http://127.0.0.1:39211`
    base_url: String,

    /// HTTP client carrying the generation timeout
    client: reqwest::Client,

    /// Child process, killed on drop
    process: Mutex<Option<Child>>,
}

impl LlamaServerClient {
    /// Connect to an already running server without owning a process.
    pub fn with_base_url(base_url: impl Into<String>, request_timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            process: Mutex::new(None),
        })
    }

    fn attach(self, child: Child) -> Self {
        if let Ok(mut slot) = self.process.lock() {
            *slot = Some(child);
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl LlmClient for LlamaServerClient {
    fn provider_name(&self) -> &str {
        "llama-server"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!("Sending completion request to llama-server at {}", self.base_url);

        let body = CompletionRequest {
            prompt: &request.prompt,
            temperature: request.temperature,
            n_predict: request.max_tokens,
            stop: &request.stop,
            stream: false,
        };
        let url = format!("{}/completion", self.base_url);

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Llm("Generation timed out".to_string())
            } else {
                AppError::Llm(format!("Failed to send request to llama-server: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "llama-server error ({}): {}",
                status, error_text
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse llama-server response: {}", e)))?;

        Ok(LlmResponse {
            content: completion.content,
            model: request.model.clone(),
            usage: LlmUsage::new(completion.tokens_evaluated, completion.tokens_predicted),
        })
    }
}

/// Starts a llama-server process per model artifact.
#[derive(Debug, Clone)]
pub struct LlamaServerLoader {
    binary: PathBuf,
    startup_timeout: Duration,
    request_timeout: Duration,
}

impl LlamaServerLoader {
    pub fn new(binary: impl Into<PathBuf>, startup_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            startup_timeout,
            request_timeout,
        }
    }

    async fn try_load(&self, path: &Path, params: &InferenceParams) -> AppResult<RealModel> {
        check_gguf_magic(path).await?;

        let port = free_port()?;
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-m").arg(path);
        cmd.arg("--host").arg("127.0.0.1");
        cmd.arg("--port").arg(port.to_string());
        cmd.arg("-c").arg(params.context_size.to_string());
        cmd.arg("-t").arg(params.threads.to_string());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AppError::ModelLoad(format!(
                "Failed to spawn {}: {}",
                self.binary.display(),
                e
            ))
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    tracing::debug!("[llama-server] {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    tracing::debug!("[llama-server-err] {}", line);
                }
            });
        }

        let base_url = format!("http://127.0.0.1:{}", port);
        let client = LlamaServerClient::with_base_url(&base_url, self.request_timeout)?;
        self.wait_for_health(&client, &mut child).await?;

        tracing::info!("llama-server ready on {} for {:?}", base_url, path);
        let client = client.attach(child);
        Ok(RealModel::new(path, Arc::new(client), params.clone()))
    }

    async fn wait_for_health(&self, client: &LlamaServerClient, child: &mut Child) -> AppResult<()> {
        let url = format!("{}/health", client.base_url);
        let deadline = Instant::now() + self.startup_timeout;

        loop {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(AppError::ModelLoad(format!(
                    "llama-server exited during startup ({})",
                    status
                )));
            }

            if health_ok(&client.client, &url, deadline).await {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(AppError::ModelLoad(format!(
                    "Timed out after {}s waiting for llama-server",
                    self.startup_timeout.as_secs()
                )));
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }
}

#[async_trait::async_trait]
impl BackendLoader for LlamaServerLoader {
    async fn load(&self, path: &Path, params: &InferenceParams) -> LoadOutcome {
        match self.try_load(path, params).await {
            Ok(model) => LoadOutcome::Loaded(model),
            Err(e) => LoadOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// One `/health` request, cut off at `deadline` rather than the generation timeout.
async fn health_ok(client: &reqwest::Client, url: &str, deadline: Instant) -> bool {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return false;
    }

    match client.get(url).timeout(remaining).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// Reject files that are not GGUF before spawning anything.
async fn check_gguf_magic(path: &Path) -> AppResult<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| AppError::ModelLoad(format!("Cannot open {}: {}", path.display(), e)))?;

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic).await {
        Ok(_) if &magic == GGUF_MAGIC => Ok(()),
        _ => Err(AppError::ModelLoad(format!(
            "{} is not a GGUF model file",
            path.display()
        ))),
    }
}

fn free_port() -> AppResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")
        .map_err(|e| AppError::ModelLoad(format!("No free port for llama-server: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| AppError::ModelLoad(format!("No free port for llama-server: {}", e)))?
        .port();
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_rejects_non_gguf_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.gguf");
        std::fs::write(&path, b"not a model").unwrap();

        let result = check_gguf_magic(&path).await;
        assert!(matches!(result, Err(AppError::ModelLoad(_))));
    }

    #[tokio::test]
    async fn test_accepts_gguf_magic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.gguf");
        std::fs::write(&path, b"GGUF\x03\x00\x00\x00").unwrap();

        assert!(check_gguf_magic(&path).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_binary_reports_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.gguf");
        std::fs::write(&path, b"GGUF\x03\x00\x00\x00").unwrap();

        let loader = LlamaServerLoader::new(
            temp.path().join("no-such-llama-server"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        match loader.load(&path, &InferenceParams::default()).await {
            LoadOutcome::Failed { reason } => assert!(reason.contains("Failed to spawn")),
            LoadOutcome::Loaded(_) => panic!("load should fail without a server binary"),
        }
    }

    #[test]
    fn test_request_body_omits_empty_stop() {
        let body = CompletionRequest {
            prompt: "hi",
            temperature: Some(0.7),
            n_predict: Some(256),
            stop: &[],
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["n_predict"], 256);
        assert!(json.get("stop").is_none());
    }

    #[tokio::test]
    async fn test_health_check_bounded_by_deadline() {
        // Accepts connections and never answers, like a server still loading.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = LlamaServerClient::with_base_url(format!("http://{}", addr), Duration::from_secs(300)).unwrap();
        let url = format!("{}/health", client.base_url());
        let started = Instant::now();

        let healthy = health_ok(&client.client, &url, started + Duration::from_millis(300)).await;

        assert!(!healthy);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!health_ok(&client.client, &url, Instant::now()).await);
    }

    #[test]
    fn test_free_port_is_nonzero() {
        assert!(free_port().unwrap() > 0);
    }
}
