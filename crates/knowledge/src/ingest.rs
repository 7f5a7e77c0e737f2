//! Document ingestion: uploaded PDFs and images into the chunk store.

use crate::parser::{classify_upload, clean_extracted_text, DocumentKind};
use crate::store::ChunkStore;
use crate::types::{IngestResult, SourceInfo};
use firegpt_core::config::IngestSettings;
use firegpt_core::{AppError, AppResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Turns a document on disk into plain text.
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path, kind: DocumentKind) -> AppResult<String>;
}

/// Extractor backed by the `pdftotext` and `tesseract` command-line tools.
///
/// PDFs use their text layer first and fall back to OCR when it is empty.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    pdftotext: PathBuf,
    tesseract: PathBuf,
    timeout: Duration,
}

impl CommandExtractor {
    pub fn new(pdftotext: impl Into<PathBuf>, tesseract: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            pdftotext: pdftotext.into(),
            tesseract: tesseract.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &IngestSettings) -> Self {
        Self::new(
            &settings.pdftotext_binary,
            &settings.tesseract_binary,
            Duration::from_secs(settings.extract_timeout_secs),
        )
    }

    async fn run(&self, program: &Path, args: &[&std::ffi::OsStr]) -> AppResult<String> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            AppError::Ingestion(format!("Failed to spawn {}: {}", program.display(), e))
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AppError::Ingestion(format!(
                    "{} timed out after {}s",
                    program.display(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AppError::Ingestion(format!("{} failed: {}", program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Ingestion(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn ocr(&self, path: &Path) -> AppResult<String> {
        self.run(&self.tesseract, &[path.as_os_str(), "stdout".as_ref()])
            .await
    }
}

#[async_trait::async_trait]
impl TextExtractor for CommandExtractor {
    async fn extract(&self, path: &Path, kind: DocumentKind) -> AppResult<String> {
        if kind.is_image() {
            return self.ocr(path).await;
        }

        let text_layer = match self
            .run(&self.pdftotext, &[path.as_os_str(), "-".as_ref()])
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("pdftotext failed, trying OCR: {}", e);
                String::new()
            }
        };

        if !text_layer.trim().is_empty() {
            return Ok(text_layer);
        }

        tracing::debug!("PDF has no text layer, running OCR on {:?}", path);
        self.ocr(path).await
    }
}

/// Validates uploads, extracts their text and appends it to the store.
pub struct Ingestor {
    store: Arc<dyn ChunkStore>,
    extractor: Arc<dyn TextExtractor>,
    upload_dir: PathBuf,
    max_bytes: usize,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        extractor: Arc<dyn TextExtractor>,
        upload_dir: impl Into<PathBuf>,
        max_bytes: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            upload_dir: upload_dir.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Ingest one uploaded file.
    ///
    /// Type and size are checked before anything touches disk. The payload
    /// lives in a temp file that is removed on every path out of this call.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> AppResult<IngestResult> {
        if bytes.len() > self.max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Upload is {} bytes; the limit is {} bytes",
                bytes.len(),
                self.max_bytes
            )));
        }
        let kind = classify_upload(filename, bytes)?;

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let mut temp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(kind.suffix())
            .tempfile_in(&self.upload_dir)?;
        temp.write_all(bytes)?;
        temp.flush()?;

        tracing::info!("Extracting text from {} ({} bytes)", filename, bytes.len());
        let raw = self.extractor.extract(temp.path(), kind).await?;
        drop(temp);

        let text = clean_extracted_text(&raw);
        if text.is_empty() {
            return Err(AppError::Ingestion(format!(
                "No text could be extracted from '{}'",
                filename
            )));
        }

        let store = Arc::clone(&self.store);
        let source = SourceInfo::new(filename, kind.as_str());
        let chunk_text = text.clone();
        let chunks_added = tokio::task::spawn_blocking(move || {
            let added = store.add_document(&source, &chunk_text)?;
            store.flush()?;
            Ok::<_, AppError>(added)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Ingestion task failed: {}", e)))??;

        tracing::info!("Ingested {} as {} new chunks", filename, chunks_added);
        Ok(IngestResult { text, chunks_added })
    }
}
