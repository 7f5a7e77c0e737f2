//! Chunk store: similarity search over document fragments.

use crate::chunker::chunk_text;
use crate::embedder::TrigramEmbedder;
use crate::index;
use crate::types::{DocumentChunk, KnowledgeSource, SourceInfo, StoreStats};
use chrono::Utc;
use firegpt_core::{AppError, AppResult};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage and similarity search over document chunks.
///
/// Calls block; async callers run them on the blocking pool.
pub trait ChunkStore: Send + Sync {
    /// Up to `k` chunks ordered by decreasing relevance to `query`.
    fn search(&self, query: &str, k: usize) -> AppResult<Vec<DocumentChunk>>;

    /// Chunk and append a document. Returns the number of chunks added;
    /// a document already present adds nothing.
    fn add_document(&self, source: &SourceInfo, text: &str) -> AppResult<usize>;

    /// Make everything added so far durable.
    fn flush(&self) -> AppResult<()>;

    fn stats(&self) -> AppResult<StoreStats>;
}

/// Chunking parameters used when adding documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }
}

/// SQLite implementation of [`ChunkStore`].
pub struct SqliteChunkStore {
    conn: Mutex<Connection>,
    embedder: TrigramEmbedder,
    options: ChunkOptions,
    path: PathBuf,
}

impl SqliteChunkStore {
    /// Open (or create) the index at `path`.
    pub fn open(path: &Path, options: ChunkOptions) -> AppResult<Self> {
        let conn = index::init_index(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder: TrigramEmbedder::default(),
            options,
            path: path.to_path_buf(),
        })
    }

    /// Load the index if it already holds chunks, otherwise build it from
    /// the corpus file and save it.
    ///
    /// Having neither an index nor a corpus is an error.
    pub fn open_or_build(index_path: &Path, corpus_path: &Path, options: ChunkOptions) -> AppResult<Self> {
        let existed = index_path.is_file();
        if !existed && !corpus_path.is_file() {
            return Err(AppError::Knowledge(format!(
                "No index at {} and no corpus at {}",
                index_path.display(),
                corpus_path.display()
            )));
        }

        let store = Self::open(index_path, options)?;
        let stats = store.stats()?;
        if stats.chunks_count > 0 {
            tracing::info!(
                "Loaded index {:?} ({} sources, {} chunks)",
                index_path,
                stats.sources_count,
                stats.chunks_count
            );
            return Ok(store);
        }

        if !corpus_path.is_file() {
            return Err(AppError::Knowledge(format!(
                "Index at {} is empty and no corpus at {}",
                index_path.display(),
                corpus_path.display()
            )));
        }

        tracing::info!("Building index from corpus {:?}", corpus_path);
        let text = std::fs::read_to_string(corpus_path).map_err(|e| {
            AppError::Knowledge(format!("Failed to read corpus {:?}: {}", corpus_path, e))
        })?;

        let name = corpus_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| corpus_path.display().to_string());
        let added = store.add_document(&SourceInfo::new(name, "text"), &text)?;
        store.flush()?;

        tracing::info!("Indexed {} chunks into {:?}", added, index_path);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Knowledge("Index connection lock poisoned".to_string()))
    }
}

impl ChunkStore for SqliteChunkStore {
    fn search(&self, query: &str, k: usize) -> AppResult<Vec<DocumentChunk>> {
        let embedding = self.embedder.embed(query);
        let conn = self.lock()?;
        let results = index::query_chunks(&conn, &embedding, k)?;
        Ok(results.into_iter().map(|(chunk, _)| chunk).collect())
    }

    fn add_document(&self, source: &SourceInfo, text: &str) -> AppResult<usize> {
        let source_id = content_id(text);
        let candidates = chunk_text(text, self.options.chunk_size, self.options.chunk_overlap);

        // Embed outside the lock
        let chunks: Vec<(DocumentChunk, Vec<f32>)> = candidates
            .into_iter()
            .map(|candidate| {
                let embedding = self.embedder.embed(&candidate.text);
                let chunk = DocumentChunk {
                    id: uuid::Uuid::new_v4().to_string(),
                    source_id: source_id.clone(),
                    position: candidate.position,
                    text: candidate.text,
                };
                (chunk, embedding)
            })
            .collect();

        if chunks.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        if index::source_exists(&conn, &source_id)? {
            tracing::info!("Source {} ({}) already indexed", source.name, source_id);
            return Ok(0);
        }

        let tx = conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

        index::insert_source(
            &tx,
            &KnowledgeSource {
                id: source_id.clone(),
                name: source.name.clone(),
                content_type: source.content_type.clone(),
                learned_at: Utc::now(),
                size_bytes: text.len() as u64,
            },
        )?;
        for (chunk, embedding) in &chunks {
            index::insert_chunk(&tx, chunk, embedding)?;
        }

        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit chunks: {}", e)))?;

        tracing::debug!("Added {} chunks for source {}", chunks.len(), source.name);
        Ok(chunks.len())
    }

    fn flush(&self) -> AppResult<()> {
        let conn = self.lock()?;
        index::checkpoint(&conn)
    }

    fn stats(&self) -> AppResult<StoreStats> {
        let conn = self.lock()?;
        index::get_stats(&conn)
    }
}

/// Stable source ID derived from document text.
pub fn content_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}
