//! Knowledge base for FireGPT.
//!
//! Provides local retrieval over the wildfire corpus using SQLite and
//! deterministic trigram embeddings, context assembly for prompts, and
//! ingestion of uploaded PDFs and images.

pub mod chunker;
pub mod context;
pub mod embedder;
pub mod index;
pub mod ingest;
pub mod parser;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use context::assemble_context;
pub use ingest::{CommandExtractor, Ingestor, TextExtractor};
pub use parser::DocumentKind;
pub use store::{ChunkOptions, ChunkStore, SqliteChunkStore};
pub use types::{DocumentChunk, IngestResult, KnowledgeSource, SourceInfo, StoreStats};
