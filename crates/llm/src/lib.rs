//! LLM integration crate for FireGPT.
//!
//! Text generation goes through a single [`ModelRegistry`] that owns the
//! active backend: either a real model served by a runtime behind the
//! [`LlmClient`] trait, or a stub that returns a fixed placeholder when no
//! model could be loaded.
//!
//! # Providers
//! - **llama-server**: llama.cpp HTTP server, one child process per model
//!
//! # Example
//! ```no_run
//! use firegpt_llm::{InferenceParams, ModelRegistry, providers::LlamaServerLoader};
//! use std::{path::Path, sync::Arc, time::Duration};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = Arc::new(LlamaServerLoader::new(
//!     "llama-server",
//!     Duration::from_secs(60),
//!     Duration::from_secs(300),
//! ));
//! let registry =
//!     ModelRegistry::bootstrap(loader, InferenceParams::default(), Path::new("."), false).await;
//! println!("{}", registry.invoke("Hello").await?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod providers;
pub mod registry;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use providers::{LlamaServerClient, LlamaServerLoader};
pub use registry::{
    discover_models, Backend, BackendLoader, InferenceParams, LoadOutcome, ModelRegistry,
    RealModel, StubModel,
};
