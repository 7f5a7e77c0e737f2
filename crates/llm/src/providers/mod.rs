//! Text generation runtimes.

pub mod llama_server;

pub use llama_server::{LlamaServerClient, LlamaServerLoader};
