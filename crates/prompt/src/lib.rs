//! Prompt system for FireGPT.
//!
//! This crate provides structured prompt management with:
//! - YAML prompt definitions (built in, overridable per workspace)
//! - Handlebars template rendering with knowledge context injection
//! - Chat-format rendering for the active model
//! - Output normalization of generated text

pub mod builder;
pub mod format;
pub mod loader;
pub mod normalize;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use format::ChatFormat;
pub use loader::{builtin_prompt, list_prompts, load_prompt, ASK_PROMPT_ID, PLAN_PROMPT_ID};
pub use normalize::normalize;
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptContextConfig, PromptDefinition, PromptOutputSpec};
