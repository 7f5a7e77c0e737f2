//! Rendering built prompts into the text form a model expects.

use crate::types::BuiltPrompt;
use firegpt_core::{AppError, AppResult};
use std::fmt;
use std::str::FromStr;

/// Chat template applied to a [`BuiltPrompt`] before generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatFormat {
    /// `[INST] <<SYS>> ... <</SYS>> ... [/INST]`
    #[default]
    Llama2,
    /// `System: ...` / `Human: ...`
    Plain,
}

impl ChatFormat {
    /// Render system and user turns into a single prompt string.
    pub fn render(&self, prompt: &BuiltPrompt) -> String {
        let system = prompt.system.as_deref().unwrap_or_default();
        match self {
            ChatFormat::Llama2 if system.is_empty() => format!("[INST] {} [/INST]", prompt.user),
            ChatFormat::Llama2 => format!(
                "[INST] <<SYS>>\n{}\n<</SYS>>\n\n{} [/INST]",
                system, prompt.user
            ),
            ChatFormat::Plain if system.is_empty() => format!("Human: {}", prompt.user),
            ChatFormat::Plain => format!("System: {}\nHuman: {}", system, prompt.user),
        }
    }

    /// Sequences at which generation should stop for this format.
    pub fn stop_sequences(&self) -> Vec<String> {
        match self {
            ChatFormat::Llama2 => vec!["[INST]".to_string()],
            ChatFormat::Plain => vec!["Human:".to_string(), "System:".to_string()],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatFormat::Llama2 => "llama-2",
            ChatFormat::Plain => "plain",
        }
    }
}

impl FromStr for ChatFormat {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llama-2" | "llama2" => Ok(ChatFormat::Llama2),
            "plain" => Ok(ChatFormat::Plain),
            other => Err(AppError::Config(format!(
                "Unknown prompt format '{}'. Expected 'llama-2' or 'plain'",
                other
            ))),
        }
    }
}

impl fmt::Display for ChatFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
