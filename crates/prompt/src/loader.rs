//! Prompt loader for built-in and workspace prompt definitions.
//!
//! The wildfire prompts ship inside the binary. A workspace can override any
//! of them by placing `<id>.yml` in `.firegpt/prompts/`.

use crate::types::PromptDefinition;
use firegpt_core::{AppError, AppResult};
use std::path::Path;

/// Prompt used to answer free-text questions.
pub const ASK_PROMPT_ID: &str = "wildfire.ask";

/// Prompt used to write an incident action plan.
pub const PLAN_PROMPT_ID: &str = "wildfire.plan";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (ASK_PROMPT_ID, include_str!("../prompts/wildfire.ask.yml")),
    (PLAN_PROMPT_ID, include_str!("../prompts/wildfire.plan.yml")),
];

/// Load a prompt definition by ID.
///
/// A file named `<id>.yml` in the workspace's `.firegpt/prompts/` wins over
/// the built-in definition of the same ID.
///
/// # Example
/// ```no_run
/// use firegpt_prompt::{load_prompt, ASK_PROMPT_ID};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), ASK_PROMPT_ID)?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".firegpt/prompts")
        .join(format!("{}.yml", prompt_id));

    let definition = if prompt_file.is_file() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        serde_yaml::from_str::<PromptDefinition>(&contents).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to parse prompt YAML {:?}: {}",
                prompt_file, e
            ))
        })?
    } else {
        builtin_prompt(prompt_id)?
    };

    validate_prompt(&definition)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file for '{}' declares id '{}'",
            prompt_id, definition.id
        )));
    }

    tracing::debug!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Parse one of the prompts compiled into the binary.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, source) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))?;

    serde_yaml::from_str(source)
        .map_err(|e| AppError::Prompt(format!("Invalid built-in prompt {}: {}", prompt_id, e)))
}

/// IDs of the built-in prompts.
pub fn list_prompts() -> Vec<&'static str> {
    BUILTIN_PROMPTS.iter().map(|(id, _)| *id).collect()
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Simple x.y check
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
