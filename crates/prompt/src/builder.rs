//! Prompt builder for rendering templates and injecting context.

use crate::types::{BuiltPrompt, PromptDefinition};
use firegpt_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Variable that receives retrieved context.
pub const KNOWLEDGE_CONTEXT_VAR: &str = "knowledgeContext";

/// Build a prompt from a definition and input variables.
///
/// Retrieved context is injected as `{{knowledgeContext}}` when the
/// definition asks for it. An absent context renders as an empty string so
/// a failed or empty retrieval still produces a well-formed prompt.
///
/// # Example
/// ```no_run
/// use firegpt_prompt::{build_prompt, builtin_prompt, ASK_PROMPT_ID};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt(ASK_PROMPT_ID)?;
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "How do crews build a fire line?".to_string());
///
/// let built = build_prompt(&def, vars, Some("Fire lines are...".to_string()))?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    mut variables: HashMap<String, String>,
    knowledge_context: Option<String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let knowledge_context_included = if definition.context.include_knowledge_base {
        let context = knowledge_context.unwrap_or_default();
        let included = !context.is_empty();
        variables.insert(KNOWLEDGE_CONTEXT_VAR.to_string(), context);
        if !included {
            tracing::debug!("No knowledge context for {}", definition.id);
        }
        included
    } else {
        false
    };

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?;
    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        knowledge_context_included,
        definition.output.normalize,
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}
