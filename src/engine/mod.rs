use log::warn;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::IngestError;
use crate::extract::non_empty;
use crate::model::ExtractedRecipe;

pub mod anthropic;
pub mod open_ai;
pub mod prompt;
pub mod provider;
pub mod quantity;
pub mod sanitize;
pub mod yields;

pub use provider::{CompletionProvider, ProviderFactory};

pub(crate) const TRUNCATION_MARKER: &str = "\n... [content truncated due to length]";

/// Video title and description sent alongside a transcript so the model can
/// lean on them when the spoken audio is thin.
#[derive(Debug, Clone, Default)]
pub struct SourceContext {
    pub title: String,
    pub description: String,
}

#[derive(Debug)]
pub struct EngineOutput {
    pub recipes: Vec<ExtractedRecipe>,
    /// Source text was cut to the prompt budget before the model saw it.
    pub truncated: bool,
}

/// Turns free-form source text into recipe records through a completion
/// provider. The system prompt pins the output shape; everything the model
/// returns is re-validated here, and a single malformed recipe fails the
/// whole attempt rather than producing a partial batch.
pub struct GenerativeEngine {
    provider: Box<dyn CompletionProvider>,
    max_prompt_chars: usize,
}

impl GenerativeEngine {
    pub fn new(provider: Box<dyn CompletionProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            max_prompt_chars: config.max_prompt_chars,
        }
    }

    pub async fn extract(
        &self,
        source_url: &str,
        text: &str,
        context: Option<&SourceContext>,
    ) -> Result<EngineOutput, IngestError> {
        let (text, truncated) = truncate_input(text, self.max_prompt_chars);
        if truncated {
            warn!(
                "Source text for {} exceeds {} chars, truncating",
                source_url, self.max_prompt_chars
            );
        }

        let user_prompt = prompt::render_user_prompt(&text, context);
        let raw = self
            .provider
            .complete(prompt::EXTRACTION_SYSTEM_PROMPT, &user_prompt, true)
            .await?;

        let recipes = parse_response(&raw, source_url)?;
        Ok(EngineOutput { recipes, truncated })
    }
}

fn truncate_input(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(TRUNCATION_MARKER);
    (cut, true)
}

/// Parse the model output into recipes. Accepts a single object, a list of
/// objects, or a {"recipes": [...]} wrapper; anything else is a schema
/// failure.
fn parse_response(raw: &str, source_url: &str) -> Result<Vec<ExtractedRecipe>, IngestError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| IngestError::Schema(format!("model returned invalid JSON: {}", e)))?;

    let entries: Vec<Value> = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("recipes") {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(IngestError::Schema(format!(
                    "\"recipes\" must be a list, got {}",
                    shape_name(&other)
                )))
            }
            None => vec![Value::Object(map)],
        },
        other => {
            return Err(IngestError::Schema(format!(
                "expected a JSON object or list, got {}",
                shape_name(&other)
            )))
        }
    };

    if entries.is_empty() {
        return Err(IngestError::Schema("no recipes returned".to_string()));
    }

    entries
        .iter()
        .map(|entry| convert_recipe(entry, source_url))
        .collect()
}

fn convert_recipe(value: &Value, source_url: &str) -> Result<ExtractedRecipe, IngestError> {
    let map = value.as_object().ok_or_else(|| {
        IngestError::Schema(format!(
            "recipe entry must be an object, got {}",
            shape_name(value)
        ))
    })?;

    for key in ["title", "ingredients", "instructions"] {
        if !map.contains_key(key) {
            return Err(IngestError::Schema(format!(
                "recipe is missing required key \"{}\"",
                key
            )));
        }
    }

    let title = sanitize::coerce_to_string(&map["title"]);
    if title.is_empty() {
        return Err(IngestError::Schema("recipe title is empty".to_string()));
    }

    let ingredients = string_list(&map["ingredients"], "ingredients")?;
    let instructions = string_list(&map["instructions"], "instructions")?;

    let prep_time = map
        .get("prep_time")
        .and_then(|v| non_empty(sanitize::coerce_to_string(v)));
    let cook_time = map
        .get("cook_time")
        .and_then(|v| non_empty(sanitize::coerce_to_string(v)));

    let (servings, parsed_unit) = map
        .get("servings")
        .map(|v| yields::parse_yield_value(v, &title))
        .unwrap_or((None, None));
    let yield_unit = map
        .get("yield_unit")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or(parsed_unit)
        .unwrap_or_else(|| "servings".to_string());

    let image_url = map
        .get("image_url")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    Ok(ExtractedRecipe {
        title,
        ingredients,
        instructions,
        prep_time,
        cook_time,
        servings,
        yield_unit,
        image_url,
        source_url: source_url.to_string(),
    })
}

/// Lists stay lists: a string where ingredients or instructions should be
/// means the model ignored the shape, so the attempt fails.
fn string_list(value: &Value, field: &str) -> Result<Vec<String>, IngestError> {
    let entries = value.as_array().ok_or_else(|| {
        IngestError::Schema(format!(
            "\"{}\" must be a list, got {}",
            field,
            shape_name(value)
        ))
    })?;

    let list = sanitize::coerce_list(entries);
    if list.is_empty() {
        return Err(IngestError::Schema(format!("\"{}\" is empty", field)));
    }
    Ok(list)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner
        .trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
