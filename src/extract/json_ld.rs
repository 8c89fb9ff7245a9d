use log::debug;
use scraper::Selector;
use serde::Deserialize;
use serde_json::Value;

use super::{decode_html_symbols, humanize_duration, non_empty, split_yield};
use super::{ParsingContext, StructuredExtractor};
use crate::error::IngestError;
use crate::model::ExtractedRecipe;

/// Extracts recipes from `application/ld+json` script blocks. Shapes in the
/// wild vary wildly, so every field is modeled as an untagged union of the
/// forms sites actually emit.
pub struct JsonLdExtractor;

impl StructuredExtractor for JsonLdExtractor {
    fn name(&self) -> &'static str {
        "json-ld"
    }

    fn parse(&self, context: &ParsingContext) -> Result<ExtractedRecipe, IngestError> {
        let selector =
            Selector::parse("script[type='application/ld+json']").expect("static selector");
        let scripts: Vec<_> = context.document.select(&selector).collect();
        debug!("json-ld: found {} script blocks", scripts.len());

        for (index, script) in scripts.iter().enumerate() {
            let raw = script.inner_html();
            let value: Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    debug!("json-ld: block {} is not valid JSON: {}", index, e);
                    continue;
                }
            };

            let Some(recipe_value) = find_recipe_value(&value) else {
                debug!("json-ld: block {} holds no recipe object", index);
                continue;
            };

            match serde_json::from_value::<JsonLdRecipe>(recipe_value.clone()) {
                Ok(raw_recipe) => {
                    let recipe = convert(raw_recipe, &context.url);
                    if recipe.is_usable() {
                        return Ok(recipe);
                    }
                    debug!("json-ld: block {} recipe is missing content", index);
                }
                Err(e) => {
                    debug!("json-ld: block {} did not match any known shape: {}", index, e);
                }
            }
        }

        Err(IngestError::NotSupported)
    }
}

/// Locate the recipe node: the root object itself, an element of a root
/// array, or an entry of an `@graph` collection.
fn find_recipe_value(value: &Value) -> Option<&Value> {
    if is_recipe_type(value) {
        return Some(value);
    }
    if let Some(items) = value.as_array() {
        return items
            .iter()
            .find(|item| is_recipe_type(item) || item.get("recipeInstructions").is_some());
    }
    if let Some(graph) = value.get("@graph").and_then(|g| g.as_array()) {
        return graph.iter().find(|item| is_recipe_type(item));
    }
    None
}

/// `@type` may be a string or an array of strings ("Recipe" mixed with
/// article types is common).
fn is_recipe_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("recipe"),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(|t| t.as_str())
            .any(|t| t.eq_ignore_ascii_case("recipe")),
        _ => false,
    }
}

fn convert(raw: JsonLdRecipe, url: &str) -> ExtractedRecipe {
    let ingredients = match raw.recipe_ingredient {
        Some(RecipeIngredients::Strings(items)) => items
            .into_iter()
            .filter(|i| !i.trim().is_empty())
            .map(|i| decode_html_symbols(&i))
            .collect(),
        Some(RecipeIngredients::Objects(items)) => items
            .into_iter()
            .filter(|i| !i.name.trim().is_empty())
            .map(|i| {
                let amount = i.amount.as_deref().unwrap_or("").trim().to_string();
                let name = decode_html_symbols(&i.name);
                if amount.is_empty() {
                    name
                } else {
                    format!("{amount} {name}")
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let instructions = match raw.recipe_instructions {
        Some(RecipeInstructions::String(text)) => text
            .split('\n')
            .map(|line| decode_html_symbols(line))
            .filter_map(non_empty)
            .collect(),
        Some(RecipeInstructions::Multiple(steps)) => steps
            .into_iter()
            .map(|s| decode_html_symbols(&s))
            .filter_map(non_empty)
            .collect(),
        Some(RecipeInstructions::MultipleObject(steps)) => steps
            .into_iter()
            .map(|s| decode_html_symbols(&s.text))
            .filter_map(non_empty)
            .collect(),
        Some(RecipeInstructions::HowTo(nodes)) => flatten_how_to(nodes),
        Some(RecipeInstructions::NestedSections(sections)) => sections
            .into_iter()
            .flat_map(flatten_how_to)
            .collect(),
        None => Vec::new(),
    };

    let (servings, yield_unit) = match raw.recipe_yield {
        Some(RecipeYield::String(s)) => split_yield(&s),
        Some(RecipeYield::Number(n)) => (u32::try_from(n).ok(), "servings".to_string()),
        Some(RecipeYield::Array(options)) => {
            // prefer the descriptive entry ("15 rolls") over a bare count
            let chosen = options
                .iter()
                .find(|s| s.contains(char::is_alphabetic))
                .or_else(|| options.first());
            match chosen {
                Some(s) => split_yield(s),
                None => (None, "servings".to_string()),
            }
        }
        None => (None, "servings".to_string()),
    };

    let image_url = raw.image.and_then(|img| match img {
        ImageType::String(url) => non_empty(decode_html_symbols(&url)),
        ImageType::MultipleStrings(urls) => urls
            .first()
            .and_then(|u| non_empty(decode_html_symbols(u))),
        ImageType::Object(obj) => non_empty(obj.url),
        ImageType::MultipleObjects(objs) => objs.into_iter().next().and_then(|o| non_empty(o.url)),
        ImageType::None => None,
    });

    ExtractedRecipe {
        title: decode_html_symbols(&raw.name),
        ingredients,
        instructions,
        prep_time: raw.prep_time.and_then(non_empty).map(|t| humanize_duration(&t)),
        cook_time: raw.cook_time.and_then(non_empty).map(|t| humanize_duration(&t)),
        servings,
        yield_unit,
        image_url,
        source_url: url.to_string(),
    }
}

/// Flatten HowToStep/HowToSection trees into a flat step list. Steps prefer
/// `text` over `name` and keep `description` as a separate step when present.
fn flatten_how_to(nodes: Vec<HowTo>) -> Vec<String> {
    let mut steps = Vec::new();
    for node in nodes {
        match node {
            HowTo::HowToStep(step) => push_step(step, &mut steps),
            HowTo::HowToSection(section) => {
                for step in section.item_list_element {
                    push_step(step, &mut steps);
                }
            }
        }
    }
    steps
}

fn push_step(step: HowToStep, out: &mut Vec<String>) {
    if let Some(text) = step.text.or(step.name) {
        if let Some(text) = non_empty(decode_html_symbols(&text)) {
            out.push(text);
        }
    }
    if let Some(desc) = step.description {
        if let Some(desc) = non_empty(decode_html_symbols(&desc)) {
            out.push(desc);
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonLdRecipe {
    name: String,
    image: Option<ImageType>,
    #[serde(rename = "recipeIngredient")]
    recipe_ingredient: Option<RecipeIngredients>,
    #[serde(rename = "recipeInstructions")]
    recipe_instructions: Option<RecipeInstructions>,
    #[serde(rename = "recipeYield")]
    recipe_yield: Option<RecipeYield>,
    #[serde(rename = "prepTime")]
    prep_time: Option<String>,
    #[serde(rename = "cookTime")]
    cook_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageType {
    None,
    String(String),
    Object(ImageObject),
    MultipleStrings(Vec<String>),
    MultipleObjects(Vec<ImageObject>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeIngredients {
    Strings(Vec<String>),
    Objects(Vec<IngredientObject>),
}

#[derive(Debug, Deserialize)]
struct IngredientObject {
    name: String,
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstructionObject {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeInstructions {
    String(String),
    Multiple(Vec<String>),
    MultipleObject(Vec<InstructionObject>),
    HowTo(Vec<HowTo>),
    NestedSections(Vec<Vec<HowTo>>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "@type")]
enum HowTo {
    HowToStep(HowToStep),
    HowToSection(HowToSection),
}

#[derive(Debug, Deserialize)]
struct HowToStep {
    text: Option<String>,
    description: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HowToSection {
    #[serde(rename = "itemListElement")]
    item_list_element: Vec<HowToStep>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeYield {
    String(String),
    Number(i32),
    Array(Vec<String>),
}
