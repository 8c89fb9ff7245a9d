use super::SourceContext;

/// System prompt for recipe extraction. The engine enforces the same shape
/// after parsing; loosening one side without the other breaks extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert recipe data extractor. Extract the recipe from the provided content and return ONLY a strict JSON object with the following keys:

- "title": string
- "ingredients": a list of strings, one ingredient per entry
- "instructions": a list of strings, one step per entry
- "prep_time": string or null
- "cook_time": string or null
- "servings": number or null
- "yield_unit": string naming what the servings count (e.g. "servings", "cookies", "loaves")
- "image_url": string or null

Every entry in "ingredients" and "instructions" must be plain flat text. Do not nest objects or lists inside them.

If the content contains several distinct recipes (not variations of one), return {"recipes": [...]} where each element is an object with the keys above.

Do not include any introductory text, explanations, or markdown formatting around the JSON. Your output must be parsable by a standard JSON parser."#;

/// Render the user message: optional video context first, then the source
/// text.
pub fn render_user_prompt(text: &str, context: Option<&SourceContext>) -> String {
    match context {
        Some(ctx) => format!(
            "Video title: {}\nVideo description: {}\n\nHere is the transcript:\n\n{}",
            ctx.title, ctx.description, text
        ),
        None => format!("Here is the page content:\n\n{}", text),
    }
}
