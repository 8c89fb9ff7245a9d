use log::debug;
use scraper::{ElementRef, Html, Selector};

use super::{decode_html_symbols, humanize_duration, non_empty, split_yield};
use super::{ParsingContext, StructuredExtractor};
use crate::error::IngestError;
use crate::model::ExtractedRecipe;

/// Extracts recipes marked up with schema.org microdata attributes. All
/// lookups are scoped to the recipe container; global itemprop searches pick
/// up site chrome (titles, author bios, ads).
pub struct MicroDataExtractor;

impl MicroDataExtractor {
    fn find_recipe_container<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let selector = Selector::parse("[itemscope]").expect("static selector");
        document.select(&selector).find(|element| {
            element
                .value()
                .attr("itemtype")
                .map(|t| {
                    t.contains("schema.org/Recipe") || t.contains("data-vocabulary.org/Recipe")
                })
                .unwrap_or(false)
        })
    }

    /// Read one itemprop value: `content`/`datetime` attributes win over
    /// element text (meta and time tags carry the value there).
    fn get_itemprop(&self, root: ElementRef, prop: &str) -> Option<String> {
        let selector = Selector::parse(&format!("[itemprop='{}']", prop)).ok()?;
        let element = root.select(&selector).next()?;
        let value = element
            .value()
            .attr("content")
            .or_else(|| element.value().attr("datetime"))
            .map(|v| v.to_string())
            .unwrap_or_else(|| element.text().collect::<Vec<_>>().join(" "));
        non_empty(decode_html_symbols(&value))
    }

    fn get_itemprop_list(&self, root: ElementRef, prop: &str) -> Vec<String> {
        let Ok(selector) = Selector::parse(&format!("[itemprop='{}']", prop)) else {
            return Vec::new();
        };
        root.select(&selector)
            .filter_map(|el| {
                let text = el.text().collect::<Vec<_>>().join(" ");
                non_empty(decode_html_symbols(&text))
            })
            .collect()
    }

    fn get_image(&self, root: ElementRef) -> Option<String> {
        let selector = Selector::parse("[itemprop='image']").ok()?;
        let element = root.select(&selector).next()?;
        let value = element
            .value()
            .attr("src")
            .or_else(|| element.value().attr("content"))
            .or_else(|| element.value().attr("href"))
            .map(|v| v.to_string())
            .unwrap_or_else(|| element.text().collect::<Vec<_>>().join(" "));
        non_empty(value)
    }
}

impl StructuredExtractor for MicroDataExtractor {
    fn name(&self) -> &'static str {
        "microdata"
    }

    fn parse(&self, context: &ParsingContext) -> Result<ExtractedRecipe, IngestError> {
        let Some(container) = self.find_recipe_container(&context.document) else {
            debug!("microdata: no Recipe container on page");
            return Err(IngestError::NotSupported);
        };

        let Some(title) = self.get_itemprop(container, "name") else {
            debug!("microdata: recipe container has no name");
            return Err(IngestError::NotSupported);
        };

        let mut ingredients = self.get_itemprop_list(container, "recipeIngredient");
        if ingredients.is_empty() {
            // legacy markup used the plural prop
            ingredients = self.get_itemprop_list(container, "ingredients");
        }

        let mut instructions = self.get_itemprop_list(container, "recipeInstructions");
        if instructions.is_empty() {
            instructions = self.get_itemprop_list(container, "instructions");
        }

        let (servings, yield_unit) = match self.get_itemprop(container, "recipeYield") {
            Some(text) => split_yield(&text),
            None => (None, "servings".to_string()),
        };

        let recipe = ExtractedRecipe {
            title,
            ingredients,
            instructions,
            prep_time: self
                .get_itemprop(container, "prepTime")
                .map(|t| humanize_duration(&t)),
            cook_time: self
                .get_itemprop(container, "cookTime")
                .map(|t| humanize_duration(&t)),
            servings,
            yield_unit,
            image_url: self.get_image(container),
            source_url: context.url.clone(),
        };

        if !recipe.is_usable() {
            debug!("microdata: container found but content is empty");
            return Err(IngestError::NotSupported);
        }

        Ok(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Result<ExtractedRecipe, IngestError> {
        let context = ParsingContext {
            url: "http://example.com/recipe".to_string(),
            document: Html::parse_document(html),
        };
        MicroDataExtractor.parse(&context)
    }

    #[test]
    fn test_scoped_extraction() {
        let html = r#"
            <html><body>
            <span itemprop="name">Site Title Outside Scope</span>
            <div itemscope itemtype="https://schema.org/Recipe">
                <h1 itemprop="name">Garlic Butter Shrimp</h1>
                <img itemprop="image" src="https://example.com/shrimp.jpg" />
                <time itemprop="prepTime" datetime="PT10M">10 mins</time>
                <time itemprop="cookTime" datetime="PT5M">5 mins</time>
                <span itemprop="recipeYield">2 servings</span>
                <li itemprop="recipeIngredient">1 lb shrimp</li>
                <li itemprop="recipeIngredient">4 tbsp butter</li>
                <li itemprop="recipeInstructions">Melt butter in a pan.</li>
                <li itemprop="recipeInstructions">Cook shrimp 2 minutes per side.</li>
            </div>
            </body></html>
        "#;

        let result = parse(html).unwrap();
        assert_eq!(result.title, "Garlic Butter Shrimp");
        assert_eq!(result.ingredients, vec!["1 lb shrimp", "4 tbsp butter"]);
        assert_eq!(result.instructions.len(), 2);
        assert_eq!(result.prep_time.as_deref(), Some("10 minutes"));
        assert_eq!(result.cook_time.as_deref(), Some("5 minutes"));
        assert_eq!(result.servings, Some(2));
        assert_eq!(result.image_url.as_deref(), Some("https://example.com/shrimp.jpg"));
    }

    #[test]
    fn test_legacy_ingredient_prop() {
        let html = r#"
            <div itemscope itemtype="http://data-vocabulary.org/Recipe">
                <span itemprop="name">Old Markup Scones</span>
                <span itemprop="ingredients">2 cups flour</span>
                <span itemprop="instructions">Bake until golden.</span>
            </div>
        "#;
        let result = parse(html).unwrap();
        assert_eq!(result.ingredients, vec!["2 cups flour"]);
        assert_eq!(result.instructions, vec!["Bake until golden."]);
    }

    #[test]
    fn test_no_container_declines() {
        let html = r#"<div><span itemprop="name">Not a recipe</span></div>"#;
        assert!(matches!(parse(html), Err(IngestError::NotSupported)));
    }

    #[test]
    fn test_container_without_content_declines() {
        let html = r#"
            <div itemscope itemtype="https://schema.org/Recipe">
                <span itemprop="name">Name Only</span>
            </div>
        "#;
        assert!(matches!(parse(html), Err(IngestError::NotSupported)));
    }

    #[test]
    fn test_meta_image_content_attr() {
        let html = r#"
            <div itemscope itemtype="https://schema.org/Recipe">
                <span itemprop="name">Pictured Pie</span>
                <meta itemprop="image" content="https://example.com/pie.png" />
                <li itemprop="recipeIngredient">apples</li>
                <li itemprop="recipeInstructions">Fill and bake.</li>
            </div>
        "#;
        let result = parse(html).unwrap();
        assert_eq!(result.image_url.as_deref(), Some("https://example.com/pie.png"));
    }
}
