use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::IngestError;
use crate::model::{ExtractedRecipe, RecipeId, StoredRecipe};

/// Fields an update may change. Anything left `None` keeps its stored value.
#[derive(Debug, Clone, Default)]
pub struct RecipeUpdate {
    /// Replace the recipe content wholesale.
    pub recipe: Option<ExtractedRecipe>,
    /// Point the record at a finalized image path.
    pub image_path: Option<String>,
    /// `Some(Some(_))` sets the cached instruction template, `Some(None)`
    /// clears it so the backfill task derives it again.
    pub instruction_template: Option<Option<Vec<String>>>,
}

/// Persistence boundary for recipes. The pipeline only ever needs these four
/// operations; a real database backend implements this trait elsewhere.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn create_recipe(&self, recipe: &ExtractedRecipe) -> Result<RecipeId, IngestError>;

    async fn get_recipe(&self, id: RecipeId) -> Result<Option<StoredRecipe>, IngestError>;

    async fn get_recipe_by_source_url(
        &self,
        url: &str,
    ) -> Result<Option<StoredRecipe>, IngestError>;

    async fn update_recipe(&self, id: RecipeId, update: RecipeUpdate) -> Result<(), IngestError>;
}

/// Keyword-based allergen screening over ingredient text. Consumed by
/// meal-planning callers; no implementation ships with this crate.
pub trait AllergenDetector: Send + Sync {
    fn contains_allergen(&self, ingredient_text: &str, keywords: &[String]) -> bool;
}

/// In-memory store backing the CLI and the tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: RecipeId,
    recipes: HashMap<RecipeId, StoredRecipe>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn create_recipe(&self, recipe: &ExtractedRecipe) -> Result<RecipeId, IngestError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.recipes.insert(
            id,
            StoredRecipe {
                id,
                recipe: recipe.clone(),
                instruction_template: None,
            },
        );
        Ok(id)
    }

    async fn get_recipe(&self, id: RecipeId) -> Result<Option<StoredRecipe>, IngestError> {
        Ok(self.inner.lock().await.recipes.get(&id).cloned())
    }

    async fn get_recipe_by_source_url(
        &self,
        url: &str,
    ) -> Result<Option<StoredRecipe>, IngestError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .recipes
            .values()
            .find(|stored| stored.recipe.source_url == url)
            .cloned())
    }

    async fn update_recipe(&self, id: RecipeId, update: RecipeUpdate) -> Result<(), IngestError> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .recipes
            .get_mut(&id)
            .ok_or_else(|| IngestError::Store(format!("recipe {} not found", id)))?;

        if let Some(recipe) = update.recipe {
            stored.recipe = recipe;
        }
        if let Some(path) = update.image_path {
            stored.recipe.image_url = Some(path);
        }
        if let Some(template) = update.instruction_template {
            stored.instruction_template = template;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_recipe(source_url: &str) -> ExtractedRecipe {
        ExtractedRecipe {
            title: "Garlic Noodles".to_string(),
            ingredients: vec!["200g noodles".to_string(), "4 cloves garlic".to_string()],
            instructions: vec!["Boil noodles.".to_string(), "Fry garlic.".to_string()],
            source_url: source_url.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let first = store
            .create_recipe(&sample_recipe("https://example.com/a"))
            .await
            .unwrap();
        let second = store
            .create_recipe(&sample_recipe("https://example.com/b"))
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let stored = store.get_recipe(first).await.unwrap().unwrap();
        assert_eq!(stored.recipe.title, "Garlic Noodles");
        assert!(stored.instruction_template.is_none());
    }

    #[tokio::test]
    async fn test_lookup_by_source_url() {
        let store = MemoryStore::new();
        store
            .create_recipe(&sample_recipe("https://example.com/noodles"))
            .await
            .unwrap();

        let found = store
            .get_recipe_by_source_url("https://example.com/noodles")
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = store
            .get_recipe_by_source_url("https://example.com/other")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_content_and_clears_template() {
        let store = MemoryStore::new();
        let id = store
            .create_recipe(&sample_recipe("https://example.com/a"))
            .await
            .unwrap();
        store
            .update_recipe(
                id,
                RecipeUpdate {
                    instruction_template: Some(Some(vec!["Boil [[qty:200]]g.".to_string()])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut replacement = sample_recipe("https://example.com/a");
        replacement.title = "Better Garlic Noodles".to_string();
        store
            .update_recipe(
                id,
                RecipeUpdate {
                    recipe: Some(replacement),
                    instruction_template: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = store.get_recipe(id).await.unwrap().unwrap();
        assert_eq!(stored.recipe.title, "Better Garlic Noodles");
        assert!(stored.instruction_template.is_none());
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields_alone() {
        let store = MemoryStore::new();
        let id = store
            .create_recipe(&sample_recipe("https://example.com/a"))
            .await
            .unwrap();

        store
            .update_recipe(
                id,
                RecipeUpdate {
                    image_path: Some("images/recipes/abc.jpg".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = store.get_recipe(id).await.unwrap().unwrap();
        assert_eq!(
            stored.recipe.image_url.as_deref(),
            Some("images/recipes/abc.jpg")
        );
        assert_eq!(stored.recipe.title, "Garlic Noodles");
        assert_eq!(stored.recipe.ingredients.len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_id_errors() {
        let store = MemoryStore::new();
        let err = store
            .update_recipe(42, RecipeUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));
    }
}
