//! In-memory catalog and recipe builders shared by unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{CurrencyId, Ingredient, Item, ItemId, PriceQuote, Recipe, RecipeId};
use crate::infra::catalog::{Catalog, CatalogError};

pub fn recipe(id: RecipeId, output: ItemId, output_count: u32, ingredients: Vec<Ingredient>) -> Recipe {
    Recipe {
        id,
        ingredients,
        output_item_id: output,
        output_count,
        disciplines: vec!["Artificer".to_string()],
        min_rating: 400,
    }
}

#[derive(Debug, Default)]
pub struct CallLog {
    pub consuming: Vec<ItemId>,
    pub producing: Vec<ItemId>,
    pub definitions: Vec<Vec<RecipeId>>,
    pub items: Vec<Vec<ItemId>>,
    pub prices: Vec<Vec<ItemId>>,
}

/// Catalog answering from a fixed recipe list and recording every call.
#[derive(Default)]
pub struct FakeCatalog {
    pub recipes: BTreeMap<RecipeId, Recipe>,
    pub items: BTreeMap<ItemId, Item>,
    pub prices: HashMap<ItemId, PriceQuote>,
    pub currencies: HashMap<CurrencyId, String>,
    pub calls: Mutex<CallLog>,
}

impl FakeCatalog {
    pub fn with_recipes(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        Self {
            recipes: recipes.into_iter().map(|r| (r.id, r)).collect(),
            ..Self::default()
        }
    }

    pub fn consuming_calls(&self, item: ItemId) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.consuming.iter().filter(|id| **id == item).count()
    }

    pub fn producing_calls(&self) -> Vec<ItemId> {
        self.calls.lock().unwrap().producing.clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn recipes_consuming(&self, item: ItemId) -> Result<BTreeSet<RecipeId>, CatalogError> {
        self.calls.lock().unwrap().consuming.push(item);
        Ok(self
            .recipes
            .values()
            .filter(|r| r.ingredients.iter().any(|i| i.is_item() && i.id == item))
            .map(|r| r.id)
            .collect())
    }

    async fn recipes_producing(&self, item: ItemId) -> Result<BTreeSet<RecipeId>, CatalogError> {
        self.calls.lock().unwrap().producing.push(item);
        Ok(self
            .recipes
            .values()
            .filter(|r| r.output_item_id == item)
            .map(|r| r.id)
            .collect())
    }

    async fn recipe_definitions(&self, ids: &[RecipeId]) -> Result<Vec<Recipe>, CatalogError> {
        self.calls.lock().unwrap().definitions.push(ids.to_vec());
        Ok(ids.iter().filter_map(|id| self.recipes.get(id).cloned()).collect())
    }

    async fn item_metadata(&self, ids: &[ItemId]) -> Result<Vec<Item>, CatalogError> {
        self.calls.lock().unwrap().items.push(ids.to_vec());
        Ok(ids.iter().filter_map(|id| self.items.get(id).cloned()).collect())
    }

    async fn prices(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, PriceQuote>, CatalogError> {
        self.calls.lock().unwrap().prices.push(ids.to_vec());
        Ok(ids
            .iter()
            .filter_map(|id| self.prices.get(id).map(|quote| (*id, *quote)))
            .collect())
    }

    async fn currency_names(
        &self,
        ids: &[CurrencyId],
    ) -> Result<HashMap<CurrencyId, String>, CatalogError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.currencies.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}
