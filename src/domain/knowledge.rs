//! Everything learned about items and recipes so far, owned by the app and persisted by the store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::entities::{Item, ItemId, Recipe, RecipeId};
use super::index::{ItemLinks, Lookup};

static UNKNOWN: Lookup = Lookup::Unknown;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    #[serde(default)]
    pub items: BTreeMap<ItemId, Item>,
    #[serde(default)]
    pub recipes: BTreeMap<RecipeId, Recipe>,
    #[serde(default)]
    pub index: BTreeMap<ItemId, ItemLinks>,
}

impl Knowledge {
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(&id)
    }

    /// Insert a new item or fill in the unknown fields of an existing one.
    pub fn learn_item(&mut self, item: Item) {
        match self.items.get_mut(&item.id) {
            Some(existing) => existing.merge(item),
            None => {
                self.items.insert(item.id, item);
            }
        }
    }

    pub fn learn_recipe(&mut self, recipe: Recipe) {
        self.recipes.entry(recipe.id).or_insert(recipe);
    }

    pub fn consumers(&self, item: ItemId) -> &Lookup {
        self.links(item).map(|l| &l.consumers).unwrap_or(&UNKNOWN)
    }

    pub fn producers(&self, item: ItemId) -> &Lookup {
        self.links(item).map(|l| &l.producers).unwrap_or(&UNKNOWN)
    }

    pub fn set_consumers(&mut self, item: ItemId, recipes: BTreeSet<RecipeId>) {
        self.index.entry(item).or_default().consumers = Lookup::from_set(recipes);
    }

    pub fn set_producers(&mut self, item: ItemId, recipes: BTreeSet<RecipeId>) {
        self.index.entry(item).or_default().producers = Lookup::from_set(recipes);
    }

    /// Exact-name lookup, as typed in game.
    pub fn find_item_by_name(&self, name: &str) -> Option<ItemId> {
        self.items
            .values()
            .find(|item| item.name.as_deref() == Some(name))
            .map(|item| item.id)
    }

    /// Forget recipes and the index while keeping item metadata.
    pub fn clear_recipes(&mut self) {
        self.recipes.clear();
        self.index.clear();
    }

    fn links(&self, item: ItemId) -> Option<&ItemLinks> {
        self.index.get(&item)
    }
}
