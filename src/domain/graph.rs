//! Recipe graph expansion around a seed item.
//!
//! - Upward: every recipe consuming the seed, then every recipe consuming those
//!   recipes' outputs, until a round finds nothing new. These are the candidates.
//! - Linking: inside the candidate set, note which candidates produce another
//!   candidate's ingredients.
//! - Downward: for ingredients no candidate produces, look up their producers so the
//!   cost engine can consider crafting them.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::candidates::CandidateSet;
use super::entities::{ItemId, RecipeId};
use super::knowledge::Knowledge;
use crate::infra::catalog::{Catalog, CatalogError};

pub struct GraphBuilder<'a, C: ?Sized> {
    catalog: &'a C,
}

impl<'a, C> GraphBuilder<'a, C>
where
    C: Catalog + ?Sized,
{
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Build the candidate set for `seed`, recording every recipe and index entry
    /// learned along the way in `knowledge`.
    pub async fn expand(
        &self,
        seed: ItemId,
        knowledge: &mut Knowledge,
    ) -> Result<CandidateSet, CatalogError> {
        let mut candidates = CandidateSet::default();
        self.expand_consumers(seed, knowledge, &mut candidates)
            .await?;

        if candidates.is_empty() {
            info!(seed, "no recipe consumes this item");
            return Ok(candidates);
        }

        link_producers(&mut candidates, knowledge);
        self.discover_producers(seed, knowledge, &mut candidates)
            .await?;

        info!(
            seed,
            candidates = candidates.len(),
            supporting = candidates.supporting().count(),
            "recipe graph expanded"
        );
        Ok(candidates)
    }

    async fn expand_consumers(
        &self,
        seed: ItemId,
        knowledge: &mut Knowledge,
        candidates: &mut CandidateSet,
    ) -> Result<(), CatalogError> {
        let mut frontier: BTreeSet<ItemId> = BTreeSet::from([seed]);
        let mut round = 0_u32;

        while !frontier.is_empty() {
            round += 1;
            let mut discovered = Vec::new();

            for item in std::mem::take(&mut frontier) {
                let consumers = match knowledge.consumers(item).recipes() {
                    Some(known) => known,
                    None => {
                        let found = self.catalog.recipes_consuming(item).await?;
                        debug!(item, found = found.len(), "looked up consuming recipes");
                        knowledge.set_consumers(item, found.clone());
                        found
                    }
                };
                discovered.extend(consumers.into_iter().filter(|id| candidates.insert(*id)));
            }

            self.ensure_recipes(&discovered, knowledge).await?;
            frontier = discovered
                .iter()
                .filter_map(|id| knowledge.recipe(*id))
                .map(|recipe| recipe.output_item_id)
                .collect();

            debug!(round, new_recipes = discovered.len(), "consumer round done");
        }

        Ok(())
    }

    async fn discover_producers(
        &self,
        seed: ItemId,
        knowledge: &mut Knowledge,
        candidates: &mut CandidateSet,
    ) -> Result<(), CatalogError> {
        let mut queue: Vec<RecipeId> = candidates.ids().collect();

        while !queue.is_empty() {
            let mut unlinked = BTreeSet::new();
            for recipe_id in std::mem::take(&mut queue) {
                let Some(recipe) = knowledge.recipe(recipe_id) else {
                    continue;
                };
                for ingredient in recipe.item_ingredients() {
                    // The seed is priced away, so its producers never matter.
                    if ingredient.id == seed {
                        continue;
                    }
                    let linked = candidates
                        .linked_producers_of(recipe_id, ingredient.id, |p| {
                            knowledge.recipe(p).map(|r| r.output_item_id)
                        })
                        .next()
                        .is_some();
                    if !linked {
                        unlinked.insert(ingredient.id);
                    }
                }
            }

            let mut fresh = Vec::new();
            for item in unlinked {
                let producers = match knowledge.producers(item).recipes() {
                    Some(known) => known,
                    None => {
                        let found = self.catalog.recipes_producing(item).await?;
                        debug!(item, found = found.len(), "looked up producing recipes");
                        knowledge.set_producers(item, found.clone());
                        found
                    }
                };
                fresh.extend(
                    producers
                        .into_iter()
                        .filter(|id| candidates.add_supporting(*id)),
                );
            }

            self.ensure_recipes(&fresh, knowledge).await?;
            queue = fresh;
        }

        Ok(())
    }

    /// Fetch definitions for recipes missing from the recipe table.
    async fn ensure_recipes(
        &self,
        ids: &[RecipeId],
        knowledge: &mut Knowledge,
    ) -> Result<(), CatalogError> {
        let missing: Vec<RecipeId> = ids
            .iter()
            .copied()
            .filter(|id| knowledge.recipe(*id).is_none())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let fetched = self.catalog.recipe_definitions(&missing).await?;
        debug!(requested = missing.len(), fetched = fetched.len(), "fetched recipe definitions");
        for recipe in fetched {
            knowledge.learn_recipe(recipe);
        }
        for id in missing.iter().filter(|id| knowledge.recipe(**id).is_none()) {
            warn!(recipe = id, "catalog has no definition for recipe; skipping it");
        }
        Ok(())
    }
}

/// For every candidate ingredient, record which candidates produce it.
pub fn link_producers(candidates: &mut CandidateSet, knowledge: &Knowledge) {
    let outputs: Vec<(RecipeId, ItemId)> = candidates
        .ids()
        .filter_map(|id| knowledge.recipe(id).map(|r| (id, r.output_item_id)))
        .collect();

    let mut links = Vec::new();
    for (consumer, _) in &outputs {
        let Some(recipe) = knowledge.recipe(*consumer) else {
            continue;
        };
        for ingredient in recipe.item_ingredients() {
            links.extend(
                outputs
                    .iter()
                    .filter(|(_, output)| *output == ingredient.id)
                    .map(|(producer, _)| (*consumer, *producer)),
            );
        }
    }

    for (consumer, producer) in links {
        candidates.link_producer(consumer, producer);
    }
}

/// Every item the query needs a price or a name for: outputs and item ingredients.
pub fn referenced_items(candidates: &CandidateSet, knowledge: &Knowledge) -> BTreeSet<ItemId> {
    candidates
        .all_recipes()
        .filter_map(|id| knowledge.recipe(id))
        .flat_map(|recipe| {
            std::iter::once(recipe.output_item_id)
                .chain(recipe.ingredients.iter().filter(|i| i.is_item()).map(|i| i.id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::index::Lookup;
    use crate::domain::Ingredient;
    use crate::test_support::{recipe, FakeCatalog};

    const SEED: ItemId = 100;

    #[tokio::test]
    async fn item_without_consumers_yields_empty_set() {
        let catalog = FakeCatalog::with_recipes([recipe(1, 5, 1, vec![Ingredient::item(7, 1)])]);
        let mut knowledge = Knowledge::default();

        let candidates = GraphBuilder::new(&catalog)
            .expand(SEED, &mut knowledge)
            .await
            .unwrap();

        assert!(candidates.is_empty());
        assert_eq!(knowledge.consumers(SEED), &Lookup::Empty);
    }

    #[tokio::test]
    async fn expands_transitively_through_outputs() {
        let catalog = FakeCatalog::with_recipes([
            recipe(1, 200, 1, vec![Ingredient::item(SEED, 3)]),
            recipe(2, 300, 1, vec![Ingredient::item(200, 1), Ingredient::item(50, 2)]),
            recipe(3, 400, 1, vec![Ingredient::item(50, 1)]),
        ]);
        let mut knowledge = Knowledge::default();

        let candidates = GraphBuilder::new(&catalog)
            .expand(SEED, &mut knowledge)
            .await
            .unwrap();

        assert_eq!(candidates.ids().collect::<Vec<_>>(), vec![1, 2]);
        assert!(knowledge.recipe(2).is_some());
        // 2 consumes 1's output, so the link is recorded.
        assert!(candidates.get(2).unwrap().linked_producers.contains(&1));
    }

    #[tokio::test]
    async fn cycle_is_added_once() {
        // 100 -> 200 -> 100 again at another tier.
        let catalog = FakeCatalog::with_recipes([
            recipe(1, 200, 1, vec![Ingredient::item(SEED, 10)]),
            recipe(2, SEED, 5, vec![Ingredient::item(200, 1)]),
        ]);
        let mut knowledge = Knowledge::default();

        let candidates = GraphBuilder::new(&catalog)
            .expand(SEED, &mut knowledge)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(catalog.consuming_calls(SEED), 1);
        assert_eq!(catalog.consuming_calls(200), 1);
    }

    #[tokio::test]
    async fn known_empty_entries_are_not_requeried() {
        let catalog = FakeCatalog::with_recipes([recipe(1, 200, 1, vec![Ingredient::item(SEED, 1)])]);
        let mut knowledge = Knowledge::default();
        let builder = GraphBuilder::new(&catalog);

        builder.expand(SEED, &mut knowledge).await.unwrap();
        assert_eq!(knowledge.consumers(200), &Lookup::Empty);

        builder.expand(SEED, &mut knowledge).await.unwrap();
        builder.expand(200, &mut knowledge).await.unwrap();
        assert_eq!(catalog.consuming_calls(SEED), 1);
        assert_eq!(catalog.consuming_calls(200), 1);
        assert_eq!(catalog.calls.lock().unwrap().definitions.len(), 1);
    }

    #[tokio::test]
    async fn finds_producers_for_unlinked_ingredients_only() {
        let catalog = FakeCatalog::with_recipes([
            recipe(1, 200, 1, vec![Ingredient::item(SEED, 1), Ingredient::item(60, 2)]),
            recipe(2, 300, 1, vec![Ingredient::item(200, 1), Ingredient::currency(1, 5)]),
            recipe(7, 60, 3, vec![Ingredient::item(61, 4)]),
            recipe(8, 61, 1, vec![Ingredient::item(62, 1)]),
            recipe(9, SEED, 1, vec![Ingredient::item(63, 1)]),
        ]);
        let mut knowledge = Knowledge::default();

        let candidates = GraphBuilder::new(&catalog)
            .expand(SEED, &mut knowledge)
            .await
            .unwrap();

        assert_eq!(candidates.ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(candidates.supporting().collect::<Vec<_>>(), vec![7, 8]);
        // 200 is linked to recipe 1 and the seed is never looked up.
        let producing = catalog.producing_calls();
        assert_eq!(producing, vec![60, 61, 62]);
        assert_eq!(knowledge.producers(62), &Lookup::Empty);
        assert!(knowledge.producers(200).is_unknown());
    }

    #[tokio::test]
    async fn referenced_items_cover_outputs_and_item_ingredients() {
        let catalog = FakeCatalog::with_recipes([recipe(
            1,
            200,
            1,
            vec![Ingredient::item(SEED, 1), Ingredient::currency(2, 10)],
        )]);
        let mut knowledge = Knowledge::default();
        let candidates = GraphBuilder::new(&catalog)
            .expand(SEED, &mut knowledge)
            .await
            .unwrap();

        let items = referenced_items(&candidates, &knowledge);
        assert_eq!(items.into_iter().collect::<Vec<_>>(), vec![SEED, 200]);
    }
}
