//! Cheapest crafting cost of every recipe in a candidate set.
//!
//! Each ingredient is either bought on the trading post or crafted with the cheapest
//! producing recipe, whichever costs less. Results are memoized in the candidate set,
//! so a recipe shared by many parents is costed once. A recipe reached again while its
//! own cost is still being computed counts as unavailable and the caller falls back
//! to the market price, which keeps cyclic recipe graphs finite.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use super::candidates::{CandidateSet, Costing, Memo, Resolution};
use super::entities::{Coins, IngredientKind, ItemId, PriceQuote, PricingMode, Recipe, RecipeId};
use super::knowledge::Knowledge;

pub type PriceTable = HashMap<ItemId, PriceQuote>;

/// How one ingredient line gets sourced.
struct Sourcing {
    cost: Coins,
    /// Producer used and its contributing set, `None` when bought.
    crafted: Option<(RecipeId, BTreeSet<RecipeId>)>,
}

pub struct CostEngine<'a> {
    excluded: ItemId,
    mode: PricingMode,
    prices: &'a PriceTable,
    knowledge: &'a Knowledge,
    computed: Cell<usize>,
}

impl<'a> CostEngine<'a> {
    /// `excluded` is the item being priced away: it costs nothing wherever it appears.
    pub fn new(
        excluded: ItemId,
        mode: PricingMode,
        prices: &'a PriceTable,
        knowledge: &'a Knowledge,
    ) -> Self {
        Self {
            excluded,
            mode,
            prices,
            knowledge,
            computed: Cell::new(0),
        }
    }

    /// Number of recipes whose cost was actually computed (memo misses).
    pub fn computations(&self) -> usize {
        self.computed.get()
    }

    pub fn resolve_all(&self, candidates: &mut CandidateSet) {
        let ids: Vec<RecipeId> = candidates.ids().collect();
        for id in ids {
            self.resolve(candidates, id);
        }
        debug!(
            candidates = candidates.len(),
            computed = self.computations(),
            "resolved candidate costs"
        );
    }

    /// Cost of one output batch of `recipe_id` and the recipes realising it.
    pub fn resolve(&self, candidates: &mut CandidateSet, recipe_id: RecipeId) -> Resolution {
        match candidates.memo(recipe_id) {
            Memo::Resolved(resolution) => return resolution.clone(),
            Memo::InProgress => {
                debug!(recipe = recipe_id, "recipe re-entered while being costed");
                return Resolution::Unavailable;
            }
            Memo::Pending => {}
        }

        let Some(recipe) = self.knowledge.recipe(recipe_id) else {
            warn!(recipe = recipe_id, "no definition for recipe; treating it as unavailable");
            candidates.set_memo(recipe_id, Memo::Resolved(Resolution::Unavailable));
            return Resolution::Unavailable;
        };

        candidates.set_memo(recipe_id, Memo::InProgress);
        self.computed.set(self.computed.get() + 1);
        let resolution = self.compute(candidates, recipe);
        candidates.set_memo(recipe_id, Memo::Resolved(resolution.clone()));
        resolution
    }

    fn compute(&self, candidates: &mut CandidateSet, recipe: &Recipe) -> Resolution {
        let mut total: Coins = 0;
        let mut contributing = BTreeSet::from([recipe.id]);
        let mut choices = BTreeMap::new();

        for ingredient in &recipe.ingredients {
            match &ingredient.kind {
                IngredientKind::Item => {}
                IngredientKind::Currency | IngredientKind::GuildUpgrade => continue,
                IngredientKind::Other(kind) => {
                    warn!(recipe = recipe.id, kind = %kind, "unrecognised ingredient kind counted as free");
                    continue;
                }
            }
            if ingredient.id == self.excluded || ingredient.id == recipe.output_item_id {
                continue;
            }

            let Some(sourcing) = self.source(candidates, recipe.id, ingredient.id, ingredient.count)
            else {
                debug!(
                    recipe = recipe.id,
                    item = ingredient.id,
                    "ingredient can neither be bought nor crafted"
                );
                return Resolution::Unavailable;
            };

            total = total.saturating_add(sourcing.cost);
            if let Some((producer, crafted)) = sourcing.crafted {
                choices.insert(ingredient.id, producer);
                contributing.extend(crafted);
            }
        }

        Resolution::Priced(Costing {
            cost: total,
            contributing,
            choices,
        })
    }

    fn source(
        &self,
        candidates: &mut CandidateSet,
        consumer: RecipeId,
        item: ItemId,
        quantity: u32,
    ) -> Option<Sourcing> {
        let mut best = self
            .prices
            .get(&item)
            .and_then(|quote| self.mode.unit_cost(quote))
            .map(|unit| Sourcing {
                cost: unit.saturating_mul(u64::from(quantity)),
                crafted: None,
            });

        for producer in self.producer_candidates(candidates, consumer, item) {
            let Resolution::Priced(costing) = self.resolve(candidates, producer) else {
                continue;
            };
            let Some(recipe) = self.knowledge.recipe(producer) else {
                continue;
            };
            // Whole batches only.
            let batches = quantity.max(1).div_ceil(recipe.batch_size());
            let scaled = costing.cost.saturating_mul(u64::from(batches));
            if best.as_ref().map_or(true, |current| scaled < current.cost) {
                best = Some(Sourcing {
                    cost: scaled,
                    crafted: Some((producer, costing.contributing)),
                });
            }
        }

        best
    }

    /// Known producers of `item`, restricted to the candidate set when any of them is in it.
    fn producer_candidates(
        &self,
        candidates: &CandidateSet,
        consumer: RecipeId,
        item: ItemId,
    ) -> Vec<RecipeId> {
        let knowledge = self.knowledge;
        let mut known: BTreeSet<RecipeId> = knowledge.producers(item).iter().copied().collect();
        known.extend(candidates.linked_producers_of(consumer, item, |p| {
            knowledge.recipe(p).map(|r| r.output_item_id)
        }));

        let in_scope: Vec<RecipeId> = known
            .iter()
            .copied()
            .filter(|id| candidates.contains(*id))
            .collect();
        if in_scope.is_empty() {
            known.into_iter().collect()
        } else {
            in_scope
        }
    }
}
