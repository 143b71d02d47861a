//! The working recipe graph for one query, doubling as the cost memo table.

use std::collections::{BTreeMap, BTreeSet};

use super::entities::{Coins, ItemId, RecipeId};

/// Cheapest known way to craft one output batch of a recipe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Costing {
    pub cost: Coins,
    /// This recipe plus every nested producer chosen for its ingredients.
    pub contributing: BTreeSet<RecipeId>,
    /// Producer chosen for each crafted ingredient. Ingredients absent here are bought.
    pub choices: BTreeMap<ItemId, RecipeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Priced(Costing),
    /// Some ingredient could neither be bought nor crafted, or the recipe was
    /// reached again while its own cost was still being computed.
    Unavailable,
}

impl Resolution {
    pub fn costing(&self) -> Option<&Costing> {
        match self {
            Self::Priced(costing) => Some(costing),
            Self::Unavailable => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Memo {
    #[default]
    Pending,
    InProgress,
    Resolved(Resolution),
}

#[derive(Clone, Debug, Default)]
pub struct Candidate {
    pub memo: Memo,
    /// Recipes in this candidate set producing one of this recipe's ingredients.
    pub linked_producers: BTreeSet<RecipeId>,
}

impl Candidate {
    pub fn resolution(&self) -> Option<&Resolution> {
        match &self.memo {
            Memo::Resolved(resolution) => Some(resolution),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    entries: BTreeMap<RecipeId, Candidate>,
    /// Memo for producers reached through the full-producer fallback. Kept apart so
    /// they never widen the scope used for producer intersection.
    outside: BTreeMap<RecipeId, Memo>,
    /// Recipes found while looking for producers of ingredients (never reported).
    supporting: BTreeSet<RecipeId>,
}

impl CandidateSet {
    /// Returns true if the recipe was not a candidate yet.
    pub fn insert(&mut self, recipe: RecipeId) -> bool {
        if self.entries.contains_key(&recipe) {
            return false;
        }
        self.entries.insert(recipe, Candidate::default());
        true
    }

    pub fn contains(&self, recipe: RecipeId) -> bool {
        self.entries.contains_key(&recipe)
    }

    pub fn get(&self, recipe: RecipeId) -> Option<&Candidate> {
        self.entries.get(&recipe)
    }

    pub fn ids(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecipeId, &Candidate)> {
        self.entries.iter().map(|(id, candidate)| (*id, candidate))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn link_producer(&mut self, consumer: RecipeId, producer: RecipeId) {
        if let Some(candidate) = self.entries.get_mut(&consumer) {
            candidate.linked_producers.insert(producer);
        }
    }

    /// Candidate recipes already known to produce `item`, according to the links.
    pub fn linked_producers_of<'a>(
        &'a self,
        consumer: RecipeId,
        item: ItemId,
        output_of: impl Fn(RecipeId) -> Option<ItemId> + 'a,
    ) -> impl Iterator<Item = RecipeId> + 'a {
        self.entries
            .get(&consumer)
            .into_iter()
            .flat_map(|candidate| candidate.linked_producers.iter().copied())
            .filter(move |producer| output_of(*producer) == Some(item))
    }

    pub fn add_supporting(&mut self, recipe: RecipeId) -> bool {
        !self.entries.contains_key(&recipe) && self.supporting.insert(recipe)
    }

    pub fn supporting(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.supporting.iter().copied()
    }

    /// Every recipe reachable in this query, candidates first.
    pub fn all_recipes(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.ids().chain(self.supporting())
    }

    pub fn memo(&self, recipe: RecipeId) -> &Memo {
        static PENDING: Memo = Memo::Pending;
        self.entries
            .get(&recipe)
            .map(|candidate| &candidate.memo)
            .or_else(|| self.outside.get(&recipe))
            .unwrap_or(&PENDING)
    }

    pub fn set_memo(&mut self, recipe: RecipeId, memo: Memo) {
        match self.entries.get_mut(&recipe) {
            Some(candidate) => candidate.memo = memo,
            None => {
                self.outside.insert(recipe, memo);
            }
        }
    }

    pub fn resolution(&self, recipe: RecipeId) -> Option<&Resolution> {
        match self.memo(recipe) {
            Memo::Resolved(resolution) => Some(resolution),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_novelty() {
        let mut set = CandidateSet::default();
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn outside_memo_does_not_widen_scope() {
        let mut set = CandidateSet::default();
        set.insert(1);
        set.set_memo(2, Memo::Resolved(Resolution::Unavailable));
        assert!(!set.contains(2));
        assert_eq!(set.resolution(2), Some(&Resolution::Unavailable));
        assert_eq!(set.memo(1), &Memo::Pending);
    }

    #[test]
    fn candidates_are_not_supporting() {
        let mut set = CandidateSet::default();
        set.insert(1);
        assert!(!set.add_supporting(1));
        assert!(set.add_supporting(2));
        assert!(!set.add_supporting(2));
        assert_eq!(set.all_recipes().collect::<Vec<_>>(), vec![1, 2]);
    }
}
