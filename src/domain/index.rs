//! Item → recipe index.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::entities::RecipeId;

/// Result of asking the catalog for the recipes linked to an item in one direction.
///
/// `Unknown` means the question was never asked; `Empty` means it was asked and the
/// answer was "none". The two must never be confused: only `Unknown` triggers a query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "recipes", rename_all = "snake_case")]
pub enum Lookup {
    #[default]
    Unknown,
    Empty,
    Known(BTreeSet<RecipeId>),
}

impl Lookup {
    pub fn from_set(recipes: BTreeSet<RecipeId>) -> Self {
        if recipes.is_empty() {
            Self::Empty
        } else {
            Self::Known(recipes)
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The recipes, if the lookup has been answered.
    pub fn recipes(&self) -> Option<BTreeSet<RecipeId>> {
        match self {
            Self::Unknown => None,
            Self::Empty => Some(BTreeSet::new()),
            Self::Known(set) => Some(set.clone()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecipeId> {
        let set = match self {
            Self::Known(set) => Some(set),
            _ => None,
        };
        set.into_iter().flatten()
    }
}

/// Recipes consuming and producing one item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLinks {
    #[serde(default)]
    pub consumers: Lookup,
    #[serde(default)]
    pub producers: Lookup,
}
