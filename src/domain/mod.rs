//! Recipe graph and crafting cost logic lives here.

pub mod candidates;
pub mod cost;
pub mod entities;
pub mod graph;
pub mod index;
pub mod knowledge;

pub use candidates::{CandidateSet, Resolution};
pub use cost::{CostEngine, PriceTable};
pub use entities::{
    Coins, CurrencyId, Ingredient, IngredientKind, Item, ItemId, PriceQuote, PricingMode, Recipe,
    RecipeId,
};
pub use graph::{referenced_items, GraphBuilder};
pub use knowledge::Knowledge;
