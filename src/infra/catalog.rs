//! Read-only catalog of items, recipes and prices that the core queries.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CurrencyId, Item, ItemId, PriceQuote, Recipe, RecipeId};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("still rate limited on {endpoint} after {attempts} attempts")]
    RateLimited { endpoint: String, attempts: u32 },
    #[error("access denied on {0}: check that the API key is valid and has the needed permissions")]
    Unauthorized(String),
    #[error("upstream unavailable on {endpoint} (status {status})")]
    Unavailable { endpoint: String, status: u16 },
    #[error("api error: {0}")]
    Api(String),
}

/// Batched lookups against the game's catalog.
///
/// Batched methods accept any number of IDs; implementations split them to the
/// upstream per-request limit. IDs the catalog does not know are simply absent from
/// the result.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn recipes_consuming(&self, item: ItemId) -> Result<BTreeSet<RecipeId>, CatalogError>;

    /// Upstream accepts exactly one item per call.
    async fn recipes_producing(&self, item: ItemId) -> Result<BTreeSet<RecipeId>, CatalogError>;

    async fn recipe_definitions(&self, ids: &[RecipeId]) -> Result<Vec<Recipe>, CatalogError>;

    async fn item_metadata(&self, ids: &[ItemId]) -> Result<Vec<Item>, CatalogError>;

    async fn prices(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, PriceQuote>, CatalogError>;

    async fn currency_names(
        &self,
        ids: &[CurrencyId],
    ) -> Result<HashMap<CurrencyId, String>, CatalogError>;
}
