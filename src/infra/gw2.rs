//! Thin asynchronous client for the Guild Wars 2 API v2.
//!
//! - Implements [`Catalog`] for recipes, items, trading post prices and currencies.
//! - Splits `?ids=` lookups into batches of at most 200 IDs.
//! - Retries the same request after a short pause when rate limited or when the
//!   upstream briefly fails; anything else is surfaced to the caller.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{CurrencyId, Ingredient, IngredientKind, Item, ItemId, PriceQuote, Recipe, RecipeId};
use crate::infra::catalog::{Catalog, CatalogError};
use crate::util::batch::{batches, join_ids};
use crate::util::version::user_agent;

pub const DEFAULT_BASE_URL: &str = "https://api.guildwars2.com/v2/";
pub const DEFAULT_NAMES_URL: &str = "https://api.gw2tp.com/1/bulk/items-names.json";

/// Flags that keep an item off the trading post.
const BOUND_FLAGS: [&str; 2] = ["AccountBound", "SoulbindOnAcquire"];

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub retry_backoff: Duration,
    pub max_retries: u32,
    pub batch_size: usize,
}

#[derive(Clone)]
pub struct Gw2Client {
    http: Client,
    base_url: Url,
    options: ClientOptions,
    currencies: Arc<Mutex<HashMap<CurrencyId, String>>>,
}

impl Gw2Client {
    pub fn with_base_url(base: &str, options: ClientOptions) -> Result<Self, CatalogError> {
        let base_url = Url::parse(base)?;
        let http = Client::builder()
            .user_agent(user_agent())
            .timeout(options.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            options,
            currencies: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Bulk `[id, name]` list of every item, used to resolve names typed at the prompt.
    pub async fn item_names(&self, names_url: &str) -> Result<Vec<(ItemId, String)>, CatalogError> {
        let url = Url::parse(names_url)?;
        let names: Option<ItemNamesDto> = self.fetch_json(url, None).await?;
        Ok(names.map(|dto| dto.items).unwrap_or_default())
    }

    /// Skins unlocked on the account owning `api_key` (needs the `unlocks` permission).
    pub async fn unlocked_skins(&self, api_key: &str) -> Result<BTreeSet<u32>, CatalogError> {
        let url = self.url("account/skins")?;
        let skins: Option<BTreeSet<u32>> = self.fetch_json(url, Some(api_key)).await?;
        Ok(skins.unwrap_or_default())
    }

    async fn search_recipes(&self, key: &str, item: ItemId) -> Result<BTreeSet<RecipeId>, CatalogError> {
        let mut url = self.url("recipes/search")?;
        url.query_pairs_mut().append_pair(key, &item.to_string());
        let ids: Option<BTreeSet<RecipeId>> = self.fetch_json(url, None).await?;
        Ok(ids.unwrap_or_default())
    }

    async fn fetch_batched<T>(&self, path: &str, ids: &[u32]) -> Result<Vec<T>, CatalogError>
    where
        T: DeserializeOwned,
    {
        let mut out = Vec::with_capacity(ids.len());
        for batch in batches(ids, self.options.batch_size) {
            let mut url = self.url(path)?;
            url.query_pairs_mut().append_pair("ids", &join_ids(&batch));
            let page: Option<Vec<T>> = self.fetch_json(url, None).await?;
            match page {
                Some(entries) => out.extend(entries),
                None => debug!(path, requested = batch.len(), "no valid ids in batch"),
            }
        }
        Ok(out)
    }

    /// GET and decode JSON. `Ok(None)` means the upstream answered 404: nothing known
    /// for this request.
    async fn fetch_json<T>(&self, url: Url, token: Option<&str>) -> Result<Option<T>, CatalogError>
    where
        T: DeserializeOwned,
    {
        match self.send(url, token).await? {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }

    async fn send(&self, url: Url, token: Option<&str>) -> Result<Option<Response>, CatalogError> {
        let endpoint = url.path().to_string();
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            let mut request = self.http.get(url.clone());
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(Some(response));
            }

            match status {
                StatusCode::NOT_FOUND => return Ok(None),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(CatalogError::Unauthorized(endpoint))
                }
                _ if is_transient(status) && attempt <= self.options.max_retries => {
                    warn!(
                        endpoint = %endpoint,
                        status = status.as_u16(),
                        attempt,
                        "request throttled or failed; retrying after {:?}",
                        self.options.retry_backoff
                    );
                    tokio::time::sleep(self.options.retry_backoff).await;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    return Err(CatalogError::RateLimited {
                        endpoint,
                        attempts: attempt,
                    })
                }
                _ => {
                    return Err(CatalogError::Unavailable {
                        endpoint,
                        status: status.as_u16(),
                    })
                }
            }
        }
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[async_trait]
impl Catalog for Gw2Client {
    async fn recipes_consuming(&self, item: ItemId) -> Result<BTreeSet<RecipeId>, CatalogError> {
        self.search_recipes("input", item).await
    }

    async fn recipes_producing(&self, item: ItemId) -> Result<BTreeSet<RecipeId>, CatalogError> {
        self.search_recipes("output", item).await
    }

    async fn recipe_definitions(&self, ids: &[RecipeId]) -> Result<Vec<Recipe>, CatalogError> {
        let dtos: Vec<RecipeDto> = self.fetch_batched("recipes", ids).await?;
        Ok(dtos.into_iter().map(Recipe::from).collect())
    }

    async fn item_metadata(&self, ids: &[ItemId]) -> Result<Vec<Item>, CatalogError> {
        let dtos: Vec<ItemDto> = self.fetch_batched("items", ids).await?;
        Ok(dtos.into_iter().map(Item::from).collect())
    }

    async fn prices(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, PriceQuote>, CatalogError> {
        let dtos: Vec<PriceDto> = self.fetch_batched("commerce/prices", ids).await?;
        Ok(dtos
            .into_iter()
            .map(|dto| {
                (
                    dto.id,
                    PriceQuote {
                        buy: dto.buys.price(),
                        sell: dto.sells.price(),
                    },
                )
            })
            .collect())
    }

    async fn currency_names(
        &self,
        ids: &[CurrencyId],
    ) -> Result<HashMap<CurrencyId, String>, CatalogError> {
        let missing: Vec<CurrencyId> = {
            let cache = self.currencies.lock().await;
            ids.iter().copied().filter(|id| !cache.contains_key(id)).collect()
        };
        if !missing.is_empty() {
            let dtos: Vec<CurrencyDto> = self.fetch_batched("currencies", &missing).await?;
            let mut cache = self.currencies.lock().await;
            cache.extend(dtos.into_iter().map(|dto| (dto.id, dto.name)));
        }

        let cache = self.currencies.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| cache.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ItemNamesDto {
    items: Vec<(ItemId, String)>,
}

#[derive(Debug, Deserialize)]
struct RecipeDto {
    id: RecipeId,
    output_item_id: ItemId,
    #[serde(default = "one")]
    output_item_count: u32,
    #[serde(default)]
    disciplines: Vec<String>,
    #[serde(default)]
    min_rating: u32,
    #[serde(default)]
    ingredients: Vec<IngredientDto>,
    #[serde(default)]
    guild_ingredients: Vec<GuildIngredientDto>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct IngredientDto {
    #[serde(rename = "type", default = "item_kind")]
    kind: String,
    #[serde(alias = "item_id")]
    id: u32,
    count: u32,
}

fn item_kind() -> String {
    "Item".to_string()
}

#[derive(Debug, Deserialize)]
struct GuildIngredientDto {
    upgrade_id: u32,
    count: u32,
}

impl From<RecipeDto> for Recipe {
    fn from(dto: RecipeDto) -> Self {
        let mut ingredients: Vec<Ingredient> = dto
            .ingredients
            .into_iter()
            .map(|i| Ingredient {
                id: i.id,
                count: i.count,
                kind: IngredientKind::from(i.kind),
            })
            .collect();
        ingredients.extend(dto.guild_ingredients.into_iter().map(|g| Ingredient {
            id: g.upgrade_id,
            count: g.count,
            kind: IngredientKind::GuildUpgrade,
        }));

        Self {
            id: dto.id,
            ingredients,
            output_item_id: dto.output_item_id,
            output_count: dto.output_item_count.max(1),
            disciplines: dto.disciplines,
            min_rating: dto.min_rating,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ItemDto {
    id: ItemId,
    name: String,
    #[serde(default)]
    vendor_value: u64,
    #[serde(default)]
    default_skin: Option<u32>,
    #[serde(default)]
    flags: Vec<String>,
}

impl From<ItemDto> for Item {
    fn from(dto: ItemDto) -> Self {
        let has_flag = |flag: &str| dto.flags.iter().any(|f| f == flag);
        let tradable = !BOUND_FLAGS.iter().any(|flag| has_flag(flag));
        let vendor_value = if has_flag("NoSell") || dto.vendor_value == 0 {
            None
        } else {
            Some(dto.vendor_value)
        };
        Self {
            id: dto.id,
            name: Some(dto.name),
            vendor_value,
            tradable: Some(tradable),
            default_skin: dto.default_skin,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceDto {
    id: ItemId,
    buys: ListingDto,
    sells: ListingDto,
}

#[derive(Debug, Deserialize)]
struct ListingDto {
    #[serde(default)]
    quantity: u64,
    #[serde(default)]
    unit_price: u64,
}

impl ListingDto {
    /// An empty side comes back as `{"quantity": 0, "unit_price": 0}`.
    fn price(&self) -> Option<u64> {
        (self.quantity > 0).then_some(self.unit_price)
    }
}

#[derive(Debug, Deserialize)]
struct CurrencyDto {
    id: CurrencyId,
    name: String,
}
