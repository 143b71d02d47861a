use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for items returned by the GW2 API.
pub type ItemId = u32;
/// Identifier for recipes returned by the GW2 API.
pub type RecipeId = u32;
/// Identifier for wallet currencies (karma, spirit shards, ...).
pub type CurrencyId = u32;
/// Amount of money in copper, the smallest coin.
pub type Coins = u64;

/// Item metadata. Every field except the name may still be unknown, in which case
/// it is filled in the first time the catalog reports it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub name: Option<String>,
    /// Copper a merchant pays for one unit; `None` if it cannot be vendored.
    #[serde(default)]
    pub vendor_value: Option<Coins>,
    /// Whether the item can be traded on the trading post; `None` until looked up.
    #[serde(default)]
    pub tradable: Option<bool>,
    #[serde(default)]
    pub default_skin: Option<u32>,
}

impl Item {
    pub fn named(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Fill in fields that are still unknown from `other`. Known fields are never overwritten.
    pub fn merge(&mut self, other: Item) {
        if self.name.is_none() {
            self.name = other.name;
        }
        if self.vendor_value.is_none() {
            self.vendor_value = other.vendor_value;
        }
        if self.tradable.is_none() {
            self.tradable = other.tradable;
        }
        if self.default_skin.is_none() {
            self.default_skin = other.default_skin;
        }
    }

    /// True once the detailed item lookup has been merged in.
    pub fn has_details(&self) -> bool {
        self.tradable.is_some()
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Item #{}", self.id))
    }
}

/// Classification of a recipe input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IngredientKind {
    Item,
    Currency,
    GuildUpgrade,
    Other(String),
}

impl From<String> for IngredientKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Item" => Self::Item,
            "Currency" => Self::Currency,
            "GuildUpgrade" => Self::GuildUpgrade,
            _ => Self::Other(value),
        }
    }
}

impl From<IngredientKind> for String {
    fn from(kind: IngredientKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for IngredientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => f.write_str("Item"),
            Self::Currency => f.write_str("Currency"),
            Self::GuildUpgrade => f.write_str("GuildUpgrade"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Item ID or currency ID, depending on `kind`.
    pub id: u32,
    pub count: u32,
    pub kind: IngredientKind,
}

impl Ingredient {
    pub fn item(id: ItemId, count: u32) -> Self {
        Self {
            id,
            count,
            kind: IngredientKind::Item,
        }
    }

    pub fn currency(id: CurrencyId, count: u32) -> Self {
        Self {
            id,
            count,
            kind: IngredientKind::Currency,
        }
    }

    pub fn is_item(&self) -> bool {
        self.kind == IngredientKind::Item
    }
}

/// A crafting recipe. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub ingredients: Vec<Ingredient>,
    pub output_item_id: ItemId,
    /// Units produced per craft, at least 1.
    pub output_count: u32,
    #[serde(default)]
    pub disciplines: Vec<String>,
    #[serde(default)]
    pub min_rating: u32,
}

impl Recipe {
    /// Item ingredients, skipping the degenerate case of a recipe consuming its own output.
    pub fn item_ingredients(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients
            .iter()
            .filter(move |ingredient| ingredient.is_item() && ingredient.id != self.output_item_id)
    }

    pub fn batch_size(&self) -> u32 {
        self.output_count.max(1)
    }
}

/// Trading post quote for one unit. `buy` is the highest buy order, `sell` the lowest listing.
/// A side with no orders on it is `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PriceQuote {
    pub buy: Option<Coins>,
    pub sell: Option<Coins>,
}

impl PriceQuote {
    /// Quote with orders on both sides.
    pub fn new(buy: Coins, sell: Coins) -> Self {
        Self {
            buy: Some(buy),
            sell: Some(sell),
        }
    }
}

/// How items are valued when buying ingredients and selling outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingMode {
    /// Trade against existing orders right now.
    #[default]
    Instant,
    /// Place orders and wait for them to fill.
    Listed,
}

impl PricingMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Listed => "listed",
        }
    }

    /// Copper paid per unit of a market-sourced ingredient, `None` when the order
    /// book side it is priced from is empty.
    pub fn unit_cost(&self, quote: &PriceQuote) -> Option<Coins> {
        match self {
            Self::Instant => quote.sell,
            Self::Listed => quote.buy.map(|buy| buy.saturating_add(1)),
        }
    }

    /// Copper received per unit sold, before trading post fees.
    pub fn unit_value(&self, quote: &PriceQuote) -> Option<Coins> {
        match self {
            Self::Instant => quote.buy,
            Self::Listed => quote.sell.map(|sell| sell.saturating_sub(1)),
        }
    }
}

impl std::str::FromStr for PricingMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "instant" | "i" => Ok(Self::Instant),
            "listed" | "list" | "l" => Ok(Self::Listed),
            other => Err(format!("unknown pricing mode '{other}' (use instant or listed)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_fills_unknown_fields() {
        let mut item = Item::named(19721, "Glob of Ectoplasm");
        item.merge(Item {
            id: 19721,
            name: Some("Renamed".into()),
            vendor_value: Some(24),
            tradable: Some(true),
            default_skin: None,
        });
        assert_eq!(item.name.as_deref(), Some("Glob of Ectoplasm"));
        assert_eq!(item.vendor_value, Some(24));
        assert_eq!(item.tradable, Some(true));

        item.merge(Item {
            id: 19721,
            vendor_value: Some(1),
            tradable: Some(false),
            ..Item::default()
        });
        assert_eq!(item.vendor_value, Some(24));
        assert_eq!(item.tradable, Some(true));
    }

    #[test]
    fn ingredient_kind_keeps_unrecognised_names() {
        let kinds: Vec<IngredientKind> =
            serde_json::from_str(r#"["Item", "Currency", "GuildUpgrade", "Mystery"]"#).unwrap();
        assert_eq!(kinds[3], IngredientKind::Other("Mystery".into()));
        assert_eq!(serde_json::to_string(&kinds[3]).unwrap(), r#""Mystery""#);
    }

    #[test]
    fn pricing_mode_unit_prices() {
        let quote = PriceQuote::new(50, 40);
        assert_eq!(PricingMode::Instant.unit_cost(&quote), Some(40));
        assert_eq!(PricingMode::Listed.unit_cost(&quote), Some(51));
        assert_eq!(PricingMode::Instant.unit_value(&quote), Some(50));
        assert_eq!(PricingMode::Listed.unit_value(&quote), Some(39));
    }

    #[test]
    fn empty_order_book_side_has_no_price() {
        let no_listings = PriceQuote {
            buy: Some(3000),
            sell: None,
        };
        assert_eq!(PricingMode::Instant.unit_cost(&no_listings), None);
        assert_eq!(PricingMode::Listed.unit_value(&no_listings), None);
        assert_eq!(PricingMode::Instant.unit_value(&no_listings), Some(3000));
    }

    #[test]
    fn self_referencing_ingredient_is_skipped() {
        let recipe = Recipe {
            id: 1,
            ingredients: vec![Ingredient::item(10, 1), Ingredient::item(20, 2)],
            output_item_id: 10,
            output_count: 1,
            disciplines: vec![],
            min_rating: 0,
        };
        let ids: Vec<u32> = recipe.item_ingredients().map(|i| i.id).collect();
        assert_eq!(ids, vec![20]);
    }
}
