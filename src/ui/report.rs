//! Profit ranking and crafting-tree rendering for one resolved query.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

use crate::domain::{
    CandidateSet, Coins, CurrencyId, IngredientKind, Item, ItemId, Knowledge, PriceQuote,
    PriceTable, PricingMode, Recipe, RecipeId, Resolution,
};

/// Everything the report needs besides the candidate set.
pub struct ReportContext<'a> {
    pub knowledge: &'a Knowledge,
    pub prices: &'a PriceTable,
    pub currencies: &'a HashMap<CurrencyId, String>,
    /// Skins unlocked on the account, when an API key is configured.
    pub unlocked_skins: Option<&'a BTreeSet<u32>>,
    pub mode: PricingMode,
    pub payout_rate: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReportEntry {
    pub recipe: RecipeId,
    pub output: ItemId,
    pub output_count: u32,
    pub cost: Coins,
    pub proceeds: f64,
    pub profit: f64,
    /// Units of the seed item the recipe consumes directly.
    pub seed_used: u32,
    pub new_skin: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub seed: ItemId,
    pub mode: PricingMode,
    /// Net copper from selling one unit of the seed instead.
    pub seed_value: Option<f64>,
    /// Priced recipes, most profitable first.
    pub entries: Vec<ReportEntry>,
    /// Candidates that could not be priced or whose output cannot be sold.
    pub unpriced: usize,
}

/// Net copper received for `count` units of `item` after trading post fees. Items
/// that cannot be sold on the trading post, or have no buyers there, fall back to
/// their vendor value, which carries no fee.
pub fn net_proceeds(
    item: Option<&Item>,
    quote: Option<&PriceQuote>,
    count: u32,
    mode: PricingMode,
    payout_rate: f64,
) -> Option<f64> {
    let count = f64::from(count);
    let tradable = item.and_then(|item| item.tradable) != Some(false);
    quote
        .filter(|_| tradable)
        .and_then(|quote| mode.unit_value(quote))
        .map(|unit| unit as f64 * count * payout_rate)
        .or_else(|| {
            item.and_then(|item| item.vendor_value)
                .map(|value| value as f64 * count)
        })
}

pub fn profit(proceeds: f64, cost: Coins) -> f64 {
    proceeds - cost as f64
}

pub fn build_report(seed: ItemId, candidates: &CandidateSet, ctx: &ReportContext<'_>) -> Report {
    let mut entries = Vec::new();
    let mut unpriced = 0;

    for (id, candidate) in candidates.iter() {
        let costing = match candidate.resolution() {
            Some(Resolution::Priced(costing)) => costing,
            _ => {
                unpriced += 1;
                continue;
            }
        };
        let Some(recipe) = ctx.knowledge.recipe(id) else {
            unpriced += 1;
            continue;
        };
        let output = ctx.knowledge.item(recipe.output_item_id);
        let Some(proceeds) = net_proceeds(
            output,
            ctx.prices.get(&recipe.output_item_id),
            recipe.output_count,
            ctx.mode,
            ctx.payout_rate,
        ) else {
            unpriced += 1;
            continue;
        };

        let new_skin = match (ctx.unlocked_skins, output.and_then(|item| item.default_skin)) {
            (Some(unlocked), Some(skin)) => !unlocked.contains(&skin),
            _ => false,
        };
        let seed_used = recipe
            .item_ingredients()
            .filter(|ingredient| ingredient.id == seed)
            .map(|ingredient| ingredient.count)
            .sum();

        entries.push(ReportEntry {
            recipe: id,
            output: recipe.output_item_id,
            output_count: recipe.output_count,
            cost: costing.cost,
            proceeds,
            profit: profit(proceeds, costing.cost),
            seed_used,
            new_skin,
        });
    }

    entries.sort_by(|a, b| b.profit.total_cmp(&a.profit).then(a.recipe.cmp(&b.recipe)));

    Report {
        seed,
        mode: ctx.mode,
        seed_value: net_proceeds(
            ctx.knowledge.item(seed),
            ctx.prices.get(&seed),
            1,
            ctx.mode,
            ctx.payout_rate,
        ),
        entries,
        unpriced,
    }
}

/// Render the top `limit` entries with their crafting trees.
pub fn render(
    report: &Report,
    candidates: &CandidateSet,
    ctx: &ReportContext<'_>,
    limit: usize,
) -> String {
    let mut out = String::new();
    let seed_name = item_name(ctx.knowledge, report.seed);

    let _ = writeln!(out, "\n=== {} ({} pricing) ===", seed_name, report.mode.label());
    if let Some(value) = report.seed_value {
        let _ = writeln!(out, "Selling it directly nets {} each.", format_coins_f(value));
    }

    if report.entries.is_empty() {
        let _ = writeln!(out, "Nothing craftable from this item could be priced; just sell it.");
    }

    for (rank, entry) in report.entries.iter().take(limit).enumerate() {
        let Some(recipe) = ctx.knowledge.recipe(entry.recipe) else {
            continue;
        };
        let skin = if entry.new_skin { "  [new skin]" } else { "" };
        let _ = writeln!(
            out,
            "\n{}. {} x{}{}",
            rank + 1,
            item_name(ctx.knowledge, entry.output),
            entry.output_count,
            skin
        );
        let _ = writeln!(
            out,
            "   {} | cost {} | sells for {} | profit {}",
            discipline_label(recipe),
            format_coins(entry.cost),
            format_coins_f(entry.proceeds),
            format_coins_f(entry.profit)
        );
        if let (Some(value), true) = (report.seed_value, entry.seed_used > 0) {
            let verdict = if entry.profit > value * f64::from(entry.seed_used) {
                "beats"
            } else {
                "does not beat"
            };
            let _ = writeln!(
                out,
                "   {} selling the {} {} directly",
                verdict, entry.seed_used, seed_name
            );
        }

        render_ingredients(&mut out, recipe, report.seed, candidates, ctx, 2);
    }

    if report.entries.len() > limit {
        let _ = writeln!(out, "\n...and {} more.", report.entries.len() - limit);
    }
    if report.unpriced > 0 {
        let _ = writeln!(
            out,
            "\n{} recipe(s) skipped: an ingredient or the output has no usable price.",
            report.unpriced
        );
    }
    out
}

/// Walk the producers the cost engine chose. Choices never form a cycle: a recipe
/// re-entered while being costed resolves as unavailable and is never chosen.
fn render_ingredients(
    out: &mut String,
    recipe: &Recipe,
    seed: ItemId,
    candidates: &CandidateSet,
    ctx: &ReportContext<'_>,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    let choices = candidates
        .resolution(recipe.id)
        .and_then(Resolution::costing)
        .map(|costing| &costing.choices);
    for ingredient in &recipe.ingredients {
        match &ingredient.kind {
            IngredientKind::Item => {}
            IngredientKind::Currency => {
                let name = ctx
                    .currencies
                    .get(&ingredient.id)
                    .cloned()
                    .unwrap_or_else(|| format!("Currency #{}", ingredient.id));
                let _ = writeln!(out, "{indent}- {} {}", ingredient.count, name);
                continue;
            }
            other => {
                let _ = writeln!(out, "{indent}- {} x {} #{}", ingredient.count, other, ingredient.id);
                continue;
            }
        }

        let name = item_name(ctx.knowledge, ingredient.id);
        if ingredient.id == seed {
            let _ = writeln!(out, "{indent}- {} x {} (your item)", ingredient.count, name);
            continue;
        }

        let producer = choices
            .and_then(|choices| choices.get(&ingredient.id))
            .and_then(|id| ctx.knowledge.recipe(*id));
        match producer {
            Some(producer) => {
                let batches = ingredient.count.max(1).div_ceil(producer.batch_size());
                let _ = writeln!(
                    out,
                    "{indent}- {} x {}: craft {} batch(es) ({})",
                    ingredient.count,
                    name,
                    batches,
                    discipline_label(producer)
                );
                render_ingredients(out, producer, seed, candidates, ctx, depth + 1);
            }
            None => match ctx
                .prices
                .get(&ingredient.id)
                .and_then(|quote| ctx.mode.unit_cost(quote))
            {
                Some(unit) => {
                    let _ = writeln!(
                        out,
                        "{indent}- {} x {}: buy @ {} ({})",
                        ingredient.count,
                        name,
                        format_coins(unit),
                        format_coins(unit.saturating_mul(u64::from(ingredient.count)))
                    );
                }
                None => {
                    let _ = writeln!(out, "{indent}- {} x {}: no price", ingredient.count, name);
                }
            },
        }
    }
}

fn item_name(knowledge: &Knowledge, id: ItemId) -> String {
    knowledge
        .item(id)
        .map(Item::display_name)
        .unwrap_or_else(|| format!("Item #{id}"))
}

fn discipline_label(recipe: &Recipe) -> String {
    if recipe.disciplines.is_empty() {
        format!("recipe {}", recipe.id)
    } else {
        format!("{} {}", recipe.disciplines.join("/"), recipe.min_rating)
    }
}

/// Render copper as gold/silver/copper, e.g. `1g 02s 30c`.
pub fn format_coins(copper: Coins) -> String {
    let gold = copper / 10_000;
    let silver = (copper / 100) % 100;
    let copper = copper % 100;
    if gold > 0 {
        format!("{gold}g {silver:02}s {copper:02}c")
    } else if silver > 0 {
        format!("{silver}s {copper:02}c")
    } else {
        format!("{copper}c")
    }
}

fn format_coins_f(value: f64) -> String {
    let rounded = value.round();
    if rounded < 0.0 {
        format!("-{}", format_coins(rounded.abs() as Coins))
    } else {
        format_coins(rounded as Coins)
    }
}
