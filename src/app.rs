use std::collections::{BTreeSet, HashMap};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::{
    domain::{
        referenced_items, CostEngine, CurrencyId, GraphBuilder, IngredientKind, Item, ItemId,
        Knowledge, PricingMode,
    },
    infra::{
        catalog::{Catalog, CatalogError},
        gw2::Gw2Client,
        store::Store,
    },
    ui::{
        prompt::{Command, ItemQuery, Prompt, HELP},
        report::{build_report, render, ReportContext},
    },
    util::{
        persistence::{load_settings, save_settings, Settings},
        version::{version_label, APP_NAME},
    },
    Args,
};

/// Single owner of everything that outlives one resolution pass.
struct Session {
    settings: Settings,
    store: Store,
    knowledge: Knowledge,
    client: Gw2Client,
    unlocked_skins: Option<BTreeSet<u32>>,
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let settings = apply_args(load_settings(), &args);
    settings.validate().context("invalid settings")?;

    let client = Gw2Client::with_base_url(&settings.api_base_url, settings.client_options())
        .context("failed to initialise the GW2 API client")?;
    let store = Store::new(args.data_dir.as_deref(), settings.store_recipes);
    let knowledge = store
        .load()
        .with_context(|| format!("cannot use stored knowledge at {}", store.path().display()))?;

    let mut session = Session {
        settings,
        store,
        knowledge,
        client,
        unlocked_skins: None,
    };
    session.load_names().await;
    session.load_unlocks().await;

    match args.item.as_deref() {
        Some(raw) => {
            session.check(&ItemQuery::parse(raw)).await?;
            session.save()
        }
        None => session.interactive().await,
    }
}

/// CLI flags win over the settings file.
fn apply_args(mut settings: Settings, args: &Args) -> Settings {
    if let Some(mode) = args.mode {
        settings.pricing_mode = mode;
    }
    if let Some(key) = &args.api_key {
        settings.api_key = Some(key.clone());
    }
    if args.no_store_recipes {
        settings.store_recipes = false;
    }
    if let Some(limit) = args.limit {
        settings.report_limit = limit;
    }
    settings
}

impl Session {
    async fn interactive(&mut self) -> anyhow::Result<()> {
        println!("{APP_NAME} {}", version_label());
        println!("{HELP}");

        let mut prompt = Prompt::new();
        loop {
            let command = prompt
                .next_command()
                .await
                .context("failed to read from stdin")?;
            match command {
                Command::Exit => break,
                Command::Empty => {}
                Command::Help => println!("{HELP}"),
                Command::Invalid(message) => println!("{message}"),
                Command::Save => {
                    if let Err(err) = self.save() {
                        error!("{err:#}");
                    }
                }
                Command::Clear => {
                    self.knowledge.clear_recipes();
                    println!("Forgot stored recipes; item names are kept.");
                }
                Command::Mode(mode) => self.set_mode(mode),
                Command::Query(query) => {
                    if let Err(err) = self.check(&query).await {
                        error!("check aborted, nothing learned in this pass was kept: {err:#}");
                    }
                }
            }
        }

        self.save()
    }

    /// Merge the bulk name list so items can be looked up by name.
    async fn load_names(&mut self) {
        match self.client.item_names(&self.settings.names_url).await {
            Ok(names) => {
                let count = names.len();
                for (id, name) in names {
                    self.knowledge.learn_item(Item::named(id, name));
                }
                info!(count, "item names loaded");
            }
            Err(err) => warn!("could not download item names, using stored ones: {err}"),
        }
    }

    async fn load_unlocks(&mut self) {
        let Some(key) = self.settings.api_key.clone() else {
            return;
        };
        match self.client.unlocked_skins(&key).await {
            Ok(skins) => {
                info!(count = skins.len(), "unlocked skins loaded");
                self.unlocked_skins = Some(skins);
            }
            Err(err) => warn!("could not load unlocked skins: {err}"),
        }
    }

    fn set_mode(&mut self, mode: PricingMode) {
        self.settings.pricing_mode = mode;
        println!("Pricing mode: {}", mode.label());

        // Persist only the preference, not flags given for this run.
        let mut saved = load_settings();
        saved.pricing_mode = mode;
        if let Err(err) = save_settings(&saved) {
            warn!("could not save settings: {err}");
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        self.store
            .save(&self.knowledge)
            .with_context(|| format!("failed to save knowledge to {}", self.store.path().display()))
    }

    /// One resolution pass. Knowledge is committed only if the pass completes.
    async fn check(&mut self, query: &ItemQuery) -> anyhow::Result<()> {
        let Some(seed) = self.resolve_query(query).await? else {
            println!("No item matches that; names are case sensitive.");
            return Ok(());
        };

        let mut knowledge = self.knowledge.clone();
        let text = resolve_pass(
            &self.client,
            seed,
            &mut knowledge,
            &self.settings,
            self.unlocked_skins.as_ref(),
        )
        .await?;
        self.knowledge = knowledge;

        print!("{text}");
        Ok(())
    }

    async fn resolve_query(&mut self, query: &ItemQuery) -> Result<Option<ItemId>, CatalogError> {
        match query {
            ItemQuery::Name(name) => Ok(self.knowledge.find_item_by_name(name)),
            ItemQuery::Id(id) => {
                if self.knowledge.item(*id).is_some_and(Item::has_details) {
                    return Ok(Some(*id));
                }
                let found = self.client.item_metadata(&[*id]).await?;
                let exists = found.iter().any(|item| item.id == *id);
                for item in found {
                    self.knowledge.learn_item(item);
                }
                Ok(exists.then_some(*id))
            }
        }
    }
}

/// Expand, price and cost everything reachable from `seed`, returning the rendered report.
async fn resolve_pass<C>(
    catalog: &C,
    seed: ItemId,
    knowledge: &mut Knowledge,
    settings: &Settings,
    unlocked_skins: Option<&BTreeSet<u32>>,
) -> Result<String, CatalogError>
where
    C: Catalog + ?Sized,
{
    let mode = settings.pricing_mode;
    let mut candidates = GraphBuilder::new(catalog).expand(seed, knowledge).await?;

    let mut items = referenced_items(&candidates, knowledge);
    items.insert(seed);
    let missing: Vec<ItemId> = items
        .iter()
        .copied()
        .filter(|id| !knowledge.item(*id).is_some_and(Item::has_details))
        .collect();
    if !missing.is_empty() {
        for item in catalog.item_metadata(&missing).await? {
            knowledge.learn_item(item);
        }
    }

    let ids: Vec<ItemId> = items.into_iter().collect();
    let prices = catalog.prices(&ids).await?;

    let knowledge = &*knowledge;
    CostEngine::new(seed, mode, &prices, knowledge).resolve_all(&mut candidates);

    let currency_ids: BTreeSet<CurrencyId> = candidates
        .all_recipes()
        .filter_map(|id| knowledge.recipe(id))
        .flat_map(|recipe| recipe.ingredients.iter())
        .filter(|ingredient| ingredient.kind == IngredientKind::Currency)
        .map(|ingredient| ingredient.id)
        .collect();
    let currencies: HashMap<CurrencyId, String> = if currency_ids.is_empty() {
        HashMap::new()
    } else {
        let ids: Vec<CurrencyId> = currency_ids.into_iter().collect();
        catalog.currency_names(&ids).await?
    };

    let ctx = ReportContext {
        knowledge,
        prices: &prices,
        currencies: &currencies,
        unlocked_skins,
        mode,
        payout_rate: settings.payout_rate,
    };
    let report = build_report(seed, &candidates, &ctx);
    Ok(render(&report, &candidates, &ctx, settings.report_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ingredient, PriceQuote};
    use crate::test_support::{recipe, FakeCatalog};
    use clap::Parser;

    #[test]
    fn flags_override_settings() {
        let args = Args::try_parse_from([
            "craft_checker",
            "--mode",
            "listed",
            "--limit",
            "3",
            "--no-store-recipes",
        ])
        .unwrap();
        let settings = apply_args(Settings::default(), &args);
        assert_eq!(settings.pricing_mode, PricingMode::Listed);
        assert_eq!(settings.report_limit, 3);
        assert!(!settings.store_recipes);

        let args = Args::try_parse_from(["craft_checker"]).unwrap();
        let settings = apply_args(Settings::default(), &args);
        assert_eq!(settings.pricing_mode, PricingMode::Instant);
        assert!(settings.store_recipes);
    }

    fn catalog() -> FakeCatalog {
        let mut catalog = FakeCatalog::with_recipes([
            recipe(10, 2, 1, vec![Ingredient::item(1, 3), Ingredient::item(3, 1)]),
            recipe(
                11,
                4,
                1,
                vec![Ingredient::item(2, 1), Ingredient::currency(2, 100)],
            ),
        ]);
        for (id, name) in [(1, "Glob of Ectoplasm"), (2, "Sigil"), (3, "Dust"), (4, "Relic")] {
            catalog.items.insert(
                id,
                Item {
                    tradable: Some(true),
                    ..Item::named(id, name)
                },
            );
        }
        catalog.prices.insert(1, PriceQuote::new(20, 25));
        catalog.prices.insert(2, PriceQuote::new(50, 60));
        catalog.prices.insert(3, PriceQuote::new(10, 8));
        catalog.prices.insert(4, PriceQuote::new(500, 600));
        catalog.currencies.insert(2, "Karma".to_string());
        catalog
    }

    #[tokio::test]
    async fn pass_learns_and_reports() {
        let catalog = catalog();
        let mut knowledge = Knowledge::default();

        let text = resolve_pass(&catalog, 1, &mut knowledge, &Settings::default(), None)
            .await
            .unwrap();

        assert!(text.contains("=== Glob of Ectoplasm (instant pricing) ==="));
        assert!(text.contains("1. Relic x1"));
        assert!(text.contains("100 Karma"));
        assert!(knowledge.recipe(10).is_some());
        assert!(knowledge.item(4).is_some_and(Item::has_details));
    }

    #[tokio::test]
    async fn item_without_consumers_suggests_selling() {
        let catalog = catalog();
        let mut knowledge = Knowledge::default();

        let text = resolve_pass(&catalog, 4, &mut knowledge, &Settings::default(), None)
            .await
            .unwrap();

        assert!(text.contains("just sell it"));
        assert_eq!(catalog.consuming_calls(4), 1);
    }
}
