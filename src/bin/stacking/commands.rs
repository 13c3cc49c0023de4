use anyhow::{bail, Context, Result};
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use serde_json::json;

use stacking_engine::collector::{run_collection, CoinGeckoPrices, CycleCollector, PgRewardLedger, StacksNodeClient};
use stacking_engine::ensemble::run_ensemble;
use stacking_engine::price_cache::PriceCache;
use stacking_engine::report::{chart_series, sort_cycles, to_csv, SortDirection, SortField, Viewport};
use stacking_engine::{
    ChainHeightSource, CycleGenerator, CycleStore, Dashboard, EngineConfig, FixedHeight, HiroClient, JsonFileStore,
};

use crate::cli::{Cli, Command};

/// What to print and whether it counts as success.
pub struct Outcome {
    pub output: String,
    pub success: bool,
}

impl Outcome {
    fn json<T: Serialize>(value: &T, success: bool) -> Result<Self> {
        Ok(Self {
            output: serde_json::to_string_pretty(value).context("serialising output")?,
            success,
        })
    }
}

pub fn run(cli: Cli) -> Result<Outcome> {
    let mut config = EngineConfig::load_or_default(cli.config.as_deref()).context("loading config")?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    config.validate().context("validating config")?;
    let store = JsonFileStore::new(&config.store_path);

    match cli.command {
        Command::Refresh { height, seed } => refresh(&config, store, height, seed),
        Command::Progress { height } => {
            let heights = height_source(&config, height);
            let dashboard = Dashboard::new(store, heights.as_ref(), CycleGenerator::seeded(0));
            let progress = dashboard.progress(height);
            let value = json!({
                "progress": progress,
                "percentComplete": progress.percent_complete(),
                "completed": progress.is_completed(),
            });
            Outcome::json(&value, true)
        }
        Command::Cycles => {
            let dashboard = Dashboard::new(store, FixedHeight(0), CycleGenerator::seeded(0));
            let response = dashboard.cycles();
            Outcome::json(&response, response.is_success())
        }
        Command::Height => {
            let heights = HiroClient::new(config.chain_api_url.clone(), config.timeouts());
            let dashboard = Dashboard::new(store, heights, CycleGenerator::seeded(0));
            let response = dashboard.block_height();
            Outcome::json(&response, response.is_success())
        }
        Command::Collect { from, to } => collect(&config, &store, from, to),
        Command::Report { mobile, window } => {
            let viewport = if mobile { Viewport::Mobile } else { Viewport::Desktop };
            let window = window.unwrap_or(viewport.window());
            let cycles = store.load().context("loading cycles")?;
            let series = chart_series(&cycles, window).context("building chart series")?;
            Outcome::json(&series, true)
        }
        Command::ExportCsv { sort, asc, out } => {
            let mut cycles = store.load().context("loading cycles")?;
            if let Some(field) = sort {
                let field: SortField = field.parse()?;
                let direction = if asc { SortDirection::Asc } else { SortDirection::Desc };
                sort_cycles(&mut cycles, field, direction);
            }
            let csv = to_csv(&cycles);
            match out {
                Some(path) => {
                    std::fs::write(&path, format!("{csv}\n")).with_context(|| format!("writing {}", path.display()))?;
                    info!("wrote {} rows to {}", cycles.len(), path.display());
                    Outcome::json(&json!({ "success": true, "path": path, "rows": cycles.len() }), true)
                }
                None => Ok(Outcome { output: csv, success: true }),
            }
        }
        Command::Ensemble { horizon, runs, seed } => {
            let cycles = store.load().context("loading cycles")?;
            let report = run_ensemble(&cycles, horizon, runs, seed, &config.generator).context("running ensemble")?;
            Outcome::json(&report, true)
        }
    }
}

fn height_source(config: &EngineConfig, height: Option<u64>) -> Box<dyn ChainHeightSource> {
    match height {
        Some(h) => Box::new(FixedHeight(h)),
        None => Box::new(HiroClient::new(config.chain_api_url.clone(), config.timeouts())),
    }
}

fn refresh(config: &EngineConfig, store: JsonFileStore, height: Option<u64>, seed: Option<u64>) -> Result<Outcome> {
    let rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let generator = CycleGenerator::with_params(rng, config.generator.clone());
    let heights = height_source(config, height);
    let dashboard = Dashboard::new(store, heights.as_ref(), generator).with_max_new(config.max_generated_cycles);

    let outcome = dashboard.refresh();
    if !outcome.persisted() {
        warn!("projected cycles were not saved to {}", config.store_path.display());
    }
    Outcome::json(&outcome.response, outcome.response.is_success())
}

fn collect(config: &EngineConfig, store: &JsonFileStore, from: u64, to: u64) -> Result<Outcome> {
    if from > to {
        bail!("--from {from} is after --to {to}");
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    runtime.block_on(async {
        let timeouts = config.timeouts();
        let cache = PriceCache::load_dir(&config.price_cache_dir).context("loading price cache")?;
        info!("{} cached prices in {}", cache.len(), config.price_cache_dir.display());

        let chain = StacksNodeClient::new(config.node_api_url.clone(), timeouts);
        let prices = CoinGeckoPrices::new(cache, &config.price_cache_dir, config.coingecko_api_key.clone(), timeouts);
        let ledger = PgRewardLedger::connect(&config.postgres_url)
            .await
            .context("connecting to the rewards database")?;

        let collector = CycleCollector::new(chain, prices, ledger);
        let cycles = run_collection(&collector, from..=to, store)
            .await
            .with_context(|| format!("collecting cycles {from}..={to}"))?;

        Outcome::json(&json!({ "success": true, "data": cycles }), true)
    })
}
