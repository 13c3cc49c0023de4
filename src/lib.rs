// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine

pub mod adapter;
pub mod chain;
pub mod clarity;
pub mod config;
pub mod dashboard;
pub mod ensemble;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod params;
pub mod price_cache;
pub mod progress;
pub mod projector;
pub mod report;
pub mod schedule;
pub mod store;
pub mod types;

// Talks to the node API, CoinGecko and Postgres; not part of the browser build.
#[cfg(not(target_arch = "wasm32"))]
pub mod collector;

pub use chain::{ChainHeightSource, FixedHeight};
pub use config::EngineConfig;
pub use dashboard::{Dashboard, RefreshOutcome, WriteStatus};
pub use error::{EngineError, EngineResult};
pub use generator::CycleGenerator;
pub use params::{GeneratorParams, MAX_GENERATED_CYCLES};
pub use progress::CycleProgress;
pub use store::{CycleStore, JsonFileStore, MemoryStore};
pub use types::*;

#[cfg(not(target_arch = "wasm32"))]
pub use chain::HiroClient;

use chrono::Utc;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use report::{chart_series, sort_cycles, to_csv, value_increase_series, SortDirection, SortField, Viewport};

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Browser-side dashboard over an in-memory copy of the store.
///
/// The page hands over the stored sequence and the height it fetched; the
/// projected cycles live only as long as this object.
#[wasm_bindgen]
pub struct CycleDashboard {
    store: MemoryStore,
    generator: CycleGenerator<ChaCha8Rng>,
}

#[wasm_bindgen]
impl CycleDashboard {
    #[wasm_bindgen(constructor)]
    pub fn new(cycles_json: &str, seed: u64) -> Result<CycleDashboard, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let cycles: Vec<CycleRecord> =
            serde_json::from_str(cycles_json).map_err(|e| js_error(&EngineError::from(e)))?;
        Ok(Self {
            store: MemoryStore::new(cycles),
            generator: CycleGenerator::seeded(seed),
        })
    }

    /// Project up to `height` and return the dashboard response.
    pub fn refresh(&mut self, height: u64) -> JsValue {
        let now = Utc::now();
        let response = match dashboard::refresh_at(&self.store, height, &mut self.generator, MAX_GENERATED_CYCLES, now) {
            Ok((snapshot, _)) => ApiResponse::Success(snapshot),
            Err(e) => DashboardResponse::failure(&e),
        };
        to_js(&response)
    }

    pub fn progress(&self, height: u64) -> JsValue {
        let cycles = self.store.snapshot();
        to_js(&CycleProgress::compute(cycles.last(), Some(height)))
    }

    pub fn cycles(&self) -> JsValue {
        to_js(&CyclesPayload {
            success: true,
            data: self.store.snapshot(),
        })
    }

    pub fn value_increase(&self, window: usize) -> Result<JsValue, JsValue> {
        let series = value_increase_series(&self.store.snapshot(), window).map_err(|e| js_error(&e))?;
        Ok(to_js(&series))
    }

    /// Chart series for the last `window` cycles, or the viewport default
    /// when `window` is 0.
    pub fn charts(&self, mobile: bool, window: usize) -> Result<JsValue, JsValue> {
        let window = match (window, mobile) {
            (0, true) => Viewport::Mobile.window(),
            (0, false) => Viewport::Desktop.window(),
            (n, _) => n,
        };
        let series = chart_series(&self.store.snapshot(), window).map_err(|e| js_error(&e))?;
        Ok(to_js(&series))
    }

    /// Table rows sorted by a JSON field name, e.g. `apy`.
    pub fn sorted(&self, field: &str, ascending: bool) -> Result<JsValue, JsValue> {
        let field: SortField = field.parse().map_err(|e| js_error(&e))?;
        let direction = if ascending { SortDirection::Asc } else { SortDirection::Desc };
        let mut cycles = self.store.snapshot();
        sort_cycles(&mut cycles, field, direction);
        Ok(to_js(&cycles))
    }

    pub fn to_csv(&self) -> String {
        to_csv(&self.store.snapshot())
    }
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

fn js_error(err: &EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
