// Daily prices from CoinGecko's history endpoint, behind the on-disk cache.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};

use super::{off_thread, PricePair, PriceSource};
use crate::chain::{HttpTimeouts, JsonHttp};
use crate::error::{EngineError, EngineResult};
use crate::price_cache::{format_date, Asset, CurrencyPrices, PriceCache, PriceDocument};

pub const COINGECKO_API: &str = "https://api.coingecko.com";

#[derive(Clone)]
pub struct CoinGeckoPrices {
    http: JsonHttp,
    api_key: Option<String>,
    cache: Arc<Mutex<PriceCache>>,
    cache_dir: PathBuf,
}

impl CoinGeckoPrices {
    pub fn new(cache: PriceCache, cache_dir: impl Into<PathBuf>, api_key: Option<String>, timeouts: HttpTimeouts) -> Self {
        Self::with_base_url(COINGECKO_API, cache, cache_dir, api_key, timeouts)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        cache: PriceCache,
        cache_dir: impl Into<PathBuf>,
        api_key: Option<String>,
        timeouts: HttpTimeouts,
    ) -> Self {
        Self {
            http: JsonHttp::new(base_url, timeouts),
            api_key,
            cache: Arc::new(Mutex::new(cache)),
            cache_dir: cache_dir.into(),
        }
    }

    fn history_path(&self, asset: Asset, date: NaiveDate) -> String {
        let mut path = format!(
            "/api/v3/coins/{}/history?date={}&localization=false",
            asset.coin_id(),
            format_date(date)
        );
        if let Some(key) = &self.api_key {
            path.push_str("&x_cg_demo_api_key=");
            path.push_str(key);
        }
        path
    }

    fn cached(&self, asset: Asset, date: NaiveDate) -> EngineResult<Option<CurrencyPrices>> {
        let cache = self.cache.lock().map_err(|_| poisoned())?;
        Ok(cache.get(asset, date).copied())
    }

    /// Cache hit, or fetch, remember and write the cache file.
    fn price_blocking(&self, asset: Asset, date: NaiveDate) -> EngineResult<CurrencyPrices> {
        if let Some(prices) = self.cached(asset, date)? {
            debug!("price cache hit {} {date}", asset.coin_id());
            return Ok(prices);
        }
        let doc: PriceDocument = self.http.get(&self.history_path(asset, date))?;
        let prices = doc.market_data.current_price;

        let mut cache = self.cache.lock().map_err(|_| poisoned())?;
        cache.insert(asset, date, prices);
        if let Err(e) = cache.persist_entry(&self.cache_dir, asset, date) {
            warn!("could not write price cache for {} {date}: {e}", asset.coin_id());
        }
        Ok(prices)
    }
}

fn poisoned() -> EngineError {
    EngineError::Persistence("price cache lock poisoned".into())
}

#[async_trait]
impl PriceSource for CoinGeckoPrices {
    async fn prices_on(&self, date: NaiveDate) -> EngineResult<PricePair> {
        let this = self.clone();
        off_thread(move || {
            let btc = this.price_blocking(Asset::Bitcoin, date)?.usd;
            let stx = this.price_blocking(Asset::Stacks, date)?.usd;
            Ok(PricePair { btc, stx })
        })
        .await
    }
}
