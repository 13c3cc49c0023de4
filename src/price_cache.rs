// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Price Cache

//! Daily historical prices keyed by asset and calendar day.
//!
//! On disk every entry is one `price-{id}-{dd-mm-yyyy}.json` file holding the
//! `market_data.current_price` subset of a CoinGecko history response, so
//! cached files and live responses parse the same way.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::store::write_json_atomic;

const DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    Bitcoin,
    Stacks,
}

impl Asset {
    pub const ALL: [Asset; 2] = [Asset::Bitcoin, Asset::Stacks];

    /// CoinGecko coin id.
    pub fn coin_id(self) -> &'static str {
        match self {
            Asset::Bitcoin => "bitcoin",
            Asset::Stacks => "blockstack",
        }
    }

    fn from_coin_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.coin_id() == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrencyPrices {
    pub usd: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgd: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eur: Option<Decimal>,
}

impl CurrencyPrices {
    pub fn usd(usd: Decimal) -> Self {
        Self { usd, sgd: None, eur: None }
    }
}

/// `{"market_data": {"current_price": {...}}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDocument {
    pub market_data: MarketData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub current_price: CurrencyPrices,
}

impl From<CurrencyPrices> for PriceDocument {
    fn from(current_price: CurrencyPrices) -> Self {
        Self {
            market_data: MarketData { current_price },
        }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn file_name(asset: Asset, date: NaiveDate) -> String {
    format!("price-{}-{}.json", asset.coin_id(), format_date(date))
}

/// Inverse of [`file_name`].
fn parse_file_name(name: &str) -> Option<(Asset, NaiveDate)> {
    let stem = name.strip_prefix("price-")?.strip_suffix(".json")?;
    // dd-mm-yyyy is always 10 characters
    let split = stem.len().checked_sub(11)?;
    let (id, date) = (stem.get(..split)?, stem.get(split + 1..)?);
    let asset = Asset::from_coin_id(id)?;
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    Some((asset, date))
}

#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    entries: HashMap<(Asset, NaiveDate), CurrencyPrices>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every cache file in `dir`. A missing directory is an empty cache;
    /// unreadable files are skipped with a warning.
    pub fn load_dir(dir: &Path) -> EngineResult<Self> {
        let mut cache = Self::new();
        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(cache),
            Err(e) => return Err(EngineError::Persistence(format!("{}: {e}", dir.display()))),
        };
        for entry in listing {
            let path = entry?.path();
            let Some((asset, date)) = path.file_name().and_then(|n| n.to_str()).and_then(parse_file_name) else {
                continue;
            };
            match read_document(&path) {
                Ok(doc) => cache.insert(asset, date, doc.market_data.current_price),
                Err(e) => warn!("skipping price file {}: {e}", path.display()),
            }
        }
        debug!("loaded {} cached prices from {}", cache.len(), dir.display());
        Ok(cache)
    }

    pub fn get(&self, asset: Asset, date: NaiveDate) -> Option<&CurrencyPrices> {
        self.entries.get(&(asset, date))
    }

    pub fn insert(&mut self, asset: Asset, date: NaiveDate, prices: CurrencyPrices) {
        self.entries.insert((asset, date), prices);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write one entry to `dir`, returning the file written.
    pub fn persist_entry(&self, dir: &Path, asset: Asset, date: NaiveDate) -> EngineResult<PathBuf> {
        let prices = self
            .get(asset, date)
            .ok_or_else(|| EngineError::Persistence(format!("no cached {} price for {date}", asset.coin_id())))?;
        let path = dir.join(file_name(asset, date));
        write_json_atomic(&path, &PriceDocument::from(*prices))?;
        Ok(path)
    }

    /// Write every entry to `dir`.
    pub fn persist_dir(&self, dir: &Path) -> EngineResult<usize> {
        let mut keys: Vec<_> = self.entries.keys().copied().collect();
        keys.sort();
        for (asset, date) in &keys {
            self.persist_entry(dir, *asset, *date)?;
        }
        Ok(keys.len())
    }
}

fn read_document(path: &Path) -> EngineResult<PriceDocument> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("test: date")
    }

    #[test]
    fn file_names_round_trip() {
        let name = file_name(Asset::Stacks, day(2024, 6, 27));
        assert_eq!(name, "price-blockstack-27-06-2024.json");
        assert_eq!(parse_file_name(&name), Some((Asset::Stacks, day(2024, 6, 27))));
        assert_eq!(parse_file_name("price-dogecoin-27-06-2024.json"), None);
        assert_eq!(parse_file_name("all.json"), None);
    }

    #[test]
    fn missing_dir_is_empty() {
        let tmp = tempfile::tempdir().expect("test: tempdir");
        let cache = PriceCache::load_dir(&tmp.path().join("absent")).expect("test: load");
        assert!(cache.is_empty());
    }

    #[test]
    fn persist_then_load() {
        let tmp = tempfile::tempdir().expect("test: tempdir");
        let dir = tmp.path();
        let mut cache = PriceCache::new();
        cache.insert(Asset::Bitcoin, day(2024, 6, 27), CurrencyPrices::usd(dec!(61023.5)));
        cache.insert(
            Asset::Stacks,
            day(2024, 6, 27),
            CurrencyPrices {
                usd: dec!(1.71),
                sgd: Some(dec!(2.31)),
                eur: None,
            },
        );
        assert_eq!(cache.persist_dir(&dir).expect("test: persist"), 2);
        fs::write(dir.join("notes.txt"), "ignored").expect("test: write");
        fs::write(dir.join("price-bitcoin-01-01-2024.json"), "{").expect("test: write");

        let loaded = PriceCache::load_dir(&dir).expect("test: load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(Asset::Bitcoin, day(2024, 6, 27)).map(|p| p.usd), Some(dec!(61023.5)));
        assert_eq!(loaded.get(Asset::Stacks, day(2024, 6, 27)).and_then(|p| p.sgd), Some(dec!(2.31)));
    }

    #[test]
    fn reads_coingecko_shape() {
        let doc: PriceDocument = serde_json::from_str(
            r#"{"id":"bitcoin","market_data":{"current_price":{"usd":61023.5,"sgd":82000.1,"eur":56000,"jpy":9}}}"#,
        )
        .expect("test: parse");
        assert_eq!(doc.market_data.current_price.usd, dec!(61023.5));
        assert_eq!(doc.market_data.current_price.eur, Some(dec!(56000)));
    }
}
