// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Reports and Export

//! Series the dashboard charts and table consume, derived from the stored
//! cycle sequence. Nothing here is persisted.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::adapter::from_decimal;
use crate::metrics::{annualise, round_usd};
use crate::types::{iso_millis, CycleRecord, MicroStx};

/// Notional stake of the value-increase and dollar-yield reports, in USD.
pub const NOTIONAL_USD: Decimal = dec!(1000);

pub const DESKTOP_WINDOW: usize = 20;
pub const MOBILE_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewport {
    Desktop,
    Mobile,
}

impl Viewport {
    pub fn window(self) -> usize {
        match self {
            Viewport::Desktop => DESKTOP_WINDOW,
            Viewport::Mobile => MOBILE_WINDOW,
        }
    }
}

/// The last `n` records (all of them when there are fewer).
pub fn last_window(cycles: &[CycleRecord], n: usize) -> &[CycleRecord] {
    &cycles[cycles.len().saturating_sub(n)..]
}

fn round2(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ─── Value increase ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueIncreasePoint {
    pub cycle: u64,
    pub value_increase: Decimal,
    pub percent_increase: Decimal,
}

/// USD value at the end of `current` of [`NOTIONAL_USD`] bought at
/// `previous`'s STX price and stacked for one cycle.
fn end_value(previous: &CycleRecord, current: &CycleRecord) -> EngineResult<Decimal> {
    NOTIONAL_USD
        .checked_div(previous.stx_price_at_end)
        .ok_or_else(|| EngineError::domain(format!("cycle {} has no STX price", previous.cycle)))?
        .checked_mul(Decimal::ONE + current.cycle_yield)
        .and_then(|stx| stx.checked_mul(current.stx_price_at_end))
        .ok_or_else(|| EngineError::domain(format!("value of cycle {} overflows", current.cycle)))
}

fn value_increase(previous: &CycleRecord, current: &CycleRecord) -> EngineResult<ValueIncreasePoint> {
    let increase = end_value(previous, current)? - NOTIONAL_USD;
    Ok(ValueIncreasePoint {
        cycle: current.cycle,
        value_increase: round2(increase),
        percent_increase: round2(increase / NOTIONAL_USD * dec!(100)),
    })
}

/// Value increase for each of the last `window` cycles. The first cycle of the
/// window is measured against its predecessor in the full sequence; the very
/// first stored cycle has none and reports zero.
pub fn value_increase_series(cycles: &[CycleRecord], window: usize) -> EngineResult<Vec<ValueIncreasePoint>> {
    let start = cycles.len().saturating_sub(window);
    (start..cycles.len())
        .map(|i| match i.checked_sub(1) {
            Some(prev) => value_increase(&cycles[prev], &cycles[i]),
            None => Ok(ValueIncreasePoint {
                cycle: cycles[i].cycle,
                value_increase: Decimal::ZERO,
                percent_increase: Decimal::ZERO,
            }),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueIncreaseSummary {
    pub average: Decimal,
    pub max: ValueIncreasePoint,
    pub min: ValueIncreasePoint,
}

impl ValueIncreaseSummary {
    /// Average, best and worst cycle, leaving out a zero first point.
    pub fn from_series(series: &[ValueIncreasePoint]) -> Option<Self> {
        let points: Vec<_> = match series.split_first() {
            Some((first, rest)) if first.value_increase.is_zero() => rest.to_vec(),
            _ => series.to_vec(),
        };
        let max = *points.iter().max_by(|a, b| a.value_increase.cmp(&b.value_increase))?;
        let min = *points.iter().min_by(|a, b| a.value_increase.cmp(&b.value_increase))?;
        let sum: Decimal = points.iter().map(|p| p.value_increase).sum();
        Some(Self {
            average: round2(sum / Decimal::from(points.len())),
            max,
            min,
        })
    }
}

// ─── Dollar yield ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DollarYield {
    pub cycle: u64,
    pub dollar_at_end: Decimal,
    /// Annualised return of the notional stake, compounded per cycle.
    pub dollar_yield: f64,
}

/// Per consecutive pair: value at the end of the later cycle of
/// [`NOTIONAL_USD`] bought at the earlier cycle's price, and its annualised
/// return `(end / 1000)^26 - 1`.
pub fn dollar_yield_report(cycles: &[CycleRecord]) -> EngineResult<Vec<DollarYield>> {
    cycles
        .windows(2)
        .map(|pair| {
            let end = end_value(&pair[0], &pair[1])?;
            let dollar_yield = annualise(from_decimal(end / NOTIONAL_USD))?;
            Ok(DollarYield {
                cycle: pair[1].cycle,
                dollar_at_end: round_usd(end),
                dollar_yield,
            })
        })
        .collect()
}

// ─── Threshold ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdPoint {
    pub cycle: u64,
    pub threshold: u64,
    /// Threshold in whole STX.
    pub threshold_stx: Decimal,
}

/// The first record, every record whose threshold differs from its
/// predecessor, and the last record.
pub fn threshold_changes(cycles: &[CycleRecord]) -> EngineResult<Vec<ThresholdPoint>> {
    let last = cycles.len().saturating_sub(1);
    cycles
        .iter()
        .enumerate()
        .filter(|(i, c)| *i == 0 || *i == last || c.threshold != cycles[i - 1].threshold)
        .map(|(_, c)| {
            Ok(ThresholdPoint {
                cycle: c.cycle,
                threshold: c.threshold,
                threshold_stx: MicroStx(u128::from(c.threshold)).to_stx()?,
            })
        })
        .collect()
}

// ─── Rewards vs block rewards ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsComparison {
    pub cycle: u64,
    pub rewards_usd: Decimal,
    pub block_rewards_usd: Decimal,
    pub difference: Decimal,
}

pub fn rewards_comparison(cycles: &[CycleRecord]) -> Vec<RewardsComparison> {
    cycles
        .iter()
        .map(|c| RewardsComparison {
            cycle: c.cycle,
            rewards_usd: c.rewards_usd,
            block_rewards_usd: c.block_rewards_usd,
            difference: c.rewards_usd - c.block_rewards_usd,
        })
        .collect()
}

// ─── Chart bundle ────────────────────────────────────────────────────────────

/// Everything the chart panels draw for one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub window: usize,
    pub value_increase: Vec<ValueIncreasePoint>,
    pub value_increase_summary: Option<ValueIncreaseSummary>,
    pub dollar_yield: Vec<DollarYield>,
    pub thresholds: Vec<ThresholdPoint>,
    pub rewards: Vec<RewardsComparison>,
}

pub fn chart_series(cycles: &[CycleRecord], window: usize) -> EngineResult<ChartSeries> {
    let shown = last_window(cycles, window);
    let value_increase = value_increase_series(cycles, window)?;
    Ok(ChartSeries {
        window,
        value_increase_summary: ValueIncreaseSummary::from_series(&value_increase),
        value_increase,
        dollar_yield: dollar_yield_report(shown)?,
        thresholds: threshold_changes(shown)?,
        rewards: rewards_comparison(shown),
    })
}

// ─── Table: sorting and CSV ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Cycle,
    CycleStart,
    CycleRewardsEnd,
    CycleStartDate,
    CycleRewardsEndDate,
    StxPriceAtEnd,
    BtcPriceAtEnd,
    BtcRewards,
    TotalStacked,
    RewardsUsd,
    BlockRewardsUsd,
    StackedUsd,
    CycleYield,
    Apy,
    Threshold,
}

impl SortField {
    fn compare(self, a: &CycleRecord, b: &CycleRecord) -> Ordering {
        match self {
            SortField::Cycle => a.cycle.cmp(&b.cycle),
            SortField::CycleStart => a.cycle_start.cmp(&b.cycle_start),
            SortField::CycleRewardsEnd => a.cycle_rewards_end.cmp(&b.cycle_rewards_end),
            SortField::CycleStartDate => a.cycle_start_date.cmp(&b.cycle_start_date),
            SortField::CycleRewardsEndDate => a.cycle_rewards_end_date.cmp(&b.cycle_rewards_end_date),
            SortField::StxPriceAtEnd => a.stx_price_at_end.cmp(&b.stx_price_at_end),
            SortField::BtcPriceAtEnd => a.btc_price_at_end.cmp(&b.btc_price_at_end),
            SortField::BtcRewards => a.btc_rewards.cmp(&b.btc_rewards),
            SortField::TotalStacked => a.total_stacked.cmp(&b.total_stacked),
            SortField::RewardsUsd => a.rewards_usd.cmp(&b.rewards_usd),
            SortField::BlockRewardsUsd => a.block_rewards_usd.cmp(&b.block_rewards_usd),
            SortField::StackedUsd => a.stacked_usd.cmp(&b.stacked_usd),
            SortField::CycleYield => a.cycle_yield.cmp(&b.cycle_yield),
            SortField::Apy => a.apy.total_cmp(&b.apy),
            SortField::Threshold => a.threshold.cmp(&b.threshold),
        }
    }
}

impl FromStr for SortField {
    type Err = EngineError;

    /// Accepts the JSON field names, e.g. `stxPriceAtEnd`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| EngineError::Config(format!("unknown sort field {s:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Stable sort, so ties keep their stored order.
pub fn sort_cycles(cycles: &mut [CycleRecord], field: SortField, direction: SortDirection) {
    cycles.sort_by(|a, b| {
        let ord = field.compare(a, b);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

pub const CSV_HEADERS: [&str; 15] = [
    "Cycle",
    "Start Block",
    "End Block",
    "Start Date",
    "End Date",
    "STX Price",
    "BTC Price",
    "BTC Rewards",
    "Total Stacked",
    "Rewards USD",
    "Block Rewards USD",
    "Stacked USD",
    "Cycle Yield",
    "APY",
    "Threshold",
];

pub fn to_csv(cycles: &[CycleRecord]) -> String {
    let mut out = CSV_HEADERS.join(",");
    for c in cycles {
        // writing to a String cannot fail
        let _ = write!(
            out,
            "\n{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            c.cycle,
            c.cycle_start,
            c.cycle_rewards_end,
            iso_millis::format(&c.cycle_start_date),
            iso_millis::format(&c.cycle_rewards_end_date),
            c.stx_price_at_end.normalize(),
            c.btc_price_at_end.normalize(),
            c.btc_rewards.normalize(),
            c.total_stacked,
            c.rewards_usd.normalize(),
            c.block_rewards_usd.normalize(),
            c.stacked_usd.normalize(),
            c.cycle_yield.normalize(),
            c.apy,
            c.threshold,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn cycle(n: u64, stx: Decimal, cycle_yield: Decimal, threshold: u64) -> CycleRecord {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(15 * n as i64);
        CycleRecord {
            cycle: n,
            cycle_start: 666_050 + n * 2100,
            cycle_rewards_end: 666_050 + n * 2100 + 2000,
            stacks_cycle_start: n * 100,
            stacks_cycle_rewards_end: n * 100 + 90,
            cycle_start_date: start,
            cycle_rewards_end_date: start + Duration::days(14),
            stx_price_at_end: stx,
            btc_price_at_end: dec!(60000),
            btc_rewards: dec!(10),
            fast_pool_v1: dec!(1),
            fast_pool_v2: dec!(0.5),
            total_stacked: MicroStx(400_000_000_000_000),
            rewards_usd: dec!(600000),
            block_rewards_usd: dec!(700000),
            stacked_usd: dec!(800000000),
            cycle_yield,
            apy: 0.1,
            threshold,
        }
    }

    fn series() -> Vec<CycleRecord> {
        vec![
            cycle(86, dec!(2.0), dec!(0.01), 100),
            cycle(87, dec!(2.5), dec!(0.01), 100),
            cycle(88, dec!(2.0), dec!(0.02), 120),
            cycle(89, dec!(2.0), dec!(0.01), 120),
            cycle(90, dec!(1.0), dec!(0.00), 120),
        ]
    }

    #[test]
    fn window_takes_tail() {
        let all = series();
        assert_eq!(last_window(&all, Viewport::Mobile.window()).len(), 3);
        assert_eq!(last_window(&all, Viewport::Desktop.window()).len(), 5);
        assert_eq!(last_window(&all, 3)[0].cycle, 88);
    }

    #[test]
    fn value_increase_against_previous_price() {
        let points = value_increase_series(&series(), DESKTOP_WINDOW).expect("test: series");
        assert_eq!(points[0].value_increase, Decimal::ZERO);
        // 500 STX -> 505 STX at 2.5 = 1262.50
        assert_eq!(points[1].value_increase, dec!(262.50));
        assert_eq!(points[1].percent_increase, dec!(26.25));
        // 400 STX -> 408 STX at 2.0 = 816
        assert_eq!(points[2].value_increase, dec!(-184));
        assert_eq!(points[4].value_increase, dec!(-500));
    }

    #[test]
    fn window_start_uses_full_history() {
        let points = value_increase_series(&series(), 2).expect("test: series");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].cycle, 89);
        // 500 STX -> 505 STX at 2.0
        assert_eq!(points[0].value_increase, dec!(10));
    }

    #[test]
    fn summary_skips_zero_first_point() {
        let points = value_increase_series(&series(), DESKTOP_WINDOW).expect("test: series");
        let summary = ValueIncreaseSummary::from_series(&points).expect("test: summary");
        assert_eq!(summary.max.cycle, 87);
        assert_eq!(summary.min.cycle, 90);
        // (262.5 - 184 + 10 - 500) / 4
        assert_eq!(summary.average, dec!(-102.88));
        assert!(ValueIncreaseSummary::from_series(&[]).is_none());
    }

    #[test]
    fn zero_price_is_a_domain_error() {
        let mut all = series();
        all[0].stx_price_at_end = Decimal::ZERO;
        assert!(value_increase_series(&all, 20).is_err());
    }

    #[test]
    fn dollar_yield_annualises() {
        let report = dollar_yield_report(&series()).expect("test: report");
        assert_eq!(report.len(), 4);
        assert_eq!(report[0].cycle, 87);
        assert_eq!(report[0].dollar_at_end, dec!(1262.5));
        // flat price and 1% yield: 1.01^26 - 1
        assert_eq!(report[2].dollar_at_end, dec!(1010));
        assert!((report[2].dollar_yield - 0.2952563).abs() < 1e-7);
    }

    #[test]
    fn threshold_keeps_changes_and_ends() {
        let points = threshold_changes(&series()).expect("test: thresholds");
        let cycles: Vec<u64> = points.iter().map(|p| p.cycle).collect();
        assert_eq!(cycles, vec![86, 88, 90]);
        assert!(threshold_changes(&[]).expect("test: empty").is_empty());
    }

    #[test]
    fn chart_series_follow_the_window() {
        let charts = chart_series(&series(), MOBILE_WINDOW).expect("test: charts");
        assert_eq!(charts.value_increase.len(), 3);
        assert_eq!(charts.value_increase[0].value_increase, dec!(-184));
        assert_eq!(charts.dollar_yield.len(), 2);
        assert_eq!(charts.thresholds.iter().map(|p| p.cycle).collect::<Vec<_>>(), vec![88, 90]);
        assert_eq!(charts.rewards[0].difference, dec!(-100000));
        let summary = charts.value_increase_summary.expect("test: summary");
        assert_eq!(summary.max.cycle, 89);
    }

    #[test]
    fn sorting_by_field_and_direction() {
        let mut all = series();
        sort_cycles(&mut all, SortField::StxPriceAtEnd, SortDirection::Desc);
        assert_eq!(all[0].cycle, 87);
        // ties keep stored order
        assert_eq!(all.iter().skip(1).take(3).map(|c| c.cycle).collect::<Vec<_>>(), vec![86, 88, 89]);
        sort_cycles(&mut all, SortField::Cycle, SortDirection::Asc);
        assert_eq!(all[0].cycle, 86);
        assert_eq!("cycleYield".parse::<SortField>().expect("test: parse"), SortField::CycleYield);
        assert!("bogus".parse::<SortField>().is_err());
    }

    #[test]
    fn csv_has_table_headers() {
        let csv = to_csv(&series()[..1]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Cycle,Start Block,End Block,Start Date,End Date,STX Price,BTC Price,BTC Rewards,Total Stacked,Rewards USD,Block Rewards USD,Stacked USD,Cycle Yield,APY,Threshold")
        );
        let row = lines.next().expect("test: row");
        assert!(row.starts_with("86,846650,848650,"), "{row}");
        assert!(row.contains(",400000000000000,"));
        assert!(row.ends_with(",0.01,0.1,100"), "{row}");
        assert_eq!(lines.next(), None);
    }
}
