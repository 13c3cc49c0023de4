// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Metric Derivation

//! USD valuation, cycle yield and APY.
//!
//! ```text
//! rewards_usd = btc_rewards * btc_price
//! stacked_usd = total_stacked_ustx * stx_price / 1_000_000
//! cycle_yield = rewards_usd / stacked_usd
//! apy         = (1 + cycle_yield)^26 - 1
//! ```
//!
//! APY compounds over 26 cycles per year. An earlier dashboard revision used
//! the linear `cycle_yield * 26`; stores produced by either are readable but
//! everything this crate writes uses the compound form.
//!
//! APY is an `f64`. Twenty-six compoundings of a projected yield leave the
//! 28-digit Decimal range long before they leave the f64 range.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::adapter::from_decimal;
use crate::error::{EngineError, EngineResult};
use crate::types::{CycleInputs, CycleRecord, MicroStx};

pub const CYCLES_PER_YEAR: u64 = 26;

/// STX minted per burn block, used to value a whole cycle's block rewards.
const STX_PER_BLOCK: Decimal = dec!(1000);

/// Fractional digits kept for USD prices.
pub const PRICE_DP: u32 = 10;
/// Fractional digits kept for every USD-valued and yield field.
pub const USD_DP: u32 = 10;
/// Fractional digits kept for BTC reward amounts.
pub const REWARD_DP: u32 = 6;

pub fn round_price(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(PRICE_DP, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_usd(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(USD_DP, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_reward(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(REWARD_DP, RoundingStrategy::MidpointAwayFromZero)
}

pub fn rewards_usd(amount: Decimal, asset_price: Decimal) -> EngineResult<Decimal> {
    amount
        .checked_mul(asset_price)
        .ok_or_else(|| EngineError::domain(format!("rewards overflow: {amount} x {asset_price}")))
}

pub fn stacked_usd(total_stacked: MicroStx, token_price: Decimal) -> EngineResult<Decimal> {
    total_stacked
        .to_stx()?
        .checked_mul(token_price)
        .ok_or_else(|| EngineError::domain(format!("stacked value overflow: {total_stacked} x {token_price}")))
}

/// Fails instead of dividing by zero; a NaN yield must never reach the store.
pub fn cycle_yield(rewards_usd: Decimal, stacked_usd: Decimal) -> EngineResult<Decimal> {
    if stacked_usd.is_zero() {
        return Err(EngineError::domain("cycle yield undefined: stacked value is zero"));
    }
    rewards_usd
        .checked_div(stacked_usd)
        .ok_or_else(|| EngineError::domain(format!("yield overflow: {rewards_usd} / {stacked_usd}")))
}

/// `growth^26 - 1` for a per-cycle growth factor. Fails only when the
/// result is not a finite f64.
pub fn annualise(growth: f64) -> EngineResult<f64> {
    let annual = growth.powi(CYCLES_PER_YEAR as i32) - 1.0;
    if !annual.is_finite() {
        return Err(EngineError::domain(format!("annualised growth {growth} is not finite")));
    }
    Ok(annual)
}

/// Compound annualisation over [`CYCLES_PER_YEAR`].
pub fn apy(cycle_yield: Decimal) -> EngineResult<f64> {
    annualise(1.0 + from_decimal(cycle_yield))
}

/// USD value of all STX block rewards minted over one canonical cycle.
pub fn collected_block_rewards_usd(stx_price: Decimal) -> EngineResult<Decimal> {
    let per_cycle = Decimal::from(crate::schedule::CYCLE_LENGTH) * STX_PER_BLOCK;
    per_cycle
        .checked_mul(stx_price)
        .map(round_usd)
        .ok_or_else(|| EngineError::domain(format!("block rewards overflow at price {stx_price}")))
}

// ─── DerivedMetrics ──────────────────────────────────────────────────────────

/// Every field of a [`CycleRecord`] that is computed rather than observed,
/// apart from block rewards (which differ between real and projected cycles).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub rewards_usd: Decimal,
    pub stacked_usd: Decimal,
    pub cycle_yield: Decimal,
    pub apy: f64,
}

impl DerivedMetrics {
    /// Derive from raw cycle inputs. Yield is computed from the rounded USD
    /// values so the stored fields always satisfy `yield = rewards / stacked`.
    pub fn compute(inputs: &CycleInputs) -> EngineResult<Self> {
        let rewards_usd = round_usd(rewards_usd(inputs.btc_rewards, inputs.btc_price_at_end)?);
        let stacked_usd = round_usd(stacked_usd(inputs.total_stacked, inputs.stx_price_at_end)?);
        let cycle_yield = cycle_yield(rewards_usd, stacked_usd)?;
        let apy = apy(cycle_yield)?;
        Ok(Self {
            rewards_usd,
            stacked_usd,
            cycle_yield: round_usd(cycle_yield),
            apy,
        })
    }
}

/// Recompute `rewards / stacked` from a stored record.
pub fn recomputed_yield(record: &CycleRecord) -> EngineResult<Decimal> {
    cycle_yield(record.rewards_usd, record.stacked_usd)
}
