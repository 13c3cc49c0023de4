// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Projection Parameters

//! Tunables of the synthetic cycle generator and the catch-up projector.
//!
//! Projected cycles are a bounded multiplicative random walk over the last
//! known cycle. None of these ranges model a market; they only keep the
//! charts plausible until real data replaces the projection.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Safety bound on cycles fabricated by a single catch-up.
pub const MAX_GENERATED_CYCLES: usize = 10;

// ---------------------------------------------------------------------------
// FactorRange
// ---------------------------------------------------------------------------

/// Closed interval a multiplicative factor is drawn from, uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorRange {
    pub low: f64,
    pub high: f64,
}

impl FactorRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    fn validate(&self, name: &str) -> EngineResult<()> {
        if !(self.low.is_finite() && self.high.is_finite()) || self.low < 0.0 || self.low > self.high {
            return Err(EngineError::Config(format!(
                "{name}: factor range [{}, {}] must be finite, non-negative and ordered",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GeneratorParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorParams {
    pub stx_price: FactorRange,
    pub btc_price: FactorRange,
    /// Applied independently to btcRewards, fastPoolV1 and fastPoolV2.
    pub rewards: FactorRange,
    /// Added to fastPoolV2 so an empty pool does not stay at zero forever.
    pub fast_pool_v2_floor: Decimal,
    pub total_stacked: FactorRange,
    /// Block rewards of a projected cycle, relative to its rewards in USD.
    pub block_rewards: FactorRange,
    /// Chance per cycle that the stacking threshold steps up.
    pub threshold_step_probability: f64,
    /// Threshold increment in microunits.
    pub threshold_step: u64,
    /// Stacks start = previous stacks end + U{0..jitter}.
    pub stacks_start_jitter: u64,
    /// Stacks end = stacks start + min span + U{0..jitter}.
    pub stacks_min_span: u64,
    pub stacks_span_jitter: u64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            stx_price: FactorRange::new(0.8, 1.2),
            btc_price: FactorRange::new(0.9, 1.2),
            rewards: FactorRange::new(0.8, 1.3),
            fast_pool_v2_floor: dec!(0.01),
            total_stacked: FactorRange::new(0.95, 1.10),
            block_rewards: FactorRange::new(0.9, 1.3),
            threshold_step_probability: 0.1,
            threshold_step: 10_000_000_000,
            stacks_start_jitter: 10_000,
            stacks_min_span: 10_000,
            stacks_span_jitter: 50_000,
        }
    }
}

impl GeneratorParams {
    pub fn validate(&self) -> EngineResult<()> {
        self.stx_price.validate("stx_price")?;
        self.btc_price.validate("btc_price")?;
        self.rewards.validate("rewards")?;
        self.total_stacked.validate("total_stacked")?;
        self.block_rewards.validate("block_rewards")?;
        if !(0.0..=1.0).contains(&self.threshold_step_probability) {
            return Err(EngineError::Config(format!(
                "threshold_step_probability {} outside [0, 1]",
                self.threshold_step_probability
            )));
        }
        if self.fast_pool_v2_floor.is_sign_negative() {
            return Err(EngineError::Config("fast_pool_v2_floor must not be negative".into()));
        }
        Ok(())
    }
}
