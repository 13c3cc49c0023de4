// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Synthetic Cycle Generator

//! Fabricates the cycle following a known one when no real data exists yet.
//!
//! The random source is injected so projections are reproducible: production
//! seeds a [`ChaCha8Rng`], tests pass fixed seeds or a mock RNG.

use chrono::Duration;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;

use crate::adapter::to_decimal;
use crate::error::{EngineError, EngineResult};
use crate::metrics::{round_price, round_reward, round_usd, DerivedMetrics};
use crate::params::{FactorRange, GeneratorParams};
use crate::schedule::REWARD_PHASE;
use crate::types::{CycleInputs, CycleRecord, MicroStx};

const GAP_BETWEEN_CYCLES_DAYS: i64 = 1;
const CYCLE_DURATION_DAYS: i64 = 14;

pub struct CycleGenerator<R> {
    rng: R,
    params: GeneratorParams,
}

impl CycleGenerator<ChaCha8Rng> {
    /// Deterministic generator with default parameters.
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> CycleGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self::with_params(rng, GeneratorParams::default())
    }

    pub fn with_params(rng: R, params: GeneratorParams) -> Self {
        Self { rng, params }
    }

    pub fn params(&self) -> &GeneratorParams {
        &self.params
    }

    /// Produce the cycle after `previous`.
    ///
    /// Sequencing, block bounds and dates are deterministic; prices, rewards,
    /// stake, threshold steps and stacks heights are drawn from the RNG. All
    /// derived fields are recomputed from the drawn values.
    pub fn next_cycle(&mut self, previous: &CycleRecord) -> EngineResult<CycleRecord> {
        let cycle = previous
            .cycle
            .checked_add(1)
            .ok_or_else(|| EngineError::domain("cycle number overflow"))?;
        let cycle_start = previous.next_cycle_start();
        let cycle_rewards_end = cycle_start
            .checked_add(REWARD_PHASE)
            .ok_or_else(|| EngineError::domain("cycle bounds overflow"))?;

        let stx_price_at_end = round_price(self.scale(previous.stx_price_at_end, self.params.stx_price)?);
        let btc_price_at_end = round_price(self.scale(previous.btc_price_at_end, self.params.btc_price)?);

        let btc_rewards = round_reward(self.scale(previous.btc_rewards, self.params.rewards)?);
        let fast_pool_v1 = round_reward(self.scale(previous.fast_pool_v1, self.params.rewards)?);
        let fast_pool_v2 = round_reward(
            self.scale(previous.fast_pool_v2, self.params.rewards)? + self.params.fast_pool_v2_floor,
        );

        let total_stacked = self
            .scale(previous.total_stacked.to_decimal()?, self.params.total_stacked)
            .and_then(MicroStx::from_decimal_floor)?;

        let threshold = if self.rng.gen_bool(self.params.threshold_step_probability) {
            previous
                .threshold
                .checked_add(self.params.threshold_step)
                .ok_or_else(|| EngineError::domain("threshold overflow"))?
        } else {
            previous.threshold
        };

        let cycle_start_date = previous.cycle_rewards_end_date + Duration::days(GAP_BETWEEN_CYCLES_DAYS);
        let cycle_rewards_end_date = cycle_start_date + Duration::days(CYCLE_DURATION_DAYS);

        // Cosmetic only: stacks heights do not track the burn chain here.
        let stacks_overflow = || EngineError::domain("stacks height overflow");
        let start_offset = self.offset(self.params.stacks_start_jitter);
        let span_offset = self.offset(self.params.stacks_span_jitter);
        let stacks_cycle_start = previous
            .stacks_cycle_rewards_end
            .checked_add(start_offset)
            .ok_or_else(stacks_overflow)?;
        let stacks_cycle_rewards_end = stacks_cycle_start
            .checked_add(self.params.stacks_min_span)
            .and_then(|h| h.checked_add(span_offset))
            .ok_or_else(stacks_overflow)?;

        let inputs = CycleInputs {
            cycle,
            cycle_start,
            cycle_rewards_end,
            stacks_cycle_start,
            stacks_cycle_rewards_end,
            cycle_start_date,
            cycle_rewards_end_date,
            stx_price_at_end,
            btc_price_at_end,
            btc_rewards,
            fast_pool_v1,
            fast_pool_v2,
            total_stacked,
            threshold,
        };

        let metrics = DerivedMetrics::compute(&inputs)?;
        let block_rewards_usd = round_usd(self.scale(metrics.rewards_usd, self.params.block_rewards)?);

        Ok(inputs.into_record(metrics, block_rewards_usd))
    }

    /// `value * U[low, high]`.
    fn scale(&mut self, value: Decimal, range: FactorRange) -> EngineResult<Decimal> {
        let factor = to_decimal(self.rng.gen_range(range.low..=range.high))?;
        value
            .checked_mul(factor)
            .ok_or_else(|| EngineError::domain(format!("{value} x {factor} overflows")))
    }

    fn offset(&mut self, jitter: u64) -> u64 {
        if jitter == 0 {
            0
        } else {
            self.rng.gen_range(0..jitter)
        }
    }
}
