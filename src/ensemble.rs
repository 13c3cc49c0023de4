// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Projection Ensemble

//! Monte Carlo over the cycle generator: N independent projections from the
//! same seed data, seeds `base_seed..base_seed + N`, aggregated per metric
//! with mean and a 95% confidence interval.
//!
//! Informational only. Ensemble cycles are never stored.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapter::from_decimal;
use crate::error::{EngineError, EngineResult};
use crate::generator::CycleGenerator;
use crate::params::GeneratorParams;
use crate::report::NOTIONAL_USD;
use crate::types::{CycleRecord, MicroStx};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let half_width = 1.96 * std_dev / (n as f64).sqrt();
        Self {
            mean,
            std_dev,
            ci_lower: mean - half_width,
            ci_upper: mean + half_width,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

/// End state of one projected path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathOutcome {
    pub seed: u64,
    pub final_cycle: u64,
    pub final_apy: f64,
    pub final_stx_price: Decimal,
    pub final_threshold: u64,
    /// Gain on the notional stake held and restaked across the whole horizon.
    pub cumulative_value_increase: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleReport {
    pub runs: usize,
    pub horizon: usize,
    pub base_seed: u64,
    pub start_cycle: u64,
    pub final_apy: Stats,
    pub final_stx_price: Stats,
    /// Threshold in whole STX.
    pub final_threshold: Stats,
    pub cumulative_value_increase: Stats,
}

/// Project one path of `horizon` cycles after `last`.
pub fn run_path(last: &CycleRecord, horizon: usize, seed: u64, params: &GeneratorParams) -> EngineResult<PathOutcome> {
    let mut generator = CycleGenerator::with_params(ChaCha8Rng::seed_from_u64(seed), params.clone());
    let entry_price = last.stx_price_at_end;
    let mut stx_held = NOTIONAL_USD
        .checked_div(entry_price)
        .ok_or_else(|| EngineError::domain(format!("cycle {} has no STX price", last.cycle)))?;

    let mut current = last.clone();
    for _ in 0..horizon {
        current = generator.next_cycle(&current)?;
        stx_held = stx_held
            .checked_mul(Decimal::ONE + current.cycle_yield)
            .ok_or_else(|| EngineError::domain("restaked amount overflows"))?;
    }
    let final_value = stx_held
        .checked_mul(current.stx_price_at_end)
        .ok_or_else(|| EngineError::domain("final value overflows"))?;

    Ok(PathOutcome {
        seed,
        final_cycle: current.cycle,
        final_apy: current.apy,
        final_stx_price: current.stx_price_at_end,
        final_threshold: current.threshold,
        cumulative_value_increase: final_value - NOTIONAL_USD,
    })
}

pub fn run_ensemble(
    seed_cycles: &[CycleRecord],
    horizon: usize,
    runs: usize,
    base_seed: u64,
    params: &GeneratorParams,
) -> EngineResult<EnsembleReport> {
    let last = seed_cycles.last().ok_or(EngineError::EmptyStore)?;
    if horizon == 0 || runs == 0 {
        return Err(EngineError::Config("ensemble needs a positive horizon and run count".into()));
    }
    params.validate()?;

    let outcomes = (0..runs as u64)
        .map(|i| run_path(last, horizon, base_seed.wrapping_add(i), params))
        .collect::<EngineResult<Vec<_>>>()?;

    let sample = |f: &dyn Fn(&PathOutcome) -> Decimal| -> Stats {
        let values: Vec<f64> = outcomes.iter().map(|o| from_decimal(f(o))).collect();
        Stats::from_samples(&values)
    };
    let final_threshold = outcomes
        .iter()
        .map(|o| MicroStx(u128::from(o.final_threshold)).to_stx().map(from_decimal))
        .collect::<EngineResult<Vec<_>>>()?;

    Ok(EnsembleReport {
        runs,
        horizon,
        base_seed,
        start_cycle: last.cycle,
        final_apy: Stats::from_samples(&outcomes.iter().map(|o| o.final_apy).collect::<Vec<_>>()),
        final_stx_price: sample(&|o| o.final_stx_price),
        final_threshold: Stats::from_samples(&final_threshold),
        cumulative_value_increase: sample(&|o| o.cumulative_value_increase),
    })
}
