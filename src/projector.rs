// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Catch-Up Projector

//! Extends a cycle series with synthetic cycles until it reaches the live
//! burn-chain height.

use log::{info, warn};
use rand::Rng;

use crate::error::{EngineError, EngineResult};
use crate::generator::CycleGenerator;
use crate::types::CycleRecord;

/// Result of a catch-up: the full sequence plus the records appended to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub cycles: Vec<CycleRecord>,
    pub new_cycles: Vec<CycleRecord>,
}

impl Projection {
    pub fn generated(&self) -> usize {
        self.new_cycles.len()
    }
}

/// True once the chain has passed the proof-of-burn window after `last`.
pub fn needs_projection(last: &CycleRecord, current_height: u64) -> bool {
    current_height >= last.next_cycle_start()
}

/// Append synthetic cycles while `current_height` is past the end of the last
/// cycle, at most `max_new` of them.
///
/// Any generator error aborts the whole projection.
pub fn project<R: Rng>(
    cycles: &[CycleRecord],
    current_height: u64,
    generator: &mut CycleGenerator<R>,
    max_new: usize,
) -> EngineResult<Projection> {
    let mut last = cycles.last().ok_or(EngineError::EmptyStore)?.clone();
    let mut new_cycles = Vec::new();

    while needs_projection(&last, current_height) {
        if new_cycles.len() >= max_new {
            warn!(
                "projection stopped at {max_new} new cycles; height {current_height} still past cycle {} end {}",
                last.cycle, last.cycle_rewards_end
            );
            break;
        }
        let next = generator.next_cycle(&last)?;
        info!(
            "generated cycle {} [{}..{}] stx={} apy={}",
            next.cycle, next.cycle_start, next.cycle_rewards_end, next.stx_price_at_end, next.apy
        );
        new_cycles.push(next.clone());
        last = next;
    }

    let mut all = Vec::with_capacity(cycles.len() + new_cycles.len());
    all.extend_from_slice(cycles);
    all.extend(new_cycles.iter().cloned());
    Ok(Projection {
        cycles: all,
        new_cycles,
    })
}
