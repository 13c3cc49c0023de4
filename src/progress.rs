// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Cycle Progress

//! Completion of the in-progress cycle, split into the regular reward phase
//! and the trailing proof-of-burn window.

use serde::{Deserialize, Serialize};

use crate::schedule::{CYCLE_LENGTH, MINUTES_PER_BLOCK, PREPARE_BUFFER, REWARD_PHASE};
use crate::types::CycleRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleProgress {
    pub blocks_completed: u64,
    pub fraction_complete: f64,
    pub in_proof_of_burn: bool,
    pub pob_blocks: u64,
    pub pob_fraction: f64,
    /// Progress through the reward phase alone.
    pub regular_fraction: f64,
    pub blocks_remaining: u64,
    pub time_remaining: String,
}

impl CycleProgress {
    /// All-zero progress, used when the cycle or the height is unknown.
    pub fn unknown() -> Self {
        Self {
            blocks_completed: 0,
            fraction_complete: 0.0,
            in_proof_of_burn: false,
            pob_blocks: 0,
            pob_fraction: 0.0,
            regular_fraction: 0.0,
            blocks_remaining: 0,
            time_remaining: String::new(),
        }
    }

    pub fn compute(cycle: Option<&CycleRecord>, height: Option<u64>) -> Self {
        match (cycle, height) {
            (Some(cycle), Some(height)) => Self::at(cycle.cycle_start, height),
            _ => Self::unknown(),
        }
    }

    /// Progress of a cycle opening at `cycle_start` when the chain is at `height`.
    pub fn at(cycle_start: u64, height: u64) -> Self {
        let blocks_completed = height.saturating_sub(cycle_start).min(CYCLE_LENGTH);
        let pob_blocks = blocks_completed.saturating_sub(REWARD_PHASE).min(PREPARE_BUFFER);
        let blocks_remaining = CYCLE_LENGTH - blocks_completed;

        Self {
            blocks_completed,
            fraction_complete: blocks_completed as f64 / CYCLE_LENGTH as f64,
            in_proof_of_burn: blocks_completed >= REWARD_PHASE,
            pob_blocks,
            pob_fraction: pob_blocks as f64 / PREPARE_BUFFER as f64,
            regular_fraction: blocks_completed.min(REWARD_PHASE) as f64 / REWARD_PHASE as f64,
            blocks_remaining,
            time_remaining: format_time_remaining(blocks_remaining * MINUTES_PER_BLOCK),
        }
    }

    pub fn percent_complete(&self) -> u64 {
        (self.fraction_complete * 100.0).floor() as u64
    }

    pub fn is_completed(&self) -> bool {
        self.blocks_completed == CYCLE_LENGTH
    }
}

/// `"Xd Yh Zm"`, `"Yh Zm"` or `"Zm"`.
pub fn format_time_remaining(minutes: u64) -> String {
    let days = minutes / (24 * 60);
    let hours = (minutes % (24 * 60)) / 60;
    let mins = minutes % 60;
    if days > 0 {
        format!("{days}d {hours}h {mins}m")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_of_a_cycle() {
        let start = CycleProgress::at(5000, 5000);
        assert_eq!(start.fraction_complete, 0.0);
        assert_eq!(start.blocks_remaining, 2100);
        assert!(!start.in_proof_of_burn);

        let end = CycleProgress::at(5000, 7100);
        assert_eq!(end.fraction_complete, 1.0);
        assert_eq!(end.pob_fraction, 1.0);
        assert!(end.is_completed());
        assert_eq!(end.time_remaining, "0m");
    }

    #[test]
    fn clamps_outside_the_cycle() {
        assert_eq!(CycleProgress::at(5000, 4000).blocks_completed, 0);
        assert_eq!(CycleProgress::at(5000, 9000).blocks_completed, 2100);
    }

    #[test]
    fn proof_of_burn_window() {
        let p = CycleProgress::at(0, 2050);
        assert!(p.in_proof_of_burn);
        assert_eq!(p.pob_blocks, 50);
        assert_eq!(p.pob_fraction, 0.5);
        assert_eq!(p.regular_fraction, 1.0);
        assert_eq!(p.percent_complete(), 97);
    }

    #[test]
    fn missing_inputs_give_zero_progress() {
        assert_eq!(CycleProgress::compute(None, Some(10)), CycleProgress::unknown());
    }

    #[test]
    fn time_formats() {
        assert_eq!(format_time_remaining(45), "45m");
        assert_eq!(format_time_remaining(125), "2h 5m");
        // 2100 blocks at 10 minutes
        assert_eq!(format_time_remaining(21_000), "14d 14h 0m");
    }
}
