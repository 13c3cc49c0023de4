//! Canonical PoX reward-cycle schedule on the burn chain.
//!
//! A cycle spans `CYCLE_LENGTH` burn blocks: a `REWARD_PHASE` during which
//! rewards are paid, followed by a `PREPARE_BUFFER` (the proof-of-burn window)
//! before the next cycle opens.

/// Burn height at which cycle 0 starts.
pub const FIRST_BURN_HEIGHT: u64 = 666_050;
pub const CYCLE_LENGTH: u64 = 2_100;
pub const REWARD_PHASE: u64 = 2_000;
pub const PREPARE_BUFFER: u64 = CYCLE_LENGTH - REWARD_PHASE;

/// Average burn-chain block interval.
pub const MINUTES_PER_BLOCK: u64 = 10;

pub fn cycle_start(cycle: u64) -> u64 {
    FIRST_BURN_HEIGHT + cycle * CYCLE_LENGTH
}

pub fn cycle_rewards_end(cycle: u64) -> u64 {
    FIRST_BURN_HEIGHT + (cycle + 1) * CYCLE_LENGTH - PREPARE_BUFFER
}

/// Cycle containing `burn_height`, `None` before the first cycle.
pub fn cycle_at(burn_height: u64) -> Option<u64> {
    burn_height
        .checked_sub(FIRST_BURN_HEIGHT)
        .map(|offset| offset / CYCLE_LENGTH)
}
