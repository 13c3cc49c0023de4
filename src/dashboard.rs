// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Dashboard Pipeline

//! One refresh: fetch height, load store, project, persist, respond.
//!
//! Refreshes are serialised through a single lock around the store and the
//! generator, so two callers in one process never interleave a
//! read-modify-write of the store.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{error, info};
use rand::Rng;

use crate::chain::ChainHeightSource;
use crate::error::{EngineError, EngineResult};
use crate::generator::CycleGenerator;
use crate::params::MAX_GENERATED_CYCLES;
use crate::progress::CycleProgress;
use crate::projector::project;
use crate::store::CycleStore;
use crate::types::{
    ApiResponse, BlockHeightPayload, BlockHeightResponse, CyclesPayload, CyclesResponse, DashboardResponse,
    DashboardSnapshot,
};

/// What happened to the store during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// Nothing new was generated.
    Skipped,
    Saved,
    /// The projection succeeded but could not be written back.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub response: DashboardResponse,
    pub write: WriteStatus,
}

impl RefreshOutcome {
    /// False only when generated cycles were lost because the save failed.
    pub fn persisted(&self) -> bool {
        !matches!(self.write, WriteStatus::Failed(_))
    }

    fn failed(err: &EngineError) -> Self {
        Self {
            response: ApiResponse::failure(err),
            write: WriteStatus::Skipped,
        }
    }
}

/// Load, project and persist against an already known height.
///
/// A save failure does not fail the refresh: the extended sequence is still
/// returned and the failure is reported through [`WriteStatus::Failed`].
pub fn refresh_at<S, R>(
    store: &S,
    height: u64,
    generator: &mut CycleGenerator<R>,
    max_new: usize,
    now: DateTime<Utc>,
) -> EngineResult<(DashboardSnapshot, WriteStatus)>
where
    S: CycleStore + ?Sized,
    R: Rng,
{
    let existing = store.load()?;
    let projection = project(&existing, height, generator, max_new)?;

    let write = if projection.new_cycles.is_empty() {
        WriteStatus::Skipped
    } else {
        match store.save(&projection.cycles) {
            Ok(()) => {
                info!("stored {} new cycles at height {height}", projection.new_cycles.len());
                WriteStatus::Saved
            }
            Err(e) => {
                error!("failed to persist {} new cycles: {e}", projection.new_cycles.len());
                WriteStatus::Failed(e.to_string())
            }
        }
    };

    let snapshot = DashboardSnapshot {
        success: true,
        block_height: height,
        timestamp: now,
        new_cycles_generated: projection.new_cycles.len(),
        cycles: projection.cycles,
        new_cycles: projection.new_cycles,
    };
    Ok((snapshot, write))
}

struct Writer<S, R> {
    store: S,
    generator: CycleGenerator<R>,
}

pub struct Dashboard<S, H, R> {
    writer: Mutex<Writer<S, R>>,
    heights: H,
    max_new: usize,
}

impl<S, H, R> Dashboard<S, H, R>
where
    S: CycleStore,
    H: ChainHeightSource,
    R: Rng,
{
    pub fn new(store: S, heights: H, generator: CycleGenerator<R>) -> Self {
        Self {
            writer: Mutex::new(Writer { store, generator }),
            heights,
            max_new: MAX_GENERATED_CYCLES,
        }
    }

    pub fn with_max_new(mut self, max_new: usize) -> Self {
        self.max_new = max_new;
        self
    }

    /// Full refresh against the live height.
    pub fn refresh(&self) -> RefreshOutcome {
        match self.heights.current_height() {
            Ok(height) => self.refresh_with_height(height),
            Err(e) => {
                error!("height fetch failed: {e}");
                RefreshOutcome::failed(&e)
            }
        }
    }

    pub fn refresh_with_height(&self, height: u64) -> RefreshOutcome {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(_) => return RefreshOutcome::failed(&poisoned()),
        };
        let Writer { store, generator } = &mut *writer;
        match refresh_at(&*store, height, generator, self.max_new, Utc::now()) {
            Ok((snapshot, write)) => RefreshOutcome {
                response: ApiResponse::Success(snapshot),
                write,
            },
            Err(e) => {
                error!("refresh at height {height} failed: {e}");
                RefreshOutcome::failed(&e)
            }
        }
    }

    /// Stored sequence without projecting.
    pub fn cycles(&self) -> CyclesResponse {
        match self.load() {
            Ok(data) => ApiResponse::Success(CyclesPayload { success: true, data }),
            Err(e) => ApiResponse::failure(&e),
        }
    }

    pub fn block_height(&self) -> BlockHeightResponse {
        match self.heights.current_height() {
            Ok(block_height) => ApiResponse::Success(BlockHeightPayload {
                success: true,
                block_height,
                timestamp: Utc::now(),
            }),
            Err(e) => ApiResponse::failure(&e),
        }
    }

    /// Progress of the last stored cycle. An unknown height or an empty
    /// store gives zero progress rather than an error.
    pub fn progress(&self, height: Option<u64>) -> CycleProgress {
        let last = self.load().ok().and_then(|cycles| cycles.last().cloned());
        let height = height.or_else(|| self.heights.current_height().ok());
        CycleProgress::compute(last.as_ref(), height)
    }

    fn load(&self) -> EngineResult<Vec<crate::types::CycleRecord>> {
        let writer = self.writer.lock().map_err(|_| poisoned())?;
        writer.store.load()
    }
}

fn poisoned() -> EngineError {
    EngineError::Persistence("dashboard lock poisoned by an earlier panic".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::FixedHeight;
    use crate::store::MemoryStore;
    use crate::types::{CycleRecord, MicroStx};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn seed() -> CycleRecord {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        CycleRecord {
            cycle: 100,
            cycle_start: 1000,
            cycle_rewards_end: 3000,
            stacks_cycle_start: 10,
            stacks_cycle_rewards_end: 20,
            cycle_start_date: start,
            cycle_rewards_end_date: start + Duration::days(14),
            stx_price_at_end: dec!(2.0),
            btc_price_at_end: dec!(60000),
            btc_rewards: dec!(5),
            fast_pool_v1: dec!(1),
            fast_pool_v2: dec!(1),
            total_stacked: MicroStx(1_000_000_000_000),
            rewards_usd: dec!(300000),
            block_rewards_usd: dec!(300000),
            stacked_usd: dec!(2000000),
            cycle_yield: dec!(0.15),
            apy: 36.8568,
            threshold: 100_000_000_000,
        }
    }

    struct DownChain;

    impl ChainHeightSource for DownChain {
        fn current_height(&self) -> EngineResult<u64> {
            Err(EngineError::upstream_status("https://api.test/v2/info", 503))
        }
    }

    #[test]
    fn refresh_at_persists_only_new_cycles() {
        let store = MemoryStore::new(vec![seed()]);
        let mut gen = CycleGenerator::seeded(4);
        let now = Utc::now();

        let (snapshot, write) = refresh_at(&store, 3000, &mut gen, 10, now).expect("test: refresh");
        assert_eq!(write, WriteStatus::Skipped);
        assert_eq!(snapshot.new_cycles_generated, 0);

        let (snapshot, write) = refresh_at(&store, 3150, &mut gen, 10, now).expect("test: refresh");
        assert_eq!(write, WriteStatus::Saved);
        assert_eq!(snapshot.new_cycles_generated, 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn save_failure_is_a_degraded_success() {
        let dashboard = Dashboard::new(MemoryStore::read_only(vec![seed()]), FixedHeight(3150), CycleGenerator::seeded(4));
        let outcome = dashboard.refresh();
        assert!(outcome.response.is_success());
        assert!(!outcome.persisted());
        match outcome.response {
            ApiResponse::Success(snapshot) => assert_eq!(snapshot.cycles.len(), 2),
            ApiResponse::Failure(body) => panic!("unexpected failure {body:?}"),
        }
    }

    #[test]
    fn empty_store_answers_400() {
        let dashboard = Dashboard::new(MemoryStore::default(), FixedHeight(3150), CycleGenerator::seeded(4));
        let outcome = dashboard.refresh();
        assert_eq!(outcome.response.http_status(), 400);
    }

    #[test]
    fn height_failure_answers_500() {
        let dashboard = Dashboard::new(MemoryStore::new(vec![seed()]), DownChain, CycleGenerator::seeded(4));
        let outcome = dashboard.refresh();
        assert_eq!(outcome.response.http_status(), 500);
        assert!(matches!(dashboard.block_height(), ApiResponse::Failure(_)));
        // progress degrades to zero without a height
        assert_eq!(dashboard.progress(None), CycleProgress::unknown());
    }

    #[test]
    fn progress_uses_last_stored_cycle() {
        let dashboard = Dashboard::new(MemoryStore::new(vec![seed()]), FixedHeight(2050), CycleGenerator::seeded(4));
        let p = dashboard.progress(None);
        assert_eq!(p.blocks_completed, 1050);
        assert_eq!(dashboard.progress(Some(1000)).blocks_completed, 0);
    }
}
