// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Cycle Collector

//! Builds real cycle records from the chain, the reward ledger and daily
//! prices. Native only; gated in lib.rs.

mod node;
mod prices;
mod rewards;

pub use node::StacksNodeClient;
pub use prices::CoinGeckoPrices;
pub use rewards::{PgRewardLedger, FAST_POOL_V1, FAST_POOL_V2};

use std::ops::RangeInclusive;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::metrics::{collected_block_rewards_usd, round_reward, DerivedMetrics};
use crate::schedule::{cycle_rewards_end, cycle_start};
use crate::store::{CycleStore, JsonFileStore};
use crate::types::{CycleInputs, CycleRecord, MicroStx};

/// Heights probed around a burn block before giving up on finding a
/// stacks block anchored to it.
pub const DEFAULT_MAX_PROBE: u64 = 50;

/// Stacks block anchored to a burn block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StacksBlock {
    pub height: u64,
    pub burn_block_height: u64,
    pub block_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePair {
    pub btc: Decimal,
    pub stx: Decimal,
}

/// Rewards of one cycle in BTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRewards {
    pub total: Decimal,
    pub fast_pool_v1: Decimal,
    pub fast_pool_v2: Decimal,
}

#[async_trait]
pub trait StacksChain: Send + Sync {
    /// Stacks block anchored at `burn_height`, `None` when there is none.
    async fn block_at_burn_height(&self, burn_height: u64) -> EngineResult<Option<StacksBlock>>;

    async fn total_stacked(&self, cycle: u64) -> EngineResult<MicroStx>;

    /// Minimum stake for the given participation, evaluated at `stacks_height`.
    async fn threshold(&self, total_stacked: MicroStx, stacks_height: u64) -> EngineResult<u64>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn prices_on(&self, date: NaiveDate) -> EngineResult<PricePair>;
}

#[async_trait]
pub trait RewardLedger: Send + Sync {
    async fn rewards(&self, cycle: u64) -> EngineResult<CycleRewards>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Forward,
    Backward,
}

pub struct CycleCollector<C, P, L> {
    chain: C,
    prices: P,
    ledger: L,
    max_probe: u64,
}

impl<C, P, L> CycleCollector<C, P, L>
where
    C: StacksChain,
    P: PriceSource,
    L: RewardLedger,
{
    pub fn new(chain: C, prices: P, ledger: L) -> Self {
        Self {
            chain,
            prices,
            ledger,
            max_probe: DEFAULT_MAX_PROBE,
        }
    }

    pub fn with_max_probe(mut self, max_probe: u64) -> Self {
        self.max_probe = max_probe;
        self
    }

    async fn find_block(&self, burn_height: u64, probe: Probe) -> EngineResult<StacksBlock> {
        let mut height = burn_height;
        for _ in 0..=self.max_probe {
            if let Some(block) = self.chain.block_at_burn_height(height).await? {
                return Ok(block);
            }
            debug!("no stacks block at burn height {height}");
            height = match probe {
                Probe::Forward => height + 1,
                Probe::Backward => match height.checked_sub(1) {
                    Some(h) => h,
                    None => break,
                },
            };
        }
        Err(EngineError::upstream(
            "block_at_burn_height",
            format!("no stacks block within {} burn blocks of {burn_height}", self.max_probe),
        ))
    }

    pub async fn collect_cycle(&self, cycle: u64) -> EngineResult<CycleRecord> {
        let start = cycle_start(cycle);
        let rewards_end = cycle_rewards_end(cycle);

        let start_block = self.find_block(start, Probe::Forward).await?;
        let end_block = self.find_block(rewards_end, Probe::Backward).await?;
        let total_stacked = self.chain.total_stacked(cycle).await?;
        let rewards = self.ledger.rewards(cycle).await?;
        let prices = self.prices.prices_on(end_block.block_time.date_naive()).await?;

        let threshold_height = match end_block.height.saturating_sub(1) {
            0 => start_block.height + 1,
            h => h,
        };
        let threshold = self.chain.threshold(total_stacked, threshold_height).await?;

        let inputs = CycleInputs {
            cycle,
            cycle_start: start,
            cycle_rewards_end: rewards_end,
            stacks_cycle_start: start_block.height,
            stacks_cycle_rewards_end: end_block.height,
            cycle_start_date: start_block.block_time,
            cycle_rewards_end_date: end_block.block_time,
            stx_price_at_end: prices.stx,
            btc_price_at_end: prices.btc,
            btc_rewards: round_reward(rewards.total),
            fast_pool_v1: round_reward(rewards.fast_pool_v1),
            fast_pool_v2: round_reward(rewards.fast_pool_v2),
            total_stacked,
            threshold,
        };
        let metrics = DerivedMetrics::compute(&inputs)?;
        let record = inputs.into_record(metrics, collected_block_rewards_usd(prices.stx)?);

        info!(
            "collected cycle {cycle}: stacks {}..{} rewards {} BTC yield {} apy {}",
            record.stacks_cycle_start, record.stacks_cycle_rewards_end, record.btc_rewards, record.cycle_yield, record.apy
        );
        Ok(record)
    }

    /// Collect every cycle in `cycles`, in order. The first failure aborts.
    pub async fn collect_range(&self, cycles: RangeInclusive<u64>) -> EngineResult<Vec<CycleRecord>> {
        let mut out = Vec::new();
        for cycle in cycles {
            out.push(self.collect_cycle(cycle).await?);
        }
        Ok(out)
    }
}

/// Collect `cycles`, write each one as `cycle-{n}.json` beside the store and
/// then overwrite the store with the whole range.
pub async fn run_collection<C, P, L>(
    collector: &CycleCollector<C, P, L>,
    cycles: RangeInclusive<u64>,
    store: &JsonFileStore,
) -> EngineResult<Vec<CycleRecord>>
where
    C: StacksChain,
    P: PriceSource,
    L: RewardLedger,
{
    let mut all = Vec::new();
    for cycle in cycles {
        let record = collector.collect_cycle(cycle).await?;
        let path = store.write_cycle_file(&record)?;
        debug!("wrote {}", path.display());
        all.push(record);
    }
    store.save(&all)?;
    info!("stored {} collected cycles in {}", all.len(), store.path().display());
    Ok(all)
}

/// Run a blocking upstream call on tokio's blocking pool.
pub(crate) async fn off_thread<T, F>(f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::upstream("blocking task", e))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Stacks blocks exist only at even burn heights.
    struct FakeChain {
        threshold_heights: Mutex<Vec<u64>>,
    }

    impl FakeChain {
        fn new() -> Self {
            Self {
                threshold_heights: Mutex::new(Vec::new()),
            }
        }
    }

    fn genesis() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 14, 0, 0, 0).unwrap()
    }

    #[async_trait]
    impl StacksChain for FakeChain {
        async fn block_at_burn_height(&self, burn_height: u64) -> EngineResult<Option<StacksBlock>> {
            if burn_height % 2 == 1 {
                return Ok(None);
            }
            let offset = burn_height - 666_050;
            Ok(Some(StacksBlock {
                height: offset / 2 + 1,
                burn_block_height: burn_height,
                block_time: genesis() + Duration::minutes(10 * offset as i64),
            }))
        }

        async fn total_stacked(&self, _cycle: u64) -> EngineResult<MicroStx> {
            Ok(MicroStx(400_000_000_000_000))
        }

        async fn threshold(&self, _total: MicroStx, stacks_height: u64) -> EngineResult<u64> {
            self.threshold_heights.lock().expect("test: lock").push(stacks_height);
            Ok(110_000_000_000)
        }
    }

    struct FixedPrices;

    #[async_trait]
    impl PriceSource for FixedPrices {
        async fn prices_on(&self, _date: NaiveDate) -> EngineResult<PricePair> {
            Ok(PricePair {
                btc: dec!(60000),
                stx: dec!(2),
            })
        }
    }

    struct FixedLedger;

    #[async_trait]
    impl RewardLedger for FixedLedger {
        async fn rewards(&self, _cycle: u64) -> EngineResult<CycleRewards> {
            Ok(CycleRewards {
                total: dec!(16),
                fast_pool_v1: dec!(0.5),
                fast_pool_v2: dec!(0.25),
            })
        }
    }

    struct NoBlocks;

    #[async_trait]
    impl StacksChain for NoBlocks {
        async fn block_at_burn_height(&self, _burn_height: u64) -> EngineResult<Option<StacksBlock>> {
            Ok(None)
        }

        async fn total_stacked(&self, _cycle: u64) -> EngineResult<MicroStx> {
            Ok(MicroStx::zero())
        }

        async fn threshold(&self, _total: MicroStx, _stacks_height: u64) -> EngineResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn collects_canonical_cycle() {
        let collector = CycleCollector::new(FakeChain::new(), FixedPrices, FixedLedger);
        let record = collector.collect_cycle(86).await.expect("test: collect");

        assert_eq!(record.cycle_start, 846_650);
        assert_eq!(record.cycle_rewards_end, 848_650);
        // both bounds are even, so no probing was needed
        assert_eq!(record.stacks_cycle_start, (846_650 - 666_050) / 2 + 1);
        assert_eq!(record.rewards_usd, dec!(960000));
        assert_eq!(record.stacked_usd, dec!(800000000));
        assert_eq!(record.cycle_yield, dec!(0.0012));
        assert_eq!(record.block_rewards_usd, dec!(4200000));
        assert_eq!(record.threshold, 110_000_000_000);

        let heights = collector.chain.threshold_heights.lock().expect("test: lock").clone();
        assert_eq!(heights, vec![record.stacks_cycle_rewards_end - 1]);
    }

    #[tokio::test]
    async fn probes_to_nearest_block() {
        let collector = CycleCollector::new(FakeChain::new(), FixedPrices, FixedLedger);
        let forward = collector.find_block(666_051, Probe::Forward).await.expect("test: forward");
        assert_eq!(forward.burn_block_height, 666_052);
        let backward = collector.find_block(666_051, Probe::Backward).await.expect("test: backward");
        assert_eq!(backward.burn_block_height, 666_050);
    }

    #[tokio::test]
    async fn probing_is_bounded() {
        let collector = CycleCollector::new(NoBlocks, FixedPrices, FixedLedger).with_max_probe(3);
        let err = collector.collect_cycle(90).await.expect_err("test: no blocks");
        assert_eq!(err.category(), "UpstreamFetchError");
    }

    #[tokio::test]
    async fn range_is_sequential_and_contiguous() {
        let collector = CycleCollector::new(FakeChain::new(), FixedPrices, FixedLedger);
        let records = collector.collect_range(86..=88).await.expect("test: range");
        let cycles: Vec<u64> = records.iter().map(|r| r.cycle).collect();
        assert_eq!(cycles, vec![86, 87, 88]);
        for pair in records.windows(2) {
            assert_eq!(pair[1].cycle_start, pair[0].next_cycle_start());
        }
    }

    #[tokio::test]
    async fn run_collection_writes_files_and_store() {
        let tmp = tempfile::tempdir().expect("test: tempdir");
        let dir = tmp.path();
        let store = JsonFileStore::new(dir.join("all.json"));
        let collector = CycleCollector::new(FakeChain::new(), FixedPrices, FixedLedger);

        let records = run_collection(&collector, 86..=87, &store).await.expect("test: run");
        assert_eq!(records.len(), 2);
        assert!(dir.join("cycle-86.json").exists());
        assert!(dir.join("cycle-87.json").exists());
        assert_eq!(store.load().expect("test: load").len(), 2);
    }
}
