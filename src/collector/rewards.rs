// Burn-chain reward sums from the Stacks API's Postgres database.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{CycleRewards, RewardLedger};
use crate::error::{EngineError, EngineResult};
use crate::schedule::{CYCLE_LENGTH, FIRST_BURN_HEIGHT};

/// Fast Pool reward addresses.
pub const FAST_POOL_V1: &str = "bc1qs0kkdpsrzh3ngqgth7mkavlwlzr7lms2zv3wxe";
pub const FAST_POOL_V2: &str = "bc1q7w0jpwwjyq48qhyecnuwazfqv56880q67pmtfc";

const SATS_PER_BTC: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

const CYCLE_REWARDS_SQL: &str = r#"
    SELECT COALESCE(SUM(reward_amount), 0)::numeric
    FROM burnchain_rewards
    WHERE canonical
      AND (burn_block_height - $1) / $2 = $3
      AND ($4::text IS NULL OR reward_recipient = $4)
"#;

pub struct PgRewardLedger {
    pool: PgPool,
}

impl PgRewardLedger {
    pub async fn connect(url: &str) -> EngineResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await
            .map_err(|e| EngineError::upstream("postgres", e))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sum of canonical rewards in `cycle`, optionally for one recipient, in BTC.
    async fn sum(&self, cycle: u64, recipient: Option<&str>) -> EngineResult<Decimal> {
        let sats: Decimal = sqlx::query_scalar(CYCLE_REWARDS_SQL)
            .bind(to_i64(FIRST_BURN_HEIGHT)?)
            .bind(to_i64(CYCLE_LENGTH)?)
            .bind(to_i64(cycle)?)
            .bind(recipient)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EngineError::upstream("postgres burnchain_rewards", e))?;
        sats_to_btc(sats)
    }
}

fn to_i64(v: u64) -> EngineResult<i64> {
    i64::try_from(v).map_err(|_| EngineError::domain(format!("{v} exceeds BIGINT")))
}

fn sats_to_btc(sats: Decimal) -> EngineResult<Decimal> {
    sats.checked_div(SATS_PER_BTC)
        .ok_or_else(|| EngineError::domain(format!("cannot convert {sats} sats")))
}

#[async_trait]
impl RewardLedger for PgRewardLedger {
    async fn rewards(&self, cycle: u64) -> EngineResult<CycleRewards> {
        Ok(CycleRewards {
            total: self.sum(cycle, None).await?,
            fast_pool_v1: self.sum(cycle, Some(FAST_POOL_V1)).await?,
            fast_pool_v2: self.sum(cycle, Some(FAST_POOL_V2)).await?,
        })
    }
}
