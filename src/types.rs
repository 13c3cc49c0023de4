// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Type Definitions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{EngineError, EngineResult};
use crate::metrics::DerivedMetrics;

// ─── MicroStx ────────────────────────────────────────────────────────────────

/// Stacked-asset amount in microunits (1 STX = 1_000_000 uSTX).
///
/// Persisted as a decimal string because totals exceed what a JSON number
/// can carry without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MicroStx(pub u128);

pub const MICRO_SCALE: u32 = 6;

impl MicroStx {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whole-unit amount as a `Decimal` (exact, scale 6).
    pub fn to_stx(&self) -> EngineResult<Decimal> {
        let raw = i128::try_from(self.0)
            .map_err(|_| EngineError::domain(format!("stacked amount {} out of range", self.0)))?;
        Decimal::try_from_i128_with_scale(raw, MICRO_SCALE)
            .map_err(|e| EngineError::domain(format!("stacked amount {}: {e}", self.0)))
    }

    /// Microunit amount as a `Decimal` (scale 0).
    pub fn to_decimal(&self) -> EngineResult<Decimal> {
        let raw = i128::try_from(self.0)
            .map_err(|_| EngineError::domain(format!("stacked amount {} out of range", self.0)))?;
        Decimal::try_from_i128_with_scale(raw, 0)
            .map_err(|e| EngineError::domain(format!("stacked amount {}: {e}", self.0)))
    }

    /// Floor a microunit `Decimal` back to an integer amount.
    pub fn from_decimal_floor(d: Decimal) -> EngineResult<Self> {
        if d.is_sign_negative() && !d.is_zero() {
            return Err(EngineError::domain(format!("negative stacked amount {d}")));
        }
        let mut whole = d.floor();
        whole.rescale(0);
        u128::try_from(whole.mantissa())
            .map(Self)
            .map_err(|_| EngineError::domain(format!("stacked amount {d} out of range")))
    }
}

impl fmt::Display for MicroStx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for MicroStx {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for MicroStx {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MicroVisitor;

        impl<'de> de::Visitor<'de> for MicroVisitor {
            type Value = MicroStx;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer amount of microunits")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MicroStx, E> {
                v.trim().parse::<u128>().map(MicroStx).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MicroStx, E> {
                Ok(MicroStx(v as u128))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<MicroStx, E> {
                Ok(MicroStx(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MicroStx, E> {
                u128::try_from(v).map(MicroStx).map_err(E::custom)
            }

            // Older stores wrote totals above 2^64 as JSON floats.
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<MicroStx, E> {
                // u128::MAX as f64 rounds up to 2^128, itself out of range
                if !v.is_finite() || v < 0.0 || v >= u128::MAX as f64 {
                    return Err(E::custom(format!("invalid microunit amount {v}")));
                }
                Ok(MicroStx(v.floor() as u128))
            }
        }

        deserializer.deserialize_any(MicroVisitor)
    }
}

// ─── ISO-8601 timestamps ─────────────────────────────────────────────────────

/// `2024-04-28T06:59:37.000Z`, the format the chain API and the frontend use.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

// ─── CycleRecord ─────────────────────────────────────────────────────────────

/// One reward cycle, real or projected. Field names match the persisted store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    pub cycle: u64,
    pub cycle_start: u64,
    pub cycle_rewards_end: u64,
    pub stacks_cycle_start: u64,
    pub stacks_cycle_rewards_end: u64,
    #[serde(with = "iso_millis")]
    pub cycle_start_date: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub cycle_rewards_end_date: DateTime<Utc>,
    pub stx_price_at_end: Decimal,
    pub btc_price_at_end: Decimal,
    pub btc_rewards: Decimal,
    pub fast_pool_v1: Decimal,
    pub fast_pool_v2: Decimal,
    pub total_stacked: MicroStx,
    pub rewards_usd: Decimal,
    pub block_rewards_usd: Decimal,
    pub stacked_usd: Decimal,
    pub cycle_yield: Decimal,
    pub apy: f64,
    pub threshold: u64,
}

impl CycleRecord {
    /// Burn height from which the following cycle may be generated.
    pub fn next_cycle_start(&self) -> u64 {
        self.cycle_rewards_end
            .saturating_add(crate::schedule::PREPARE_BUFFER)
    }
}

// ─── CycleInputs ─────────────────────────────────────────────────────────────

/// Raw, non-derived half of a [`CycleRecord`].
///
/// Both the generator and the collector fill one of these, then derive the
/// USD/yield fields through [`DerivedMetrics`] so the two paths cannot drift.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleInputs {
    pub cycle: u64,
    pub cycle_start: u64,
    pub cycle_rewards_end: u64,
    pub stacks_cycle_start: u64,
    pub stacks_cycle_rewards_end: u64,
    pub cycle_start_date: DateTime<Utc>,
    pub cycle_rewards_end_date: DateTime<Utc>,
    pub stx_price_at_end: Decimal,
    pub btc_price_at_end: Decimal,
    pub btc_rewards: Decimal,
    pub fast_pool_v1: Decimal,
    pub fast_pool_v2: Decimal,
    pub total_stacked: MicroStx,
    pub threshold: u64,
}

impl CycleInputs {
    pub fn into_record(self, metrics: DerivedMetrics, block_rewards_usd: Decimal) -> CycleRecord {
        CycleRecord {
            cycle: self.cycle,
            cycle_start: self.cycle_start,
            cycle_rewards_end: self.cycle_rewards_end,
            stacks_cycle_start: self.stacks_cycle_start,
            stacks_cycle_rewards_end: self.stacks_cycle_rewards_end,
            cycle_start_date: self.cycle_start_date,
            cycle_rewards_end_date: self.cycle_rewards_end_date,
            stx_price_at_end: self.stx_price_at_end,
            btc_price_at_end: self.btc_price_at_end,
            btc_rewards: self.btc_rewards,
            fast_pool_v1: self.fast_pool_v1,
            fast_pool_v2: self.fast_pool_v2,
            total_stacked: self.total_stacked,
            rewards_usd: metrics.rewards_usd,
            block_rewards_usd,
            stacked_usd: metrics.stacked_usd,
            cycle_yield: metrics.cycle_yield,
            apy: metrics.apy,
            threshold: self.threshold,
        }
    }
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// Failure shape shared by every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureBody {
    pub success: bool,
    pub error: String,
    pub message: String,
}

/// `{success: true, ...payload}` or `{success: false, error, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    Success(T),
    Failure(FailureBody),
}

impl<T> ApiResponse<T> {
    pub fn failure(err: &EngineError) -> Self {
        Self::Failure(FailureBody {
            success: false,
            error: err.category().to_string(),
            message: err.to_string(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// HTTP status a web route answers this response with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Failure(body) if body.error == EngineError::EmptyStore.category() => 400,
            Self::Failure(_) => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub success: bool,
    pub block_height: u64,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub cycles: Vec<CycleRecord>,
    pub new_cycles_generated: usize,
    pub new_cycles: Vec<CycleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclesPayload {
    pub success: bool,
    pub data: Vec<CycleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeightPayload {
    pub success: bool,
    pub block_height: u64,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

pub type DashboardResponse = ApiResponse<DashboardSnapshot>;
pub type CyclesResponse = ApiResponse<CyclesPayload>;
pub type BlockHeightResponse = ApiResponse<BlockHeightPayload>;
