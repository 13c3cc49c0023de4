//! Adapter layer: converts between the generator's f64 draws and the
//! engine's Decimal amounts.

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};

/// Convert f64 to Decimal, rejecting NaN and infinities.
pub fn to_decimal(v: f64) -> EngineResult<Decimal> {
    if !v.is_finite() {
        return Err(EngineError::domain(format!("non-finite value {v}")));
    }
    Decimal::from_f64(v).ok_or_else(|| EngineError::domain(format!("{v} out of Decimal range")))
}

/// Convert Decimal to f64 for statistics and charts.
pub fn from_decimal(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
