//! Reward currencies and the conversion rates between them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A points program: bank points (transferrable) or an airline miles endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardCurrency {
    pub id: Uuid,
    /// Short code, e.g. "UNI$" or "KF"
    pub code: String,
    pub display_name: String,
    pub issuer: Option<String>,
    /// Bank points that can be moved into a miles program
    pub is_transferrable: bool,
}

impl RewardCurrency {
    pub fn new(id: Uuid, code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            display_name: display_name.into(),
            issuer: None,
            is_transferrable: false,
        }
    }
}

/// Decimal places a stored rate keeps
pub const RATE_SCALE: u32 = 6;

/// Directed edge in the conversion graph: 1 source point = `rate` target points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRate {
    pub source_currency_id: Uuid,
    pub target_currency_id: Uuid,
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ConversionRate {
    pub fn new(source_currency_id: Uuid, target_currency_id: Uuid, rate: Decimal) -> Self {
        Self {
            source_currency_id,
            target_currency_id,
            rate,
            updated_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.rate <= Decimal::ZERO {
            return Err("conversion rate must be positive");
        }
        if self.rate.normalize().scale() > RATE_SCALE {
            return Err("conversion rate supports at most 6 decimal places");
        }
        if self.rate >= Decimal::from(1_000_000_000_000i64) {
            return Err("conversion rate is too large");
        }
        if self.source_currency_id == self.target_currency_id {
            return Err("conversion rate needs two different currencies");
        }
        Ok(())
    }
}
