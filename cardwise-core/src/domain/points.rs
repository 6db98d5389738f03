//! Points ledger entries
//!
//! Balances are never stored as a running total. They are derived from the
//! starting balance and these entries on every read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opening balance for a reward currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBalance {
    pub currency_id: Uuid,
    pub starting_balance: i64,
}

/// Manual correction, positive or negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsAdjustment {
    pub id: Uuid,
    pub currency_id: Uuid,
    pub amount: i64,
    pub reason: Option<String>,
    pub date: NaiveDate,
}

/// Points spent on a reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsRedemption {
    pub id: Uuid,
    pub currency_id: Uuid,
    pub points: u64,
    pub description: Option<String>,
    pub date: NaiveDate,
}

/// Points moved from one program into another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsTransfer {
    pub id: Uuid,
    pub source_currency_id: Uuid,
    pub target_currency_id: Uuid,
    /// Points taken from the source program
    pub points: u64,
    /// Points credited to the target program
    pub received: u64,
    pub date: NaiveDate,
}
