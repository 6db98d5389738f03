//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod insight;
pub mod mcc;
mod payment_method;
mod points;
mod purchase;
mod reward_currency;
pub mod reward_rule;
pub mod result;
mod transaction;

pub use insight::Insight;
pub use mcc::{CategoryMap, UNCATEGORIZED};
pub use payment_method::{PaymentMethod, PaymentMethodType};
pub use points::{PointsAdjustment, PointsBalance, PointsRedemption, PointsTransfer};
pub use purchase::PurchaseInput;
pub use reward_currency::{ConversionRate, RewardCurrency};
pub use reward_rule::{CalculationMethod, RewardRule, Rounding, RuleCondition, SpendPeriod};
pub use transaction::Transaction;
