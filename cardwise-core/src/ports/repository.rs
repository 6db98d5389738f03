//! Repository port - backend abstraction

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{
    ConversionRate, Insight, PaymentMethod, PointsAdjustment, PointsBalance, PointsRedemption,
    PointsTransfer, RewardCurrency, RewardRule, Transaction,
};

/// Backend repository abstraction
///
/// The services only see this trait. Implementations (adapters) talk to the
/// actual store: the hosted database in production, a local DuckDB file for
/// the CLI, or memory in tests.
#[async_trait]
pub trait Repository: Send + Sync {
    // === Payment methods ===

    /// Insert or update a payment method together with its reward rules
    async fn upsert_payment_method(&self, method: &PaymentMethod) -> Result<()>;

    /// Get all payment methods
    async fn get_payment_methods(&self) -> Result<Vec<PaymentMethod>>;

    /// Get a payment method by ID
    async fn get_payment_method(&self, id: Uuid) -> Result<Option<PaymentMethod>>;

    /// Get payment methods flagged active
    async fn get_active_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        let methods = self.get_payment_methods().await?;
        Ok(methods.into_iter().filter(|m| m.is_active).collect())
    }

    /// Reward rules of one card, empty when the card does not exist
    async fn get_reward_rules(&self, payment_method_id: Uuid) -> Result<Vec<RewardRule>> {
        let method = self.get_payment_method(payment_method_id).await?;
        Ok(method.map(|m| m.reward_rules).unwrap_or_default())
    }

    // === Reward currencies ===

    async fn upsert_reward_currency(&self, currency: &RewardCurrency) -> Result<()>;

    async fn get_reward_currencies(&self) -> Result<Vec<RewardCurrency>>;

    async fn get_reward_currency(&self, id: Uuid) -> Result<Option<RewardCurrency>> {
        let currencies = self.get_reward_currencies().await?;
        Ok(currencies.into_iter().find(|c| c.id == id))
    }

    // === Conversion rates ===

    /// Get the rate for a single directed edge
    async fn get_conversion_rate(&self, source: Uuid, target: Uuid) -> Result<Option<ConversionRate>>;

    /// Get all conversion rates
    async fn get_conversion_rates(&self) -> Result<Vec<ConversionRate>>;

    /// Insert or update the rate for a directed edge
    async fn upsert_conversion_rate(&self, rate: &ConversionRate) -> Result<()>;

    /// Delete the rate for a directed edge; returns whether a row was removed
    async fn delete_conversion_rate(&self, source: Uuid, target: Uuid) -> Result<bool>;

    // === Transactions ===

    async fn upsert_transaction(&self, tx: &Transaction) -> Result<()>;

    /// Transactions paid with one payment method, inclusive date range
    async fn get_transactions_by_payment_method(
        &self,
        payment_method_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>>;

    /// All transactions in an inclusive date range
    async fn get_transactions_by_date_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>>;

    /// All transactions
    async fn get_transactions(&self) -> Result<Vec<Transaction>>;

    // === Categories ===

    /// User MCC → category overrides
    async fn get_mcc_mappings(&self) -> Result<HashMap<String, String>>;

    async fn set_mcc_mapping(&self, mcc: &str, category: &str) -> Result<()>;

    // === Insights ===

    async fn upsert_insight(&self, insight: &Insight) -> Result<()>;

    async fn get_insights(&self) -> Result<Vec<Insight>>;

    async fn get_dismissed_insight_ids(&self) -> Result<Vec<Uuid>>;

    async fn dismiss_insight(&self, id: Uuid) -> Result<()>;

    // === Points ledger ===

    async fn set_points_balance(&self, balance: &PointsBalance) -> Result<()>;

    async fn get_points_balance(&self, currency_id: Uuid) -> Result<Option<PointsBalance>>;

    async fn add_points_adjustment(&self, adjustment: &PointsAdjustment) -> Result<()>;

    async fn get_points_adjustments(&self, currency_id: Uuid) -> Result<Vec<PointsAdjustment>>;

    async fn add_points_redemption(&self, redemption: &PointsRedemption) -> Result<()>;

    async fn get_points_redemptions(&self, currency_id: Uuid) -> Result<Vec<PointsRedemption>>;

    async fn add_points_transfer(&self, transfer: &PointsTransfer) -> Result<()>;

    /// Transfers where the currency is either the source or the target
    async fn get_points_transfers(&self, currency_id: Uuid) -> Result<Vec<PointsTransfer>>;
}
