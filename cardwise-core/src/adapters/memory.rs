//! In-memory repository implementation
//!
//! Keeps everything in process. Used by tests and by embedders that load
//! their records from elsewhere and only need the calculations.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    ConversionRate, Insight, PaymentMethod, PointsAdjustment, PointsBalance, PointsRedemption,
    PointsTransfer, RewardCurrency, Transaction,
};
use crate::ports::Repository;

#[derive(Default)]
struct Store {
    payment_methods: Vec<PaymentMethod>,
    currencies: Vec<RewardCurrency>,
    rates: Vec<ConversionRate>,
    transactions: Vec<Transaction>,
    mcc_mappings: HashMap<String, String>,
    insights: Vec<Insight>,
    dismissed: HashSet<Uuid>,
    balances: Vec<PointsBalance>,
    adjustments: Vec<PointsAdjustment>,
    redemptions: Vec<PointsRedemption>,
    transfers: Vec<PointsTransfer>,
    /// Payment method IDs whose reads fail, to exercise partial failures
    unavailable_methods: HashSet<Uuid>,
    transactions_unavailable: bool,
    rates_unavailable: bool,
}

/// Repository backed by process memory
#[derive(Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reads of one payment method fail until cleared
    pub async fn set_payment_method_unavailable(&self, id: Uuid, unavailable: bool) {
        let mut store = self.store.write().await;
        if unavailable {
            store.unavailable_methods.insert(id);
        } else {
            store.unavailable_methods.remove(&id);
        }
    }

    /// Make every transaction read fail until cleared
    pub async fn set_transactions_unavailable(&self, unavailable: bool) {
        self.store.write().await.transactions_unavailable = unavailable;
    }

    /// Make every conversion rate read fail until cleared
    pub async fn set_rates_unavailable(&self, unavailable: bool) {
        self.store.write().await.rates_unavailable = unavailable;
    }
}

fn upsert_by<T: Clone>(items: &mut Vec<T>, item: &T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
}

fn unavailable(what: &str) -> Error {
    Error::database(format!("{} temporarily unavailable", what))
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn upsert_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        method.validate().map_err(Error::validation)?;
        let mut store = self.store.write().await;
        upsert_by(&mut store.payment_methods, method, |m| m.id == method.id);
        Ok(())
    }

    async fn get_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        let store = self.store.read().await;
        let mut methods = store.payment_methods.clone();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(methods)
    }

    async fn get_payment_method(&self, id: Uuid) -> Result<Option<PaymentMethod>> {
        let store = self.store.read().await;
        if store.unavailable_methods.contains(&id) {
            return Err(unavailable("payment method"));
        }
        Ok(store.payment_methods.iter().find(|m| m.id == id).cloned())
    }

    async fn upsert_reward_currency(&self, currency: &RewardCurrency) -> Result<()> {
        let mut store = self.store.write().await;
        upsert_by(&mut store.currencies, currency, |c| c.id == currency.id);
        Ok(())
    }

    async fn get_reward_currencies(&self) -> Result<Vec<RewardCurrency>> {
        let store = self.store.read().await;
        let mut currencies = store.currencies.clone();
        currencies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(currencies)
    }

    async fn get_conversion_rate(&self, source: Uuid, target: Uuid) -> Result<Option<ConversionRate>> {
        let store = self.store.read().await;
        if store.rates_unavailable {
            return Err(unavailable("conversion rates"));
        }
        Ok(store
            .rates
            .iter()
            .find(|r| r.source_currency_id == source && r.target_currency_id == target)
            .cloned())
    }

    async fn get_conversion_rates(&self) -> Result<Vec<ConversionRate>> {
        let store = self.store.read().await;
        if store.rates_unavailable {
            return Err(unavailable("conversion rates"));
        }
        Ok(store.rates.clone())
    }

    async fn upsert_conversion_rate(&self, rate: &ConversionRate) -> Result<()> {
        rate.validate().map_err(Error::validation)?;
        let mut store = self.store.write().await;
        let known = |id: Uuid| store.currencies.iter().any(|c| c.id == id);
        if !known(rate.source_currency_id) || !known(rate.target_currency_id) {
            return Err(Error::database(
                "insert or update on conversion_rates violates foreign key constraint",
            ));
        }
        upsert_by(&mut store.rates, rate, |r| {
            r.source_currency_id == rate.source_currency_id
                && r.target_currency_id == rate.target_currency_id
        });
        Ok(())
    }

    async fn delete_conversion_rate(&self, source: Uuid, target: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.rates.len();
        store
            .rates
            .retain(|r| !(r.source_currency_id == source && r.target_currency_id == target));
        Ok(store.rates.len() != before)
    }

    async fn upsert_transaction(&self, tx: &Transaction) -> Result<()> {
        let mut store = self.store.write().await;
        upsert_by(&mut store.transactions, tx, |t| t.id == tx.id);
        Ok(())
    }

    async fn get_transactions_by_payment_method(
        &self,
        payment_method_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let store = self.store.read().await;
        if store.transactions_unavailable {
            return Err(unavailable("transactions"));
        }
        Ok(store
            .transactions
            .iter()
            .filter(|t| t.payment_method_id == Some(payment_method_id))
            .filter(|t| t.transaction_date >= start_date && t.transaction_date <= end_date)
            .cloned()
            .collect())
    }

    async fn get_transactions_by_date_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let store = self.store.read().await;
        if store.transactions_unavailable {
            return Err(unavailable("transactions"));
        }
        let mut txs: Vec<Transaction> = store
            .transactions
            .iter()
            .filter(|t| t.transaction_date >= start_date && t.transaction_date <= end_date)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        Ok(txs)
    }

    async fn get_transactions(&self) -> Result<Vec<Transaction>> {
        let store = self.store.read().await;
        if store.transactions_unavailable {
            return Err(unavailable("transactions"));
        }
        Ok(store.transactions.clone())
    }

    async fn get_mcc_mappings(&self) -> Result<HashMap<String, String>> {
        Ok(self.store.read().await.mcc_mappings.clone())
    }

    async fn set_mcc_mapping(&self, mcc: &str, category: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store
            .mcc_mappings
            .insert(mcc.trim().to_string(), category.trim().to_string());
        Ok(())
    }

    async fn upsert_insight(&self, insight: &Insight) -> Result<()> {
        let mut store = self.store.write().await;
        upsert_by(&mut store.insights, insight, |i| i.id == insight.id);
        Ok(())
    }

    async fn get_insights(&self) -> Result<Vec<Insight>> {
        Ok(self.store.read().await.insights.clone())
    }

    async fn get_dismissed_insight_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self.store.read().await.dismissed.iter().copied().collect())
    }

    async fn dismiss_insight(&self, id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        if !store.insights.iter().any(|i| i.id == id) {
            return Err(Error::not_found(format!("Insight {}", id)));
        }
        store.dismissed.insert(id);
        Ok(())
    }

    async fn set_points_balance(&self, balance: &PointsBalance) -> Result<()> {
        let mut store = self.store.write().await;
        upsert_by(&mut store.balances, balance, |b| b.currency_id == balance.currency_id);
        Ok(())
    }

    async fn get_points_balance(&self, currency_id: Uuid) -> Result<Option<PointsBalance>> {
        let store = self.store.read().await;
        Ok(store.balances.iter().find(|b| b.currency_id == currency_id).cloned())
    }

    async fn add_points_adjustment(&self, adjustment: &PointsAdjustment) -> Result<()> {
        self.store.write().await.adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn get_points_adjustments(&self, currency_id: Uuid) -> Result<Vec<PointsAdjustment>> {
        let store = self.store.read().await;
        Ok(store
            .adjustments
            .iter()
            .filter(|a| a.currency_id == currency_id)
            .cloned()
            .collect())
    }

    async fn add_points_redemption(&self, redemption: &PointsRedemption) -> Result<()> {
        self.store.write().await.redemptions.push(redemption.clone());
        Ok(())
    }

    async fn get_points_redemptions(&self, currency_id: Uuid) -> Result<Vec<PointsRedemption>> {
        let store = self.store.read().await;
        Ok(store
            .redemptions
            .iter()
            .filter(|r| r.currency_id == currency_id)
            .cloned()
            .collect())
    }

    async fn add_points_transfer(&self, transfer: &PointsTransfer) -> Result<()> {
        if transfer.source_currency_id == transfer.target_currency_id {
            return Err(Error::validation("cannot transfer points into the same currency"));
        }
        self.store.write().await.transfers.push(transfer.clone());
        Ok(())
    }

    async fn get_points_transfers(&self, currency_id: Uuid) -> Result<Vec<PointsTransfer>> {
        let store = self.store.read().await;
        Ok(store
            .transfers
            .iter()
            .filter(|t| t.source_currency_id == currency_id || t.target_currency_id == currency_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RewardRule;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let repo = MemoryRepository::new();
        let mut card = PaymentMethod::new(Uuid::new_v4(), "Card A");
        repo.upsert_payment_method(&card).await.unwrap();

        card.name = "Card A Renamed".to_string();
        repo.upsert_payment_method(&card).await.unwrap();

        let methods = repo.get_payment_methods().await.unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "Card A Renamed");
    }

    #[tokio::test]
    async fn test_reward_rules_of_a_card() {
        let repo = MemoryRepository::new();
        let mut card = PaymentMethod::new(Uuid::new_v4(), "Card A");
        card.reward_rules = vec![RewardRule::new("Dining", Decimal::from(3))];
        repo.upsert_payment_method(&card).await.unwrap();

        let rules = repo.get_reward_rules(card.id).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "Dining");
        assert!(repo.get_reward_rules(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_requires_known_currencies() {
        let repo = MemoryRepository::new();
        let rate = ConversionRate::new(Uuid::new_v4(), Uuid::new_v4(), Decimal::ONE);
        let err = repo.upsert_conversion_rate(&rate).await.unwrap_err();
        assert!(err.is_foreign_key_violation());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let repo = MemoryRepository::new();
        let card = PaymentMethod::new(Uuid::new_v4(), "Flaky");
        repo.upsert_payment_method(&card).await.unwrap();

        repo.set_payment_method_unavailable(card.id, true).await;
        assert!(repo.get_payment_method(card.id).await.is_err());
        repo.set_payment_method_unavailable(card.id, false).await;
        assert!(repo.get_payment_method(card.id).await.unwrap().is_some());

        repo.set_transactions_unavailable(true).await;
        assert!(repo.get_transactions().await.is_err());
    }
}
