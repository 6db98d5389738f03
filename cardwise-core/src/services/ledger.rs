//! Points ledger service - derived balances per reward currency

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{PointsAdjustment, PointsRedemption, PointsTransfer};
use crate::ports::Repository;

/// Balance of one reward currency and the parts it is made of
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointsBalanceSummary {
    pub currency_id: Uuid,
    pub currency_code: String,
    pub starting_balance: i64,
    pub adjustments: i64,
    pub earned: u64,
    pub redeemed: u64,
    pub transferred_out: u64,
    pub transferred_in: u64,
    pub balance: i64,
}

impl PointsBalanceSummary {
    fn total(&self) -> i64 {
        let signed = |v: u64| i64::try_from(v).unwrap_or(i64::MAX);
        self.starting_balance
            .saturating_add(self.adjustments)
            .saturating_add(signed(self.earned))
            .saturating_sub(signed(self.redeemed))
            .saturating_sub(signed(self.transferred_out))
            .saturating_add(signed(self.transferred_in))
    }
}

/// Computes balances from the starting balance and ledger entries
pub struct PointsLedgerService {
    repository: Arc<dyn Repository>,
}

impl PointsLedgerService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Current balance for one reward currency
    pub async fn balance(&self, currency_id: Uuid) -> Result<PointsBalanceSummary> {
        let currency = self
            .repository
            .get_reward_currency(currency_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Reward currency {}", currency_id)))?;

        let cards: HashSet<Uuid> = self
            .repository
            .get_payment_methods()
            .await?
            .into_iter()
            .filter(|m| m.reward_currency_id == Some(currency_id))
            .map(|m| m.id)
            .collect();

        let earned = if cards.is_empty() {
            0
        } else {
            self.repository
                .get_transactions()
                .await?
                .iter()
                .filter(|t| t.payment_method_id.is_some_and(|id| cards.contains(&id)))
                .fold(0u64, |acc, t| acc.saturating_add(t.reward_points))
        };

        let starting_balance = self
            .repository
            .get_points_balance(currency_id)
            .await?
            .map(|b| b.starting_balance)
            .unwrap_or(0);
        let adjustments = self
            .repository
            .get_points_adjustments(currency_id)
            .await?
            .iter()
            .map(|a| a.amount)
            .sum();
        let redeemed = self
            .repository
            .get_points_redemptions(currency_id)
            .await?
            .iter()
            .map(|r| r.points)
            .sum();

        let mut transferred_out = 0;
        let mut transferred_in = 0;
        for transfer in self.repository.get_points_transfers(currency_id).await? {
            if transfer.source_currency_id == currency_id {
                transferred_out += transfer.points;
            } else if transfer.target_currency_id == currency_id {
                transferred_in += transfer.received;
            }
        }

        let mut summary = PointsBalanceSummary {
            currency_id,
            currency_code: currency.code,
            starting_balance,
            adjustments,
            earned,
            redeemed,
            transferred_out,
            transferred_in,
            balance: 0,
        };
        summary.balance = summary.total();
        Ok(summary)
    }

    /// Balances for every reward currency, ordered by code
    pub async fn balances(&self) -> Result<Vec<PointsBalanceSummary>> {
        let mut summaries = Vec::new();
        for currency in self.repository.get_reward_currencies().await? {
            summaries.push(self.balance(currency.id).await?);
        }
        summaries.sort_by(|a, b| a.currency_code.cmp(&b.currency_code));
        Ok(summaries)
    }

    pub async fn adjust(&self, adjustment: &PointsAdjustment) -> Result<()> {
        if adjustment.amount == 0 {
            return Err(Error::validation("Adjustment must not be zero"));
        }
        self.repository.add_points_adjustment(adjustment).await
    }

    pub async fn redeem(&self, redemption: &PointsRedemption) -> Result<()> {
        if redemption.points == 0 {
            return Err(Error::validation("Redemption must use at least one point"));
        }
        self.repository.add_points_redemption(redemption).await
    }

    pub async fn transfer(&self, transfer: &PointsTransfer) -> Result<()> {
        if transfer.points == 0 {
            return Err(Error::validation("Transfer must move at least one point"));
        }
        if transfer.source_currency_id == transfer.target_currency_id {
            return Err(Error::validation("Cannot transfer points within the same currency"));
        }
        self.repository.add_points_transfer(transfer).await
    }
}
