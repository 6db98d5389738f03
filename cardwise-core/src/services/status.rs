//! Status service - wallet overview

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::Result;
use crate::ports::Repository;

pub struct StatusService {
    repository: Arc<dyn Repository>,
}

impl StatusService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub async fn get_status(&self) -> Result<StatusSummary> {
        let methods = self.repository.get_payment_methods().await?;
        let currencies = self.repository.get_reward_currencies().await?;
        let rates = self.repository.get_conversion_rates().await?;
        let transactions = self.repository.get_transactions().await?;
        let insights = self.repository.get_insights().await?;

        let earliest = transactions.iter().map(|t| t.transaction_date).min();
        let latest = transactions.iter().map(|t| t.transaction_date).max();

        Ok(StatusSummary {
            total_payment_methods: methods.len(),
            active_payment_methods: methods.iter().filter(|m| m.is_active).count(),
            total_reward_currencies: currencies.len(),
            total_conversion_rates: rates.len(),
            total_transactions: transactions.len(),
            total_points_earned: transactions.iter().map(|t| t.reward_points).sum(),
            total_insights: insights.len(),
            payment_methods: methods
                .into_iter()
                .map(|m| PaymentMethodSummary {
                    id: m.id.to_string(),
                    name: m.name,
                    issuer: m.issuer,
                    is_active: m.is_active,
                })
                .collect(),
            date_range: DateRange {
                earliest: earliest.map(|d| d.to_string()),
                latest: latest.map(|d| d.to_string()),
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_payment_methods: usize,
    pub active_payment_methods: usize,
    pub total_reward_currencies: usize,
    pub total_conversion_rates: usize,
    pub total_transactions: usize,
    pub total_points_earned: u64,
    pub total_insights: usize,
    pub payment_methods: Vec<PaymentMethodSummary>,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct PaymentMethodSummary {
    pub id: String,
    pub name: String,
    pub issuer: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}
