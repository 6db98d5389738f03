//! Purchase input for reward evaluation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Transaction;

/// The facts about a purchase that reward rules look at.
///
/// Built from a stored [`Transaction`] or entered directly when simulating a
/// purchase that has not happened yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseInput {
    pub amount: Decimal,
    pub currency: String,
    pub merchant_name: Option<String>,
    pub mcc: Option<String>,
    pub category_override: Option<String>,
    pub is_contactless: bool,
    pub is_online: bool,
    pub date: NaiveDate,
}

impl PurchaseInput {
    pub fn new(amount: Decimal, currency: &str, date: NaiveDate) -> Self {
        Self {
            amount,
            currency: Transaction::normalize_currency(currency),
            merchant_name: None,
            mcc: None,
            category_override: None,
            is_contactless: false,
            is_online: false,
            date,
        }
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant_name = Some(merchant.into());
        self
    }

    pub fn with_mcc(mut self, mcc: impl Into<String>) -> Self {
        self.mcc = Some(mcc.into());
        self
    }

    pub fn online(mut self) -> Self {
        self.is_online = true;
        self
    }

    pub fn contactless(mut self) -> Self {
        self.is_contactless = true;
        self
    }
}

impl From<&Transaction> for PurchaseInput {
    fn from(tx: &Transaction) -> Self {
        Self {
            amount: tx.amount,
            currency: tx.currency.clone(),
            merchant_name: tx.merchant_name.clone(),
            mcc: tx.mcc.clone(),
            category_override: tx.category_override.clone(),
            is_contactless: tx.is_contactless,
            is_online: tx.is_online,
            date: tx.transaction_date,
        }
    }
}
