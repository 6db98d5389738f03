//! Transaction domain model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mcc::CategoryMap;

/// A single purchase event paid with one of the user's payment methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Positive for purchases; zero or negative for refunds
    pub amount: Decimal,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub merchant_name: Option<String>,
    /// Merchant category code reported by the card network
    pub mcc: Option<String>,
    /// Category chosen by the user, overriding the MCC-derived one
    pub category_override: Option<String>,
    pub payment_method_id: Option<Uuid>,
    /// Total reward points earned (base + bonus)
    pub reward_points: u64,
    /// Portion of `reward_points` earned from a bonus rule
    pub bonus_points: u64,
    pub is_contactless: bool,
    pub is_online: bool,
    /// Amount the user expects to get back (shared bills, work expenses)
    pub reimbursement_amount: Option<Decimal>,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction with required fields
    pub fn new(id: Uuid, amount: Decimal, currency: &str, transaction_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id,
            amount,
            currency: Self::normalize_currency(currency),
            merchant_name: None,
            mcc: None,
            category_override: None,
            payment_method_id: None,
            reward_points: 0,
            bonus_points: 0,
            is_contactless: false,
            is_online: false,
            reimbursement_amount: None,
            transaction_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Category after applying the user override on top of the MCC default
    pub fn effective_category(&self, categories: &CategoryMap) -> String {
        categories.resolve(self.category_override.as_deref(), self.mcc.as_deref())
    }

    /// Amount the user actually bears after reimbursement
    pub fn net_amount(&self) -> Decimal {
        let reimbursed = self.reimbursement_amount.unwrap_or(Decimal::ZERO);
        (self.amount - reimbursed).max(Decimal::ZERO)
    }

    /// Whether this is a purchase (as opposed to a refund or zero entry)
    pub fn is_purchase(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Reward points earned outside any bonus rule
    pub fn base_points(&self) -> u64 {
        self.reward_points.saturating_sub(self.bonus_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(amount: i64) -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            Decimal::new(amount, 2),
            " sgd ",
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        )
    }

    #[test]
    fn test_currency_normalized_on_create() {
        assert_eq!(tx(1000).currency, "SGD");
    }

    #[test]
    fn test_effective_category() {
        let map = CategoryMap::builtin();
        let mut t = tx(1000);
        assert_eq!(t.effective_category(&map), "Uncategorized");

        t.mcc = Some("5812".to_string());
        assert_eq!(t.effective_category(&map), "Dining");

        t.category_override = Some("Team lunch".to_string());
        assert_eq!(t.effective_category(&map), "Team lunch");
    }

    #[test]
    fn test_net_amount_never_negative() {
        let mut t = tx(5000);
        t.reimbursement_amount = Some(Decimal::new(2000, 2));
        assert_eq!(t.net_amount(), Decimal::new(3000, 2));

        t.reimbursement_amount = Some(Decimal::new(9000, 2));
        assert_eq!(t.net_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_base_points() {
        let mut t = tx(5000);
        t.reward_points = 200;
        t.bonus_points = 150;
        assert_eq!(t.base_points(), 50);
        assert!(t.is_purchase());
        assert!(!tx(-500).is_purchase());
    }
}
