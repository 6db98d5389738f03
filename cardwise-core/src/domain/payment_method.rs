//! Payment method domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reward_rule::{CalculationMethod, RewardRule, SpendPeriod};

/// Kind of payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    #[default]
    CreditCard,
    DebitCard,
    Cash,
    Other,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::CreditCard => "credit_card",
            PaymentMethodType::DebitCard => "debit_card",
            PaymentMethodType::Cash => "cash",
            PaymentMethodType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "credit_card" | "credit" => PaymentMethodType::CreditCard,
            "debit_card" | "debit" => PaymentMethodType::DebitCard,
            "cash" => PaymentMethodType::Cash,
            _ => PaymentMethodType::Other,
        }
    }
}

/// A card or account the user pays with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    pub issuer: Option<String>,
    pub method_type: PaymentMethodType,
    /// Points program this card earns into; None for cards without rewards
    pub reward_currency_id: Option<Uuid>,
    pub is_active: bool,
    /// Base points earned per currency unit
    pub points_multiplier: Decimal,
    pub calculation_method: CalculationMethod,
    pub spend_period: SpendPeriod,
    pub reward_rules: Vec<RewardRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Create a new payment method with required fields
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            issuer: None,
            method_type: PaymentMethodType::CreditCard,
            reward_currency_id: None,
            is_active: true,
            points_multiplier: Decimal::ONE,
            calculation_method: CalculationMethod::default(),
            spend_period: SpendPeriod::Calendar,
            reward_rules: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the card earns points at all
    pub fn earns_rewards(&self) -> bool {
        self.reward_currency_id.is_some()
    }

    /// Validate payment method data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("payment method name cannot be empty");
        }
        if self.points_multiplier < Decimal::ZERO {
            return Err("points multiplier cannot be negative");
        }
        if let SpendPeriod::Statement { day } = self.spend_period {
            if !(1..=31).contains(&day) {
                return Err("statement day must be between 1 and 31");
            }
        }
        for rule in &self.reward_rules {
            rule.validate()?;
        }
        Ok(())
    }
}
