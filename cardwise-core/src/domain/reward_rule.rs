//! Reward rule domain entities
//!
//! A card earns base points on every purchase and may carry bonus rules
//! that add extra points when all of a rule's conditions match.

use chrono::NaiveDate;
use regex::RegexBuilder;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PurchaseInput;

/// How a fractional result is turned into whole points or currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    #[default]
    Floor,
    Nearest,
    Ceil,
}

impl Rounding {
    pub fn apply(self, value: Decimal) -> Decimal {
        match self {
            Rounding::Floor => value.floor(),
            Rounding::Ceil => value.ceil(),
            Rounding::Nearest => value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        }
    }
}

/// How points are derived from a purchase amount and a multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalculationMethod {
    /// `amount × multiplier`, rounded
    Standard {
        #[serde(default)]
        rounding: Rounding,
    },
    /// Amount rounded to whole units first, then multiplied
    RoundedAmount {
        #[serde(default)]
        amount_rounding: Rounding,
    },
    /// Points per completed block of spend (e.g. 4 points per 5 dollars)
    Block { block_size: Decimal },
}

impl Default for CalculationMethod {
    fn default() -> Self {
        CalculationMethod::Standard {
            rounding: Rounding::Floor,
        }
    }
}

impl CalculationMethod {
    /// Points earned for `amount` at `multiplier`. Never negative; results
    /// too large for `u64` saturate.
    pub fn points(&self, amount: Decimal, multiplier: Decimal) -> u64 {
        if amount <= Decimal::ZERO || multiplier <= Decimal::ZERO {
            return 0;
        }

        let raw = match *self {
            CalculationMethod::Standard { rounding } => amount.checked_mul(multiplier).map(|v| rounding.apply(v)),
            CalculationMethod::RoundedAmount { amount_rounding } => amount_rounding
                .apply(amount)
                .checked_mul(multiplier)
                .map(|v| v.floor()),
            CalculationMethod::Block { block_size } => {
                if block_size <= Decimal::ZERO {
                    return 0;
                }
                amount
                    .checked_div(block_size)
                    .and_then(|blocks| blocks.floor().checked_mul(multiplier))
                    .map(|v| v.floor())
            }
        };

        raw.and_then(|v| v.to_u64()).unwrap_or(u64::MAX)
    }
}

/// Period over which monthly caps and minimum spend are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpendPeriod {
    #[default]
    Calendar,
    /// Billing cycle starting on `day` of each month
    Statement { day: u32 },
}

/// A single condition a purchase must satisfy for a bonus rule to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    Mcc {
        codes: Vec<String>,
        #[serde(default)]
        exclude: bool,
    },
    Merchant {
        patterns: Vec<String>,
        #[serde(default)]
        exclude: bool,
    },
    Category {
        categories: Vec<String>,
        #[serde(default)]
        exclude: bool,
    },
    Currency {
        codes: Vec<String>,
        #[serde(default)]
        exclude: bool,
    },
    Amount {
        #[serde(default)]
        min: Option<Decimal>,
        #[serde(default)]
        max: Option<Decimal>,
    },
    Contactless,
    Online,
    InStore,
}

impl RuleCondition {
    /// Check the condition against a purchase whose effective category is `category`
    pub fn matches(&self, purchase: &PurchaseInput, category: &str) -> bool {
        match self {
            RuleCondition::Mcc { codes, exclude } => {
                let hit = purchase
                    .mcc
                    .as_deref()
                    .map(str::trim)
                    .is_some_and(|mcc| codes.iter().any(|c| c.trim() == mcc));
                hit != *exclude
            }
            RuleCondition::Merchant { patterns, exclude } => {
                let hit = purchase
                    .merchant_name
                    .as_deref()
                    .is_some_and(|name| patterns.iter().any(|p| merchant_matches(p, name)));
                hit != *exclude
            }
            RuleCondition::Category { categories, exclude } => {
                let hit = categories.iter().any(|c| c.trim().eq_ignore_ascii_case(category));
                hit != *exclude
            }
            RuleCondition::Currency { codes, exclude } => {
                let hit = codes
                    .iter()
                    .any(|c| c.trim().eq_ignore_ascii_case(&purchase.currency));
                hit != *exclude
            }
            RuleCondition::Amount { min, max } => {
                min.map_or(true, |m| purchase.amount >= m) && max.map_or(true, |m| purchase.amount <= m)
            }
            RuleCondition::Contactless => purchase.is_contactless,
            RuleCondition::Online => purchase.is_online,
            RuleCondition::InStore => !purchase.is_online,
        }
    }
}

/// Case-insensitive merchant match. Patterns are regular expressions; a
/// pattern that does not compile is matched as a plain substring.
fn merchant_matches(pattern: &str, merchant: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(merchant),
        Err(_) => merchant.to_lowercase().contains(&pattern.to_lowercase()),
    }
}

/// A bonus rule attached to a payment method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRule {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub enabled: bool,
    /// Higher priority wins when several rules match
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    /// Extra points per currency unit on top of the card's base rate
    pub bonus_multiplier: Decimal,
    /// Overrides the card's calculation method for the bonus portion
    #[serde(default)]
    pub calculation_method: Option<CalculationMethod>,
    /// Maximum bonus points per spend period
    #[serde(default)]
    pub monthly_cap: Option<u64>,
    /// Spend needed within the period before the bonus kicks in
    #[serde(default)]
    pub min_spend: Option<Decimal>,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

impl RewardRule {
    pub fn new(name: impl Into<String>, bonus_multiplier: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            enabled: true,
            priority: 0,
            conditions: Vec::new(),
            bonus_multiplier,
            calculation_method: None,
            monthly_cap: None,
            min_spend: None,
            valid_from: None,
            valid_until: None,
        }
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether the rule is in force on `date`
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from.map_or(true, |from| date >= from)
            && self.valid_until.map_or(true, |until| date <= until)
    }

    /// Whether the rule applies to the purchase
    pub fn applies_to(&self, purchase: &PurchaseInput, category: &str) -> bool {
        self.enabled
            && self.is_valid_on(purchase.date)
            && self.conditions.iter().all(|c| c.matches(purchase, category))
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("rule name cannot be empty");
        }
        if self.bonus_multiplier < Decimal::ZERO {
            return Err("bonus multiplier cannot be negative");
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if from > until {
                return Err("rule validity window ends before it starts");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(amount: i64) -> PurchaseInput {
        PurchaseInput::new(
            Decimal::new(amount, 2),
            "SGD",
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
        )
    }

    #[test]
    fn test_standard_rounding() {
        let amount = Decimal::new(1050, 2); // 10.50
        let mult = Decimal::new(15, 1); // 1.5 → 15.75
        assert_eq!(CalculationMethod::Standard { rounding: Rounding::Floor }.points(amount, mult), 15);
        assert_eq!(CalculationMethod::Standard { rounding: Rounding::Ceil }.points(amount, mult), 16);
        assert_eq!(CalculationMethod::Standard { rounding: Rounding::Nearest }.points(amount, mult), 16);
    }

    #[test]
    fn test_rounded_amount() {
        // 10.60 rounds to 11 before multiplying
        let method = CalculationMethod::RoundedAmount { amount_rounding: Rounding::Nearest };
        assert_eq!(method.points(Decimal::new(1060, 2), Decimal::from(4)), 44);
        let method = CalculationMethod::RoundedAmount { amount_rounding: Rounding::Floor };
        assert_eq!(method.points(Decimal::new(1060, 2), Decimal::from(4)), 40);
    }

    #[test]
    fn test_block_method() {
        let method = CalculationMethod::Block { block_size: Decimal::from(5) };
        // 24.99 contains four complete blocks of 5
        assert_eq!(method.points(Decimal::new(2499, 2), Decimal::from(10)), 40);
        assert_eq!(method.points(Decimal::new(499, 2), Decimal::from(10)), 0);

        let broken = CalculationMethod::Block { block_size: Decimal::ZERO };
        assert_eq!(broken.points(Decimal::from(100), Decimal::from(10)), 0);
    }

    #[test]
    fn test_huge_amounts_saturate() {
        let standard = CalculationMethod::default();
        assert_eq!(standard.points(Decimal::MAX, Decimal::from(3)), u64::MAX);
        assert_eq!(standard.points(Decimal::from(u64::MAX), Decimal::from(2)), u64::MAX);

        let rounded = CalculationMethod::RoundedAmount { amount_rounding: Rounding::Ceil };
        assert_eq!(rounded.points(Decimal::MAX, Decimal::from(2)), u64::MAX);

        let block = CalculationMethod::Block { block_size: Decimal::new(1, 4) };
        assert_eq!(block.points(Decimal::MAX, Decimal::ONE), u64::MAX);
    }

    #[test]
    fn test_no_points_for_refunds() {
        let method = CalculationMethod::default();
        assert_eq!(method.points(Decimal::from(-20), Decimal::from(2)), 0);
        assert_eq!(method.points(Decimal::ZERO, Decimal::from(2)), 0);
    }

    #[test]
    fn test_mcc_condition_with_exclude() {
        let p = purchase(1000).with_mcc("5812");
        let include = RuleCondition::Mcc { codes: vec!["5812".into(), "5814".into()], exclude: false };
        let exclude = RuleCondition::Mcc { codes: vec!["5812".into()], exclude: true };
        assert!(include.matches(&p, "Dining"));
        assert!(!exclude.matches(&p, "Dining"));
        // No MCC never matches an include list
        assert!(!include.matches(&purchase(1000), "Uncategorized"));
    }

    #[test]
    fn test_merchant_patterns() {
        let p = purchase(1000).with_merchant("GRAB*Food 1234");
        let regex = RuleCondition::Merchant { patterns: vec!["^grab".into()], exclude: false };
        let substring = RuleCondition::Merchant { patterns: vec!["food 12".into()], exclude: false };
        let broken = RuleCondition::Merchant { patterns: vec!["grab*(".into()], exclude: false };
        assert!(regex.matches(&p, ""));
        assert!(substring.matches(&p, ""));
        // Invalid regex falls back to substring
        assert!(!broken.matches(&p, ""));
        let p2 = purchase(1000).with_merchant("xx grab*( yy");
        assert!(broken.matches(&p2, ""));
    }

    #[test]
    fn test_channel_and_amount_conditions() {
        let p = purchase(2500).online();
        assert!(RuleCondition::Online.matches(&p, ""));
        assert!(!RuleCondition::InStore.matches(&p, ""));
        assert!(!RuleCondition::Contactless.matches(&p, ""));

        let range = RuleCondition::Amount { min: Some(Decimal::from(10)), max: Some(Decimal::from(25)) };
        assert!(range.matches(&p, ""));
        assert!(!range.matches(&purchase(2501), ""));
    }

    #[test]
    fn test_currency_condition() {
        let sgd = purchase(1000);
        let usd = PurchaseInput::new(Decimal::from(10), "usd", NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        let foreign = RuleCondition::Currency { codes: vec!["SGD".into()], exclude: true };
        let local = RuleCondition::Currency { codes: vec![" sgd ".into(), "MYR".into()], exclude: false };
        assert!(!foreign.matches(&sgd, ""));
        assert!(foreign.matches(&usd, ""));
        assert!(local.matches(&sgd, ""));
        assert!(!local.matches(&usd, ""));
    }

    #[test]
    fn test_contactless_condition() {
        let tap = purchase(1000).contactless();
        assert!(RuleCondition::Contactless.matches(&tap, ""));
        assert!(RuleCondition::InStore.matches(&tap, ""));
        assert!(!RuleCondition::Online.matches(&tap, ""));
        assert!(!RuleCondition::Contactless.matches(&purchase(1000), ""));
    }

    #[test]
    fn test_category_condition_with_exclude() {
        let p = purchase(1000);
        let travel = RuleCondition::Category { categories: vec!["Travel".into()], exclude: false };
        let not_travel = RuleCondition::Category { categories: vec!["Travel".into()], exclude: true };
        assert!(travel.matches(&p, "travel"));
        assert!(!not_travel.matches(&p, "Travel"));
        assert!(not_travel.matches(&p, "Dining"));
        assert!(not_travel.matches(&p, "Uncategorized"));
    }

    #[test]
    fn test_rule_validity_window() {
        let mut rule = RewardRule::new("Summer promo", Decimal::from(3));
        rule.valid_from = NaiveDate::from_ymd_opt(2025, 6, 1);
        rule.valid_until = NaiveDate::from_ymd_opt(2025, 6, 30);
        assert!(rule.applies_to(&purchase(1000), ""));

        let mut late = purchase(1000);
        late.date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert!(!rule.applies_to(&late, ""));

        rule.enabled = false;
        assert!(!rule.applies_to(&purchase(1000), ""));
    }

    #[test]
    fn test_condition_serde_shape() {
        let json = r#"{"type":"mcc","codes":["5411"]}"#;
        let condition: RuleCondition = serde_json::from_str(json).unwrap();
        assert_eq!(condition, RuleCondition::Mcc { codes: vec!["5411".into()], exclude: false });
    }
}
