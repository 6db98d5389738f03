//! Reward service - points earned by a purchase under a card's rules

use std::cmp::Ordering;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{CategoryMap, PaymentMethod, PurchaseInput, RewardRule, Transaction};
use crate::ports::Repository;
use crate::services::categorize::CategoryService;
use crate::services::spend::MonthlySpendTracker;

/// What the card has already earned in the current spend period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendContext {
    /// Spend on the card so far this period, before the purchase
    pub period_spend: Decimal,
    /// Bonus points already earned this period
    pub bonus_points_used: u64,
}

/// The bonus rule that produced a calculation's bonus points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRule {
    pub id: Uuid,
    pub name: String,
}

/// Outcome of evaluating a purchase against a card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointsCalculation {
    pub base_points: u64,
    pub bonus_points: u64,
    pub total_points: u64,
    pub applied_rule: Option<AppliedRule>,
    /// Bonus points still available this period under the applied rule's cap
    pub remaining_bonus: Option<u64>,
    pub messages: Vec<String>,
}

/// Order candidate rules: priority desc, bonus multiplier desc, name asc
fn rule_precedence(a: &RewardRule, b: &RewardRule) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.bonus_multiplier.cmp(&a.bonus_multiplier))
        .then_with(|| a.name.cmp(&b.name))
}

/// Compute the points a purchase earns on a card.
///
/// Pure function: the caller supplies the card with its rules, the spend
/// already recorded in the period and the category table.
pub fn calculate_points(
    purchase: &PurchaseInput,
    method: &PaymentMethod,
    spend: &SpendContext,
    categories: &CategoryMap,
) -> Result<PointsCalculation> {
    if !method.is_active {
        return Err(Error::validation(format!(
            "Payment method '{}' is inactive",
            method.name
        )));
    }

    let mut calc = PointsCalculation::default();

    if !method.earns_rewards() {
        calc.messages.push(format!("'{}' earns no rewards", method.name));
        return Ok(calc);
    }

    if purchase.amount <= Decimal::ZERO {
        calc.messages
            .push("No points for refunds or zero amounts".to_string());
        return Ok(calc);
    }

    calc.base_points = method
        .calculation_method
        .points(purchase.amount, method.points_multiplier);

    let category = categories.resolve(purchase.category_override.as_deref(), purchase.mcc.as_deref());
    let mut eligible: Vec<&RewardRule> = method
        .reward_rules
        .iter()
        .filter(|r| r.applies_to(purchase, &category))
        .collect();
    eligible.sort_by(|a, b| rule_precedence(a, b));

    let Some(rule) = eligible.first() else {
        calc.total_points = calc.base_points;
        return Ok(calc);
    };

    calc.applied_rule = Some(AppliedRule {
        id: rule.id,
        name: rule.name.clone(),
    });

    if let Some(min_spend) = rule.min_spend {
        let reached = spend.period_spend.checked_add(purchase.amount).unwrap_or(Decimal::MAX);
        if reached < min_spend {
            calc.messages.push(format!(
                "{}: minimum spend of {} not met ({} so far)",
                rule.name,
                min_spend.normalize(),
                reached.normalize()
            ));
            calc.total_points = calc.base_points;
            return Ok(calc);
        }
    }

    let method_for_bonus = rule.calculation_method.unwrap_or(method.calculation_method);
    let mut bonus = method_for_bonus.points(purchase.amount, rule.bonus_multiplier);

    if let Some(cap) = rule.monthly_cap {
        let remaining = cap.saturating_sub(spend.bonus_points_used);
        if bonus > remaining {
            calc.messages.push(format!(
                "{}: bonus capped at {} of {} points",
                rule.name, remaining, bonus
            ));
            bonus = remaining;
        }
        calc.remaining_bonus = Some(remaining - bonus);
    }

    calc.bonus_points = bonus;
    calc.total_points = calc.base_points.saturating_add(calc.bonus_points);
    Ok(calc)
}

/// Reward service: loads what a calculation needs and records results
pub struct RewardService {
    repository: Arc<dyn Repository>,
    spend_tracker: MonthlySpendTracker,
    categories: CategoryService,
}

impl RewardService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            spend_tracker: MonthlySpendTracker::new(Arc::clone(&repository)),
            categories: CategoryService::new(Arc::clone(&repository)),
            repository,
        }
    }

    /// Load a payment method or fail with NotFound
    pub async fn payment_method(&self, id: Uuid) -> Result<PaymentMethod> {
        self.repository
            .get_payment_method(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Payment method {}", id)))
    }

    /// Calculate points for a purchase on an already-loaded card
    pub async fn calculate_for_method(
        &self,
        method: &PaymentMethod,
        purchase: &PurchaseInput,
        exclude_transaction: Option<Uuid>,
    ) -> Result<PointsCalculation> {
        let spend = self
            .spend_tracker
            .spend_context(method.id, method.spend_period, purchase.date, exclude_transaction)
            .await;
        let categories = self.categories.category_map().await;
        calculate_points(purchase, method, &spend, &categories)
    }

    /// Calculate points for a purchase on the card with `payment_method_id`
    pub async fn calculate(
        &self,
        payment_method_id: Uuid,
        purchase: &PurchaseInput,
    ) -> Result<PointsCalculation> {
        let method = self.payment_method(payment_method_id).await?;
        self.calculate_for_method(&method, purchase, None).await
    }

    /// Recompute a transaction's points and store them.
    ///
    /// Transactions without a payment method, or on a card without a reward
    /// currency, earn nothing.
    pub async fn record_transaction(&self, tx: &mut Transaction) -> Result<PointsCalculation> {
        let calc = match tx.payment_method_id {
            Some(id) => {
                let method = self.payment_method(id).await?;
                self.calculate_for_method(&method, &PurchaseInput::from(&*tx), Some(tx.id))
                    .await?
            }
            None => PointsCalculation::default(),
        };

        tx.reward_points = calc.total_points;
        tx.bonus_points = calc.bonus_points;
        tx.updated_at = chrono::Utc::now();
        self.repository.upsert_transaction(tx).await?;

        Ok(calc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryRepository;
    use crate::domain::{CalculationMethod, RuleCondition, SpendPeriod};
    use chrono::NaiveDate;

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn dining_card() -> PaymentMethod {
        let mut card = PaymentMethod::new(Uuid::new_v4(), "Dining Card");
        card.reward_currency_id = Some(Uuid::new_v4());
        card.points_multiplier = Decimal::ONE;
        let mut rule = RewardRule::new("Dining 4x", Decimal::from(3)).with_condition(RuleCondition::Category {
            categories: vec!["Dining".to_string()],
            exclude: false,
        });
        rule.monthly_cap = Some(1000);
        card.reward_rules.push(rule);
        card
    }

    #[test]
    fn test_base_points_without_matching_rule() {
        let card = dining_card();
        let purchase = PurchaseInput::new(Decimal::new(4550, 2), "SGD", june(3)).with_mcc("5411");
        let calc = calculate_points(&purchase, &card, &SpendContext::default(), &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.base_points, 45);
        assert_eq!(calc.bonus_points, 0);
        assert_eq!(calc.total_points, 45);
        assert!(calc.applied_rule.is_none());
    }

    #[test]
    fn test_bonus_applies_and_tracks_cap() {
        let card = dining_card();
        let purchase = PurchaseInput::new(Decimal::from(100), "SGD", june(3)).with_mcc("5812");
        let spend = SpendContext { period_spend: Decimal::ZERO, bonus_points_used: 200 };
        let calc = calculate_points(&purchase, &card, &spend, &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.base_points, 100);
        assert_eq!(calc.bonus_points, 300);
        assert_eq!(calc.total_points, 400);
        assert_eq!(calc.remaining_bonus, Some(500));
        assert_eq!(calc.applied_rule.unwrap().name, "Dining 4x");
    }

    #[test]
    fn test_bonus_clamped_at_cap() {
        let card = dining_card();
        let purchase = PurchaseInput::new(Decimal::from(100), "SGD", june(3)).with_mcc("5812");
        let spend = SpendContext { period_spend: Decimal::ZERO, bonus_points_used: 900 };
        let calc = calculate_points(&purchase, &card, &spend, &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.bonus_points, 100);
        assert_eq!(calc.remaining_bonus, Some(0));
        assert!(calc.messages.iter().any(|m| m.contains("capped")));

        let exhausted = SpendContext { period_spend: Decimal::ZERO, bonus_points_used: 5000 };
        let calc = calculate_points(&purchase, &card, &exhausted, &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.bonus_points, 0);
        assert_eq!(calc.total_points, 100);
    }

    #[test]
    fn test_min_spend_gate() {
        let mut card = dining_card();
        card.reward_rules[0].min_spend = Some(Decimal::from(500));
        let purchase = PurchaseInput::new(Decimal::from(100), "SGD", june(3)).with_mcc("5812");

        let below = SpendContext { period_spend: Decimal::from(350), bonus_points_used: 0 };
        let calc = calculate_points(&purchase, &card, &below, &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.bonus_points, 0);
        assert!(calc.messages[0].contains("minimum spend"));

        // This purchase takes the period spend to exactly the minimum
        let reached = SpendContext { period_spend: Decimal::from(400), bonus_points_used: 0 };
        let calc = calculate_points(&purchase, &card, &reached, &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.bonus_points, 300);
    }

    #[test]
    fn test_rule_precedence() {
        let mut card = dining_card();
        let mut online = RewardRule::new("Online 10x", Decimal::from(9)).with_condition(RuleCondition::Online);
        online.priority = 5;
        card.reward_rules.push(online);
        card.reward_rules.push(RewardRule::new("A catch-all", Decimal::from(3)));

        let purchase = PurchaseInput::new(Decimal::from(10), "SGD", june(3)).with_mcc("5812").online();
        let calc = calculate_points(&purchase, &card, &SpendContext::default(), &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.applied_rule.unwrap().name, "Online 10x");
        assert_eq!(calc.total_points, 100);

        // Same priority and multiplier: alphabetical name wins
        let purchase = PurchaseInput::new(Decimal::from(10), "SGD", june(3)).with_mcc("5812");
        let calc = calculate_points(&purchase, &card, &SpendContext::default(), &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.applied_rule.unwrap().name, "A catch-all");
    }

    #[test]
    fn test_block_calculation_for_bonus() {
        let mut card = dining_card();
        card.reward_rules[0].calculation_method = Some(CalculationMethod::Block { block_size: Decimal::from(5) });
        card.reward_rules[0].bonus_multiplier = Decimal::from(10);
        card.reward_rules[0].monthly_cap = None;
        let purchase = PurchaseInput::new(Decimal::new(2399, 2), "SGD", june(3)).with_mcc("5812");
        let calc = calculate_points(&purchase, &card, &SpendContext::default(), &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.base_points, 23);
        assert_eq!(calc.bonus_points, 40);
        assert_eq!(calc.remaining_bonus, None);
    }

    #[test]
    fn test_refund_and_inactive() {
        let mut card = dining_card();
        let refund = PurchaseInput::new(Decimal::from(-30), "SGD", june(3));
        let calc = calculate_points(&refund, &card, &SpendContext::default(), &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.total_points, 0);
        assert_eq!(calc.messages.len(), 1);

        card.is_active = false;
        let purchase = PurchaseInput::new(Decimal::from(30), "SGD", june(3));
        let err = calculate_points(&purchase, &card, &SpendContext::default(), &CategoryMap::builtin()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_record_transaction_uses_period_spend() {
        let repo = Arc::new(MemoryRepository::new());
        let mut card = dining_card();
        card.spend_period = SpendPeriod::Calendar;
        repo.upsert_payment_method(&card).await.unwrap();

        let service = RewardService::new(repo.clone());

        let mut first = Transaction::new(Uuid::new_v4(), Decimal::from(300), "SGD", june(2));
        first.payment_method_id = Some(card.id);
        first.mcc = Some("5812".to_string());
        let calc = service.record_transaction(&mut first).await.unwrap();
        assert_eq!(calc.bonus_points, 900);
        assert_eq!(first.reward_points, 1200);

        let mut second = Transaction::new(Uuid::new_v4(), Decimal::from(100), "SGD", june(9));
        second.payment_method_id = Some(card.id);
        second.mcc = Some("5812".to_string());
        let calc = service.record_transaction(&mut second).await.unwrap();
        // Only 100 bonus points remain under the 1000 cap
        assert_eq!(calc.bonus_points, 100);
        assert_eq!(second.reward_points, 200);

        // Re-recording the first transaction must not count it against itself
        let calc = service.record_transaction(&mut first).await.unwrap();
        assert_eq!(calc.bonus_points, 900);

        let stored = repo.get_transactions().await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn test_huge_purchase_saturates_instead_of_overflowing() {
        let mut card = dining_card();
        card.reward_rules[0].monthly_cap = None;
        card.reward_rules[0].min_spend = Some(Decimal::from(10));
        let purchase = PurchaseInput::new(Decimal::MAX, "SGD", june(3)).with_mcc("5812");
        let spend = SpendContext { period_spend: Decimal::MAX, bonus_points_used: 0 };
        let calc = calculate_points(&purchase, &card, &spend, &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.base_points, u64::MAX);
        assert_eq!(calc.bonus_points, u64::MAX);
        assert_eq!(calc.total_points, u64::MAX);
    }

    async fn record(service: &RewardService, card: &PaymentMethod, amount: i64, date: NaiveDate) -> Transaction {
        let mut tx = Transaction::new(Uuid::new_v4(), Decimal::from(amount), "SGD", date);
        tx.payment_method_id = Some(card.id);
        tx.mcc = Some("5812".to_string());
        service.record_transaction(&mut tx).await.unwrap();
        tx
    }

    #[tokio::test]
    async fn test_statement_cycle_resets_cap() {
        let repo = Arc::new(MemoryRepository::new());
        let mut card = dining_card();
        card.spend_period = SpendPeriod::Statement { day: 15 };
        repo.upsert_payment_method(&card).await.unwrap();
        let service = RewardService::new(repo.clone());

        // Cycle May 15 - June 14
        let first = record(&service, &card, 300, june(14)).await;
        assert_eq!(first.bonus_points, 900);

        // June 15 opens a new cycle with the full cap
        let next_cycle = record(&service, &card, 100, june(15)).await;
        assert_eq!(next_cycle.bonus_points, 300);

        // Back in the first cycle only 100 bonus points remain
        let late = record(&service, &card, 100, june(10)).await;
        assert_eq!(late.bonus_points, 100);
    }

    #[tokio::test]
    async fn test_statement_cycle_resets_min_spend() {
        let repo = Arc::new(MemoryRepository::new());
        let mut card = dining_card();
        card.spend_period = SpendPeriod::Statement { day: 15 };
        card.reward_rules[0].monthly_cap = None;
        card.reward_rules[0].min_spend = Some(Decimal::from(200));
        repo.upsert_payment_method(&card).await.unwrap();
        let service = RewardService::new(repo.clone());

        let july = |day| NaiveDate::from_ymd_opt(2025, 7, day).unwrap();

        let below = record(&service, &card, 150, july(10)).await;
        assert_eq!(below.bonus_points, 0);

        // 150 + 100 clears the minimum within the June 15 - July 14 cycle
        let reached = record(&service, &card, 100, july(14)).await;
        assert_eq!(reached.bonus_points, 300);

        // July 15 starts over from zero spend
        let reset = record(&service, &card, 100, july(15)).await;
        assert_eq!(reset.bonus_points, 0);
    }

    #[test]
    fn test_card_without_reward_currency_earns_nothing() {
        let mut card = dining_card();
        card.reward_currency_id = None;
        let purchase = PurchaseInput::new(Decimal::from(100), "SGD", june(3)).with_mcc("5812");
        let calc = calculate_points(&purchase, &card, &SpendContext::default(), &CategoryMap::builtin()).unwrap();
        assert_eq!(calc.total_points, 0);
        assert!(calc.applied_rule.is_none());
        assert!(calc.messages[0].contains("earns no rewards"));
    }

    #[tokio::test]
    async fn test_calculate_unknown_card() {
        let repo = Arc::new(MemoryRepository::new());
        let service = RewardService::new(repo);
        let purchase = PurchaseInput::new(Decimal::from(10), "SGD", june(1));
        let err = service.calculate(Uuid::new_v4(), &purchase).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
