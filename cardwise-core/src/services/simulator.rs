//! Card simulator - which card would have earned the most for a purchase
//!
//! Runs one calculation per active card concurrently and ranks the results.
//! A card that fails does not abort the batch: it is reported with zero
//! points and its error, and ranked after every successful card.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{PaymentMethod, PurchaseInput, Transaction};
use crate::ports::Repository;
use crate::services::conversion::ConversionService;
use crate::services::rewards::RewardService;

/// One card's outcome for a simulated purchase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub payment_method_id: Uuid,
    pub payment_method_name: String,
    pub reward_currency_id: Option<Uuid>,
    pub reward_currency_code: Option<String>,
    pub base_points: u64,
    pub bonus_points: u64,
    pub total_points: u64,
    /// Points expressed in the target currency (raw points when no target)
    pub converted_value: Option<u64>,
    pub applied_rule: Option<String>,
    pub messages: Vec<String>,
    pub error: Option<String>,
}

impl SimulationResult {
    fn failed(method: &PaymentMethod, error: String) -> Self {
        Self {
            payment_method_id: method.id,
            payment_method_name: method.name.clone(),
            reward_currency_id: method.reward_currency_id,
            reward_currency_code: None,
            base_points: 0,
            bonus_points: 0,
            total_points: 0,
            converted_value: None,
            applied_rule: None,
            messages: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Actual card versus the best card for a past transaction
#[derive(Debug, Clone, Serialize)]
pub struct CardRecommendation {
    pub actual: Option<SimulationResult>,
    pub best: Option<SimulationResult>,
    /// How much more the best card would have earned, in target units
    pub missed_value: u64,
}

impl CardRecommendation {
    /// Whether the transaction was already made with the best card
    pub fn used_best_card(&self) -> bool {
        match (&self.actual, &self.best) {
            (Some(actual), Some(best)) => actual.payment_method_id == best.payment_method_id || self.missed_value == 0,
            _ => false,
        }
    }
}

/// Ranking: successes before failures, converted value desc (known values
/// before unknown), then card name asc.
fn rank(a: &SimulationResult, b: &SimulationResult) -> Ordering {
    b.is_success()
        .cmp(&a.is_success())
        .then_with(|| match (a.converted_value, b.converted_value) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.payment_method_name.cmp(&b.payment_method_name))
}

/// Card simulator service
pub struct CardSimulator {
    repository: Arc<dyn Repository>,
    rewards: Arc<RewardService>,
    conversion: Arc<ConversionService>,
}

impl CardSimulator {
    pub fn new(
        repository: Arc<dyn Repository>,
        rewards: Arc<RewardService>,
        conversion: Arc<ConversionService>,
    ) -> Self {
        Self {
            repository,
            rewards,
            conversion,
        }
    }

    /// Simulate a purchase on every active card, best first.
    ///
    /// With a `target` currency each card's points are converted into it;
    /// a card with no rate to the target keeps its points but has no
    /// converted value and ranks after the cards that do.
    pub async fn simulate(&self, purchase: &PurchaseInput, target: Option<Uuid>) -> Result<Vec<SimulationResult>> {
        self.simulate_excluding(purchase, target, None).await
    }

    /// Like [`simulate`](Self::simulate), leaving `exclude_transaction` out of
    /// every card's period spend. Used to replay a stored transaction.
    pub async fn simulate_excluding(
        &self,
        purchase: &PurchaseInput,
        target: Option<Uuid>,
        exclude_transaction: Option<Uuid>,
    ) -> Result<Vec<SimulationResult>> {
        let methods = self.repository.get_active_payment_methods().await?;

        let runs = methods
            .iter()
            .map(|method| self.simulate_card(method, purchase, target, exclude_transaction));
        let mut results: Vec<SimulationResult> = join_all(runs).await;

        results.sort_by(rank);

        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            tracing::warn!(failed, total = results.len(), "some cards failed to simulate");
        }

        Ok(results)
    }

    async fn simulate_card(
        &self,
        method: &PaymentMethod,
        purchase: &PurchaseInput,
        target: Option<Uuid>,
        exclude_transaction: Option<Uuid>,
    ) -> SimulationResult {
        match self.try_simulate_card(method.id, purchase, target, exclude_transaction).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(payment_method = %method.id, error = %e, "card simulation failed");
                SimulationResult::failed(method, e.to_string())
            }
        }
    }

    async fn try_simulate_card(
        &self,
        id: Uuid,
        purchase: &PurchaseInput,
        target: Option<Uuid>,
        exclude_transaction: Option<Uuid>,
    ) -> Result<SimulationResult> {
        // Reload so the rules are the latest the backend has
        let method = self.rewards.payment_method(id).await?;
        let calc = self
            .rewards
            .calculate_for_method(&method, purchase, exclude_transaction)
            .await?;

        // A card without a reward currency earns zero, which is zero in any target
        let (currency, converted_value) = match (method.reward_currency_id, target) {
            (None, _) => (None, Some(0)),
            (Some(currency_id), Some(target_id)) => (
                self.repository.get_reward_currency(currency_id).await?,
                self.conversion
                    .convert_points(calc.total_points, currency_id, target_id)
                    .await,
            ),
            (Some(currency_id), None) => (
                self.repository.get_reward_currency(currency_id).await?,
                Some(calc.total_points),
            ),
        };

        let mut messages = calc.messages;
        if converted_value.is_none() {
            messages.push("No conversion rate to the target currency".to_string());
        }

        Ok(SimulationResult {
            payment_method_id: method.id,
            payment_method_name: method.name,
            reward_currency_id: method.reward_currency_id,
            reward_currency_code: currency.map(|c| c.code),
            base_points: calc.base_points,
            bonus_points: calc.bonus_points,
            total_points: calc.total_points,
            converted_value,
            applied_rule: calc.applied_rule.map(|r| r.name),
            messages,
            error: None,
        })
    }

    /// Compare the card a transaction was paid with against the best card
    pub async fn recommend(&self, tx: &Transaction, target: Option<Uuid>) -> Result<CardRecommendation> {
        let results = self
            .simulate_excluding(&PurchaseInput::from(tx), target, Some(tx.id))
            .await?;

        let best = results.iter().find(|r| r.is_success()).cloned();
        let actual = tx
            .payment_method_id
            .and_then(|id| results.iter().find(|r| r.payment_method_id == id))
            .cloned();

        let missed_value = match (&actual, &best) {
            (Some(a), Some(b)) => b
                .converted_value
                .unwrap_or(0)
                .saturating_sub(a.converted_value.unwrap_or(0)),
            _ => 0,
        };

        Ok(CardRecommendation {
            actual,
            best,
            missed_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryRepository;
    use crate::domain::{ConversionRate, RewardCurrency, RewardRule, RuleCondition};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    struct Fixture {
        repo: Arc<MemoryRepository>,
        simulator: CardSimulator,
        miles: Uuid,
    }

    async fn card(repo: &MemoryRepository, name: &str, currency: Option<Uuid>, multiplier: i64) -> PaymentMethod {
        let mut method = PaymentMethod::new(Uuid::new_v4(), name);
        method.reward_currency_id = currency;
        method.points_multiplier = Decimal::from(multiplier);
        repo.upsert_payment_method(&method).await.unwrap();
        method
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let bank = RewardCurrency::new(Uuid::new_v4(), "PTS", "Bank Points");
        let miles = RewardCurrency::new(Uuid::new_v4(), "KF", "KrisFlyer");
        repo.upsert_reward_currency(&bank).await.unwrap();
        repo.upsert_reward_currency(&miles).await.unwrap();
        repo.upsert_conversion_rate(&ConversionRate::new(bank.id, miles.id, Decimal::new(4, 1)))
            .await
            .unwrap();

        let dyn_repo: Arc<dyn Repository> = repo.clone();
        let rewards = Arc::new(RewardService::new(Arc::clone(&dyn_repo)));
        let conversion = Arc::new(ConversionService::new(Arc::clone(&dyn_repo)));
        let simulator = CardSimulator::new(dyn_repo, rewards, conversion);

        Fixture {
            repo,
            simulator,
            miles: miles.id,
        }
    }

    fn purchase() -> PurchaseInput {
        PurchaseInput::new(Decimal::from(100), "SGD", NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()).with_mcc("5812")
    }

    #[tokio::test]
    async fn test_ranking_by_converted_value() {
        let f = fixture().await;
        let bank = f.repo.get_reward_currencies().await.unwrap().into_iter().find(|c| c.code == "PTS").unwrap();

        // 5 bank points per dollar → 200 miles
        card(&f.repo, "Bank 5x", Some(bank.id), 5).await;
        // 1.2 miles per dollar direct → 120 miles
        let mut direct = PaymentMethod::new(Uuid::new_v4(), "Miles Direct");
        direct.reward_currency_id = Some(f.miles);
        direct.points_multiplier = Decimal::new(12, 1);
        f.repo.upsert_payment_method(&direct).await.unwrap();
        // Inactive cards are ignored
        let mut retired = card(&f.repo, "Retired", Some(f.miles), 50).await;
        retired.is_active = false;
        f.repo.upsert_payment_method(&retired).await.unwrap();

        let results = f.simulator.simulate(&purchase(), Some(f.miles)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].payment_method_name, "Bank 5x");
        assert_eq!(results[0].converted_value, Some(200));
        assert_eq!(results[0].total_points, 500);
        assert_eq!(results[1].payment_method_name, "Miles Direct");
        assert_eq!(results[1].converted_value, Some(120));
    }

    #[tokio::test]
    async fn test_ties_break_alphabetically() {
        let f = fixture().await;
        card(&f.repo, "Zeta", Some(f.miles), 2).await;
        card(&f.repo, "Alpha", Some(f.miles), 2).await;

        let results = f.simulator.simulate(&purchase(), Some(f.miles)).await.unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.payment_method_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn test_failures_ranked_last_with_zero_points() {
        let f = fixture().await;
        let flaky = card(&f.repo, "Aardvark Flaky", Some(f.miles), 10).await;
        card(&f.repo, "No Rewards", None, 1).await;
        card(&f.repo, "Steady", Some(f.miles), 1).await;
        f.repo.set_payment_method_unavailable(flaky.id, true).await;

        let results = f.simulator.simulate(&purchase(), Some(f.miles)).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].payment_method_name, "Steady");
        assert!(results[0].is_success());

        // Earning nothing is not a failure
        assert_eq!(results[1].payment_method_name, "No Rewards");
        assert!(results[1].is_success());
        assert_eq!(results[1].total_points, 0);
        assert_eq!(results[1].converted_value, Some(0));
        assert!(results[1].messages.iter().any(|m| m.contains("earns no rewards")));

        assert_eq!(results[2].payment_method_name, "Aardvark Flaky");
        assert_eq!(results[2].total_points, 0);
        assert!(results[2].error.as_ref().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_missing_rate_ranks_after_known_values() {
        let f = fixture().await;
        let orphan = RewardCurrency::new(Uuid::new_v4(), "ORP", "Orphan Points");
        f.repo.upsert_reward_currency(&orphan).await.unwrap();
        card(&f.repo, "Aaa Orphan", Some(orphan.id), 100).await;
        card(&f.repo, "Zzz Miles", Some(f.miles), 1).await;

        let results = f.simulator.simulate(&purchase(), Some(f.miles)).await.unwrap();
        assert_eq!(results[0].payment_method_name, "Zzz Miles");
        assert_eq!(results[1].converted_value, None);
        assert_eq!(results[1].total_points, 10000);
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn test_bonus_rules_apply_in_simulation() {
        let f = fixture().await;
        let mut dining = PaymentMethod::new(Uuid::new_v4(), "Dining");
        dining.reward_currency_id = Some(f.miles);
        dining.reward_rules.push(
            RewardRule::new("Dining bonus", Decimal::from(3)).with_condition(RuleCondition::Mcc {
                codes: vec!["5812".to_string()],
                exclude: false,
            }),
        );
        f.repo.upsert_payment_method(&dining).await.unwrap();
        card(&f.repo, "Flat 2x", Some(f.miles), 2).await;

        let results = f.simulator.simulate(&purchase(), None).await.unwrap();
        assert_eq!(results[0].payment_method_name, "Dining");
        assert_eq!(results[0].converted_value, Some(400));
        assert_eq!(results[0].applied_rule.as_deref(), Some("Dining bonus"));
    }

    #[tokio::test]
    async fn test_recommend() {
        let f = fixture().await;
        let weak = card(&f.repo, "Weak", Some(f.miles), 1).await;
        let strong = card(&f.repo, "Strong", Some(f.miles), 3).await;

        let mut tx = Transaction::new(Uuid::new_v4(), Decimal::from(50), "SGD", NaiveDate::from_ymd_opt(2025, 8, 2).unwrap());
        tx.payment_method_id = Some(weak.id);

        let rec = f.simulator.recommend(&tx, Some(f.miles)).await.unwrap();
        assert_eq!(rec.best.as_ref().unwrap().payment_method_id, strong.id);
        assert_eq!(rec.actual.as_ref().unwrap().payment_method_id, weak.id);
        assert_eq!(rec.missed_value, 100);
        assert!(!rec.used_best_card());

        tx.payment_method_id = Some(strong.id);
        let rec = f.simulator.recommend(&tx, Some(f.miles)).await.unwrap();
        assert_eq!(rec.missed_value, 0);
        assert!(rec.used_best_card());
    }

    #[tokio::test]
    async fn test_recommend_does_not_count_transaction_against_itself() {
        let f = fixture().await;
        let mut dining = PaymentMethod::new(Uuid::new_v4(), "Dining 4x");
        dining.reward_currency_id = Some(f.miles);
        let mut rule = RewardRule::new("Dining bonus", Decimal::from(3)).with_condition(RuleCondition::Mcc {
            codes: vec!["5812".to_string()],
            exclude: false,
        });
        rule.monthly_cap = Some(1000);
        rule.min_spend = Some(Decimal::from(300));
        dining.reward_rules.push(rule);
        f.repo.upsert_payment_method(&dining).await.unwrap();
        card(&f.repo, "Flat 2x", Some(f.miles), 2).await;

        let mut tx = Transaction::new(Uuid::new_v4(), Decimal::from(300), "SGD", NaiveDate::from_ymd_opt(2025, 8, 5).unwrap());
        tx.payment_method_id = Some(dining.id);
        tx.mcc = Some("5812".to_string());
        let recorded = RewardService::new(f.repo.clone()).record_transaction(&mut tx).await.unwrap();
        assert_eq!(recorded.total_points, 1200);

        let rec = f.simulator.recommend(&tx, None).await.unwrap();
        let actual = rec.actual.as_ref().unwrap();
        assert_eq!(actual.total_points, recorded.total_points);
        assert_eq!(rec.best.as_ref().unwrap().payment_method_id, dining.id);
        assert_eq!(rec.missed_value, 0);
        assert!(rec.used_best_card());
    }
}
