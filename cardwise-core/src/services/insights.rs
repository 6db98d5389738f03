//! Insight service - evaluates spending insight conditions
//!
//! Every insight names a condition function. The functions all read one
//! shared aggregate context built from the current and previous period's
//! transactions, and report whether they fired plus the values a message
//! template would be filled with. Rendering the template is left to the
//! caller.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{CategoryMap, Insight, Transaction};
use crate::ports::Repository;
use crate::services::categorize::CategoryService;

/// Aggregates shared by every condition
#[derive(Debug, Clone, Default)]
pub struct InsightContext {
    pub total_spend: Decimal,
    pub previous_total_spend: Decimal,
    pub category_spend: HashMap<String, Decimal>,
    pub previous_category_spend: HashMap<String, Decimal>,
    /// Merchant → (purchase count, spend)
    pub merchants: HashMap<String, (usize, Decimal)>,
    pub transaction_count: usize,
    pub largest: Option<(String, Decimal)>,
    pub weekend_spend: Decimal,
    pub points_earned: u64,
    pub pending_reimbursements: Decimal,
    pub reimbursement_count: usize,
    purchase_amounts: Vec<Decimal>,
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

impl InsightContext {
    /// Build the context from purchases in the current and previous period
    pub fn build(current: &[Transaction], previous: &[Transaction], categories: &CategoryMap) -> Self {
        let mut ctx = Self::default();

        for tx in current.iter().filter(|t| t.is_purchase()) {
            let category = tx.effective_category(categories);
            ctx.total_spend += tx.amount;
            *ctx.category_spend.entry(category).or_insert(Decimal::ZERO) += tx.amount;

            let merchant = tx
                .merchant_name
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("Unknown merchant")
                .to_string();
            let entry = ctx.merchants.entry(merchant.clone()).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += tx.amount;

            let bigger = ctx.largest.as_ref().map_or(true, |(_, amount)| tx.amount > *amount);
            if bigger {
                ctx.largest = Some((merchant, tx.amount));
            }

            if is_weekend(tx.transaction_date) {
                ctx.weekend_spend += tx.amount;
            }
            if let Some(reimbursement) = tx.reimbursement_amount.filter(|r| *r > Decimal::ZERO) {
                ctx.pending_reimbursements += reimbursement;
                ctx.reimbursement_count += 1;
            }

            ctx.points_earned += tx.reward_points;
            ctx.transaction_count += 1;
            ctx.purchase_amounts.push(tx.amount);
        }

        for tx in previous.iter().filter(|t| t.is_purchase()) {
            ctx.previous_total_spend += tx.amount;
            *ctx
                .previous_category_spend
                .entry(tx.effective_category(categories))
                .or_insert(Decimal::ZERO) += tx.amount;
        }

        ctx
    }

    pub fn average_transaction(&self) -> Decimal {
        if self.transaction_count == 0 {
            Decimal::ZERO
        } else {
            self.total_spend / Decimal::from(self.transaction_count as u64)
        }
    }

    /// Largest category by spend, ties broken by name
    fn top_category(&self) -> Option<(&String, &Decimal)> {
        self.category_spend
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
    }
}

/// Result of one condition function
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightOutcome {
    pub triggered: bool,
    pub data: Map<String, JsonValue>,
}

impl InsightOutcome {
    fn skip() -> Self {
        Self::default()
    }

    fn fired(triggered: bool, data: JsonValue) -> Self {
        let data = match data {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        Self { triggered, data }
    }
}

/// A condition function
pub type ConditionFn = fn(&Insight, &InsightContext) -> InsightOutcome;

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn money(value: Decimal) -> JsonValue {
    json!(to_f64(value.round_dp(2)))
}

fn percent(ratio: f64) -> JsonValue {
    json!((ratio * 100.0).round())
}

fn percent_change(current: Decimal, previous: Decimal) -> Option<f64> {
    if previous <= Decimal::ZERO {
        return None;
    }
    Some(to_f64((current - previous) / previous * Decimal::ONE_HUNDRED))
}

fn category_ratio(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    let threshold = insight.number_param("threshold").unwrap_or(0.3);
    if ctx.total_spend <= Decimal::ZERO {
        return InsightOutcome::skip();
    }

    let (category, amount) = match insight.string_param("category") {
        Some(name) => match ctx.category_spend.get(name) {
            Some(amount) => (name.to_string(), *amount),
            None => return InsightOutcome::skip(),
        },
        None => match ctx.top_category() {
            Some((name, amount)) => (name.clone(), *amount),
            None => return InsightOutcome::skip(),
        },
    };

    let ratio = to_f64(amount / ctx.total_spend);
    InsightOutcome::fired(
        ratio >= threshold,
        json!({
            "category": category,
            "amount": money(amount),
            "total": money(ctx.total_spend),
            "percentage": percent(ratio),
        }),
    )
}

fn spending_change(ctx: &InsightContext, threshold: f64, increase: bool) -> InsightOutcome {
    let Some(change) = percent_change(ctx.total_spend, ctx.previous_total_spend) else {
        return InsightOutcome::skip();
    };
    let triggered = if increase { change >= threshold } else { -change >= threshold };
    InsightOutcome::fired(
        triggered,
        json!({
            "current": money(ctx.total_spend),
            "previous": money(ctx.previous_total_spend),
            "difference": money((ctx.total_spend - ctx.previous_total_spend).abs()),
            "percentage": json!(change.abs().round()),
        }),
    )
}

fn spending_increase(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    spending_change(ctx, insight.number_param("threshold").unwrap_or(20.0), true)
}

fn spending_decrease(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    spending_change(ctx, insight.number_param("threshold").unwrap_or(20.0), false)
}

fn category_trend(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    let threshold = insight.number_param("threshold").unwrap_or(25.0);
    let wanted = insight.string_param("category");

    let mut best: Option<(String, f64, Decimal, Decimal)> = None;
    let mut names: Vec<&String> = ctx.category_spend.keys().collect();
    names.sort();
    for name in names {
        if wanted.is_some_and(|w| w != name.as_str()) {
            continue;
        }
        let current = ctx.category_spend[name];
        let previous = ctx
            .previous_category_spend
            .get(name)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if let Some(change) = percent_change(current, previous) {
            if best.as_ref().map_or(true, |(_, c, _, _)| change > *c) {
                best = Some((name.clone(), change, current, previous));
            }
        }
    }

    match best {
        Some((category, change, current, previous)) => InsightOutcome::fired(
            change >= threshold,
            json!({
                "category": category,
                "current": money(current),
                "previous": money(previous),
                "percentage": json!(change.round()),
            }),
        ),
        None => InsightOutcome::skip(),
    }
}

fn frequent_merchant(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    let min_count = insight.number_param("min_count").unwrap_or(5.0);
    let top = ctx
        .merchants
        .iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then_with(|| b.0.cmp(a.0)));

    match top {
        Some((merchant, (count, amount))) => InsightOutcome::fired(
            *count as f64 >= min_count,
            json!({
                "merchant": merchant,
                "count": count,
                "amount": money(*amount),
            }),
        ),
        None => InsightOutcome::skip(),
    }
}

fn large_transaction(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    let threshold = insight.number_param("amount").unwrap_or(500.0);
    match &ctx.largest {
        Some((merchant, amount)) => InsightOutcome::fired(
            to_f64(*amount) >= threshold,
            json!({
                "merchant": merchant,
                "amount": money(*amount),
            }),
        ),
        None => InsightOutcome::skip(),
    }
}

fn weekend_spending(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    let threshold = insight.number_param("threshold").unwrap_or(0.4);
    if ctx.total_spend <= Decimal::ZERO {
        return InsightOutcome::skip();
    }
    let ratio = to_f64(ctx.weekend_spend / ctx.total_spend);
    InsightOutcome::fired(
        ratio >= threshold,
        json!({
            "amount": money(ctx.weekend_spend),
            "percentage": percent(ratio),
        }),
    )
}

fn low_reward_rate(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    let threshold = insight.number_param("threshold").unwrap_or(1.0);
    if ctx.total_spend <= Decimal::ZERO {
        return InsightOutcome::skip();
    }
    let rate = to_f64(Decimal::from(ctx.points_earned) / ctx.total_spend);
    InsightOutcome::fired(
        rate < threshold,
        json!({
            "rate": json!((rate * 100.0).round() / 100.0),
            "points": ctx.points_earned,
            "spend": money(ctx.total_spend),
        }),
    )
}

fn pending_reimbursements(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    let min_amount = insight.number_param("min_amount").unwrap_or(0.0);
    if ctx.reimbursement_count == 0 {
        return InsightOutcome::skip();
    }
    InsightOutcome::fired(
        to_f64(ctx.pending_reimbursements) > min_amount,
        json!({
            "amount": money(ctx.pending_reimbursements),
            "count": ctx.reimbursement_count,
        }),
    )
}

fn small_purchases(insight: &Insight, ctx: &InsightContext) -> InsightOutcome {
    let max_amount = insight.number_param("max_amount").unwrap_or(10.0);
    let min_count = insight.number_param("min_count").unwrap_or(10.0);

    let small: Vec<Decimal> = ctx
        .purchase_amounts
        .iter()
        .copied()
        .filter(|a| to_f64(*a) <= max_amount)
        .collect();
    let total: Decimal = small.iter().copied().sum();

    InsightOutcome::fired(
        small.len() as f64 >= min_count,
        json!({
            "count": small.len(),
            "amount": money(total),
        }),
    )
}

/// Table of named condition functions
pub struct InsightEvaluator {
    conditions: HashMap<&'static str, ConditionFn>,
}

impl Default for InsightEvaluator {
    fn default() -> Self {
        let mut conditions: HashMap<&'static str, ConditionFn> = HashMap::new();
        conditions.insert("category_ratio", category_ratio);
        conditions.insert("spending_increase", spending_increase);
        conditions.insert("spending_decrease", spending_decrease);
        conditions.insert("category_trend", category_trend);
        conditions.insert("frequent_merchant", frequent_merchant);
        conditions.insert("large_transaction", large_transaction);
        conditions.insert("weekend_spending", weekend_spending);
        conditions.insert("low_reward_rate", low_reward_rate);
        conditions.insert("pending_reimbursements", pending_reimbursements);
        conditions.insert("small_purchases", small_purchases);
        Self { conditions }
    }
}

impl InsightEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a condition function
    pub fn register(&mut self, name: &'static str, condition: ConditionFn) {
        self.conditions.insert(name, condition);
    }

    pub fn condition_types(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.conditions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Evaluate one insight; None for an unknown condition type
    pub fn evaluate(&self, insight: &Insight, ctx: &InsightContext) -> Option<InsightOutcome> {
        let condition = self.conditions.get(insight.condition_type.as_str())?;
        Some(condition(insight, ctx))
    }
}

/// An insight whose condition fired
#[derive(Debug, Clone, Serialize)]
pub struct TriggeredInsight {
    pub insight_id: Uuid,
    pub name: String,
    pub priority: i32,
    /// Unrendered message template
    pub message_template: String,
    /// Values for the template placeholders
    pub data: Map<String, JsonValue>,
}

/// Insight service: loads insights and transactions and runs the evaluator
pub struct InsightService {
    repository: Arc<dyn Repository>,
    categories: CategoryService,
    evaluator: InsightEvaluator,
}

impl InsightService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            categories: CategoryService::new(Arc::clone(&repository)),
            repository,
            evaluator: InsightEvaluator::new(),
        }
    }

    /// Evaluate active, undismissed insights for an inclusive period.
    ///
    /// The comparison period is the same number of days immediately before.
    pub async fn evaluate(&self, period_start: NaiveDate, period_end: NaiveDate) -> Result<Vec<TriggeredInsight>> {
        if period_end < period_start {
            return Err(Error::validation("insight period ends before it starts"));
        }

        let days = (period_end - period_start).num_days() + 1;
        let previous_end = period_start - Duration::days(1);
        let previous_start = period_start - Duration::days(days);

        let insights = self.repository.get_insights().await?;
        let dismissed: HashSet<Uuid> = self
            .repository
            .get_dismissed_insight_ids()
            .await?
            .into_iter()
            .collect();
        let current = self
            .repository
            .get_transactions_by_date_range(period_start, period_end)
            .await?;
        let previous = self
            .repository
            .get_transactions_by_date_range(previous_start, previous_end)
            .await?;

        let categories = self.categories.category_map().await;
        let ctx = InsightContext::build(&current, &previous, &categories);

        let mut triggered = Vec::new();
        for insight in insights
            .iter()
            .filter(|i| i.is_active && !dismissed.contains(&i.id))
        {
            match self.evaluator.evaluate(insight, &ctx) {
                Some(outcome) if outcome.triggered => triggered.push(TriggeredInsight {
                    insight_id: insight.id,
                    name: insight.name.clone(),
                    priority: insight.priority,
                    message_template: insight.message_template.clone(),
                    data: outcome.data,
                }),
                Some(_) => {}
                None => {
                    tracing::warn!(
                        insight = %insight.id,
                        condition = %insight.condition_type,
                        "unknown insight condition type, skipping"
                    );
                }
            }
        }

        triggered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Ok(triggered)
    }

    /// Hide an insight for this user
    pub async fn dismiss(&self, insight_id: Uuid) -> Result<()> {
        self.repository.dismiss_insight(insight_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryRepository;

    fn day(d: u32) -> NaiveDate {
        // March 2025: the 1st is a Saturday
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn tx(amount: i64, mcc: &str, merchant: &str, date: NaiveDate) -> Transaction {
        let mut t = Transaction::new(Uuid::new_v4(), Decimal::from(amount), "SGD", date);
        t.mcc = Some(mcc.to_string());
        t.merchant_name = Some(merchant.to_string());
        t
    }

    fn context() -> InsightContext {
        let mut current = vec![
            tx(60, "5812", "Hawker", day(1)),
            tx(40, "5812", "Hawker", day(2)),
            tx(8, "5814", "Kopi", day(4)),
            tx(92, "5411", "FairPrice", day(5)),
            tx(-20, "5411", "FairPrice", day(6)),
        ];
        current[0].reward_points = 120;
        current[3].reimbursement_amount = Some(Decimal::from(30));
        let previous = vec![tx(100, "5812", "Hawker", NaiveDate::from_ymd_opt(2025, 2, 10).unwrap())];
        InsightContext::build(&current, &previous, &CategoryMap::builtin())
    }

    #[test]
    fn test_context_aggregates() {
        let ctx = context();
        assert_eq!(ctx.total_spend, Decimal::from(200));
        assert_eq!(ctx.transaction_count, 4);
        assert_eq!(ctx.category_spend["Dining"], Decimal::from(108));
        assert_eq!(ctx.weekend_spend, Decimal::from(100));
        assert_eq!(ctx.merchants["Hawker"].0, 2);
        assert_eq!(ctx.largest, Some(("FairPrice".to_string(), Decimal::from(92))));
        assert_eq!(ctx.pending_reimbursements, Decimal::from(30));
        assert_eq!(ctx.average_transaction(), Decimal::from(50));
    }

    #[test]
    fn test_builtin_conditions() {
        let ctx = context();
        let evaluator = InsightEvaluator::new();

        let ratio = Insight::new("Dining share", "category_ratio", "").with_param("threshold", 0.5);
        let outcome = evaluator.evaluate(&ratio, &ctx).unwrap();
        assert!(outcome.triggered);
        assert_eq!(outcome.data["category"], "Dining");
        assert_eq!(outcome.data["percentage"], json!(54.0));

        let increase = Insight::new("Up", "spending_increase", "").with_param("threshold", 100);
        let outcome = evaluator.evaluate(&increase, &ctx).unwrap();
        assert!(outcome.triggered);
        assert_eq!(outcome.data["percentage"], json!(100.0));

        let decrease = Insight::new("Down", "spending_decrease", "");
        assert!(!evaluator.evaluate(&decrease, &ctx).unwrap().triggered);

        let trend = Insight::new("Dining trend", "category_trend", "").with_param("category", "Dining");
        let outcome = evaluator.evaluate(&trend, &ctx).unwrap();
        assert!(!outcome.triggered);
        assert_eq!(outcome.data["percentage"], json!(8.0));

        let merchant = Insight::new("Regular", "frequent_merchant", "").with_param("min_count", 2);
        let outcome = evaluator.evaluate(&merchant, &ctx).unwrap();
        assert!(outcome.triggered);
        assert_eq!(outcome.data["merchant"], "Hawker");

        let weekend = Insight::new("Weekend", "weekend_spending", "");
        assert!(evaluator.evaluate(&weekend, &ctx).unwrap().triggered);

        let low = Insight::new("Low rate", "low_reward_rate", "");
        let outcome = evaluator.evaluate(&low, &ctx).unwrap();
        assert!(outcome.triggered);
        assert_eq!(outcome.data["rate"], json!(0.6));

        let small = Insight::new("Small", "small_purchases", "").with_param("min_count", 1);
        let outcome = evaluator.evaluate(&small, &ctx).unwrap();
        assert!(outcome.triggered);
        assert_eq!(outcome.data["count"], json!(1));

        let large = Insight::new("Large", "large_transaction", "");
        assert!(!evaluator.evaluate(&large, &ctx).unwrap().triggered);

        assert!(evaluator.evaluate(&Insight::new("?", "astrology", ""), &ctx).is_none());
    }

    #[test]
    fn test_empty_context_never_triggers() {
        let ctx = InsightContext::default();
        let evaluator = InsightEvaluator::new();
        for name in evaluator.condition_types() {
            let insight = Insight::new(name, name, "")
                .with_param("min_count", 0)
                .with_param("threshold", 0);
            let outcome = evaluator.evaluate(&insight, &ctx).unwrap();
            if name == "small_purchases" {
                // zero small purchases against a minimum of zero
                assert!(outcome.triggered);
            } else {
                assert!(!outcome.triggered, "{} fired on empty data", name);
            }
        }
    }

    #[tokio::test]
    async fn test_service_filters_and_orders() {
        let repo = Arc::new(MemoryRepository::new());
        for t in [tx(600, "5812", "Omakase", day(8)), tx(50, "5411", "FairPrice", day(10))] {
            repo.upsert_transaction(&t).await.unwrap();
        }

        let large = Insight::new("Big spend", "large_transaction", "You spent {amount} at {merchant}").with_priority(1);
        let dining = Insight::new("Dining heavy", "category_ratio", "{category} was {percentage}%").with_priority(5);
        let mut inactive = Insight::new("Inactive", "large_transaction", "");
        inactive.is_active = false;
        let dismissed = Insight::new("Dismissed", "large_transaction", "");
        let unknown = Insight::new("Unknown", "moon_phase", "");
        for i in [&large, &dining, &inactive, &dismissed, &unknown] {
            repo.upsert_insight(i).await.unwrap();
        }
        repo.dismiss_insight(dismissed.id).await.unwrap();

        let service = InsightService::new(repo);
        let triggered = service.evaluate(day(1), day(31)).await.unwrap();
        let names: Vec<&str> = triggered.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Dining heavy", "Big spend"]);
        assert_eq!(triggered[1].data["merchant"], "Omakase");
        assert_eq!(triggered[1].message_template, "You spent {amount} at {merchant}");

        assert!(service.evaluate(day(5), day(1)).await.is_err());
    }
}
