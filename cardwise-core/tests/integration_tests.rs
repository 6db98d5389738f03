//! Integration tests for cardwise-core services
//!
//! These tests run the services against a real DuckDB file in a temp
//! directory, including reopening the file to check what was persisted.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use cardwise_core::adapters::demo::{DEBIT_CARD_ID, KRISFLYER_ID, THANK_YOU_ID, UNI_DOLLARS_ID};
use cardwise_core::adapters::duckdb::DuckDbRepository;
use cardwise_core::adapters::memory::MemoryRepository;
use cardwise_core::config::Config;
use cardwise_core::domain::{
    CalculationMethod, ConversionRate, Insight, PaymentMethod, PointsBalance, PointsRedemption,
    PointsTransfer, PurchaseInput, RewardCurrency, RewardRule, RuleCondition, SpendPeriod, Transaction,
};
use cardwise_core::ports::Repository;
use cardwise_core::services::{seed_demo_data, ConversionService, DemoService, RewardService};
use cardwise_core::CardwiseContext;

// ============================================================================
// Test Helpers
// ============================================================================

/// Open (or reopen) the test database in `dir`
fn open_repo(dir: &Path) -> Arc<DuckDbRepository> {
    Arc::new(DuckDbRepository::new(&dir.join("test.duckdb")).expect("Failed to open repository"))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Card earning 1 point per dollar with a capped dining bonus
fn dining_card(currency_id: Uuid) -> PaymentMethod {
    let mut card = PaymentMethod::new(Uuid::new_v4(), "Dining Card");
    card.reward_currency_id = Some(currency_id);
    card.points_multiplier = Decimal::ONE;
    let mut rule = RewardRule::new("Dining 4X", Decimal::from(3)).with_condition(RuleCondition::Category {
        categories: vec!["Dining".to_string()],
        exclude: false,
    });
    rule.monthly_cap = Some(100);
    card.reward_rules = vec![rule];
    card
}

fn dining_purchase(card_id: Uuid, amount: i64, on: NaiveDate) -> Transaction {
    let mut tx = Transaction::new(Uuid::new_v4(), Decimal::from(amount), "SGD", on);
    tx.mcc = Some("5812".to_string());
    tx.merchant_name = Some("Hawker Centre".to_string());
    tx.payment_method_id = Some(card_id);
    tx
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_payment_method_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let currency = RewardCurrency::new(Uuid::new_v4(), "PTS", "Points");

    let mut card = dining_card(currency.id);
    card.calculation_method = CalculationMethod::Block {
        block_size: Decimal::from(5),
    };
    card.spend_period = SpendPeriod::Statement { day: 12 };
    card.points_multiplier = Decimal::new(125, 2);
    card.reward_rules[0].min_spend = Some(Decimal::new(30050, 2));
    card.reward_rules[0].valid_until = Some(date(2025, 12, 31));

    {
        let repo = open_repo(temp_dir.path());
        repo.upsert_reward_currency(&currency).await.unwrap();
        repo.upsert_payment_method(&card).await.unwrap();
    }

    let repo = open_repo(temp_dir.path());
    let loaded = repo.get_payment_method(card.id).await.unwrap().expect("card persisted");
    assert_eq!(loaded.name, card.name);
    assert_eq!(loaded.points_multiplier, Decimal::new(125, 2));
    assert_eq!(loaded.calculation_method, card.calculation_method);
    assert_eq!(loaded.spend_period, SpendPeriod::Statement { day: 12 });
    assert_eq!(loaded.reward_rules, card.reward_rules);
    assert_eq!(loaded.reward_currency_id, Some(currency.id));
}

#[tokio::test]
async fn test_reopen_does_not_rerun_migrations() {
    let temp_dir = TempDir::new().unwrap();
    {
        let repo = open_repo(temp_dir.path());
        let result = repo.run_migrations().unwrap();
        assert!(result.applied.is_empty(), "schema is created when the repository opens");
    }

    let repo = open_repo(temp_dir.path());
    let result = repo.run_migrations().unwrap();
    assert!(result.applied.is_empty());
    assert_eq!(result.already_applied, cardwise_core::migrations::MIGRATIONS.len());
}

#[tokio::test]
async fn test_rate_requires_known_currencies() {
    let temp_dir = TempDir::new().unwrap();
    let repo = open_repo(temp_dir.path());
    let known = RewardCurrency::new(Uuid::new_v4(), "A", "Alpha");
    repo.upsert_reward_currency(&known).await.unwrap();

    let err = repo
        .upsert_conversion_rate(&ConversionRate::new(known.id, Uuid::new_v4(), Decimal::ONE))
        .await
        .unwrap_err();
    assert!(err.is_foreign_key_violation());
    assert!(repo.get_conversion_rates().await.unwrap().is_empty());
}

// ============================================================================
// Rewards against stored spend
// ============================================================================

#[tokio::test]
async fn test_bonus_cap_tracks_recorded_transactions() {
    let temp_dir = TempDir::new().unwrap();
    let repo = open_repo(temp_dir.path());
    let currency = RewardCurrency::new(Uuid::new_v4(), "PTS", "Points");
    repo.upsert_reward_currency(&currency).await.unwrap();
    let card = dining_card(currency.id);
    repo.upsert_payment_method(&card).await.unwrap();

    let rewards = RewardService::new(repo.clone());

    let mut first = dining_purchase(card.id, 20, date(2025, 4, 3));
    let calc = rewards.record_transaction(&mut first).await.unwrap();
    assert_eq!((calc.base_points, calc.bonus_points), (20, 60));
    assert_eq!(calc.remaining_bonus, Some(40));

    let mut second = dining_purchase(card.id, 20, date(2025, 4, 10));
    let calc = rewards.record_transaction(&mut second).await.unwrap();
    assert_eq!(calc.bonus_points, 40, "only 40 bonus points left in April");
    assert_eq!(calc.remaining_bonus, Some(0));

    // Recomputing the first purchase must not count it against itself
    let calc = rewards.record_transaction(&mut first).await.unwrap();
    assert_eq!(calc.bonus_points, 60);

    // A new month starts a fresh cap
    let mut may = dining_purchase(card.id, 20, date(2025, 5, 1));
    let calc = rewards.record_transaction(&mut may).await.unwrap();
    assert_eq!(calc.bonus_points, 60);

    // Reopen and check the stored points
    drop(rewards);
    drop(repo);
    let repo = open_repo(temp_dir.path());
    let stored = repo
        .get_transactions_by_payment_method(card.id, date(2025, 4, 1), date(2025, 4, 30))
        .await
        .unwrap();
    let bonus: u64 = stored.iter().map(|t| t.bonus_points).sum();
    let total: u64 = stored.iter().map(|t| t.reward_points).sum();
    assert_eq!(stored.len(), 2);
    assert_eq!(bonus, 100);
    assert_eq!(total, 140);
}

#[tokio::test]
async fn test_conversion_cache_sees_rate_updates() {
    let temp_dir = TempDir::new().unwrap();
    let repo = open_repo(temp_dir.path());
    let a = RewardCurrency::new(Uuid::new_v4(), "A", "Alpha");
    let b = RewardCurrency::new(Uuid::new_v4(), "B", "Beta");
    repo.upsert_reward_currency(&a).await.unwrap();
    repo.upsert_reward_currency(&b).await.unwrap();

    let conversion = ConversionService::new(repo.clone());
    assert_eq!(conversion.convert_points(1000, a.id, b.id).await, None);

    conversion.set_rate(a.id, b.id, Decimal::new(25, 2)).await.unwrap();
    assert_eq!(conversion.convert_points(1000, a.id, b.id).await, Some(250));

    conversion.set_rate(a.id, b.id, Decimal::new(5, 1)).await.unwrap();
    assert_eq!(conversion.convert_points(1000, a.id, b.id).await, Some(500));

    conversion.delete_rate(a.id, b.id).await.unwrap();
    assert_eq!(conversion.convert_points(1000, a.id, b.id).await, None);
}

// ============================================================================
// Full context over the demo data
// ============================================================================

/// Enable demo mode in `dir` and open the context on the demo database
async fn demo_context(dir: &Path) -> CardwiseContext {
    DemoService::new(dir).enable().await.expect("demo seeding failed");
    CardwiseContext::open(dir).expect("context failed to open")
}

#[tokio::test]
async fn test_demo_context_status() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = demo_context(temp_dir.path()).await;

    assert!(Config::load(temp_dir.path()).unwrap().demo_mode);
    assert!(temp_dir.path().join("demo.duckdb").exists());
    assert!(!temp_dir.path().join("cardwise.duckdb").exists());

    let status = ctx.status_service.get_status().await.unwrap();
    assert_eq!(status.total_payment_methods, 4);
    assert_eq!(status.total_reward_currencies, 3);
    assert_eq!(status.total_conversion_rates, 3);
    assert!(status.total_transactions > 0);
    assert!(status.total_points_earned > 0);
    assert!(status.date_range.earliest <= status.date_range.latest);
}

#[tokio::test]
async fn test_demo_database_table_counts() {
    let temp_dir = TempDir::new().unwrap();
    let summary = DemoService::new(temp_dir.path()).enable().await.unwrap();

    let db_path = temp_dir.path().join("demo.duckdb");
    let repo = DuckDbRepository::new(&db_path).unwrap();
    assert_eq!(repo.db_path(), Some(db_path.as_path()));

    let counts: std::collections::HashMap<String, i64> = repo.table_counts().unwrap().into_iter().collect();
    assert_eq!(counts["payment_methods"], summary.payment_methods as i64);
    assert_eq!(counts["reward_currencies"], summary.currencies as i64);
    assert_eq!(counts["conversion_rates"], summary.rates as i64);
    assert_eq!(counts["transactions"], summary.transactions as i64);
    assert_eq!(counts["insights"], summary.insights as i64);
}

#[tokio::test]
async fn test_demo_simulation_ranks_cards() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = demo_context(temp_dir.path()).await;

    let purchase = PurchaseInput::new(Decimal::from(80), "SGD", date(2025, 6, 2))
        .with_merchant("Shopee")
        .with_mcc("5311")
        .online();
    let results = ctx.simulator.simulate(&purchase, Some(KRISFLYER_ID)).await.unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.is_success()));
    // The debit card has no reward currency, earns zero and ranks last
    let last = results.last().unwrap();
    assert_eq!(last.payment_method_id, DEBIT_CARD_ID);
    assert_eq!(last.total_points, 0);
    assert_eq!(last.converted_value, Some(0));

    let values: Vec<u64> = results.iter().map(|r| r.converted_value.unwrap_or(0)).collect();
    assert!(values.windows(2).all(|w| w[0] >= w[1]), "ranked best first: {:?}", values);
    assert!(results[0].converted_value.unwrap_or(0) > 0);
}

#[tokio::test]
async fn test_demo_ledger_balances() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = demo_context(temp_dir.path()).await;

    let before = ctx.ledger_service.balance(THANK_YOU_ID).await.unwrap();
    assert_eq!(
        before.balance,
        before.starting_balance + before.adjustments + before.earned as i64
            - before.redeemed as i64
            - before.transferred_out as i64
            + before.transferred_in as i64
    );

    ctx.repository
        .set_points_balance(&PointsBalance {
            currency_id: THANK_YOU_ID,
            starting_balance: before.starting_balance + 1000,
        })
        .await
        .unwrap();
    ctx.ledger_service
        .redeem(&PointsRedemption {
            id: Uuid::new_v4(),
            currency_id: THANK_YOU_ID,
            points: 300,
            description: Some("Voucher".to_string()),
            date: date(2025, 6, 1),
        })
        .await
        .unwrap();
    ctx.ledger_service
        .transfer(&PointsTransfer {
            id: Uuid::new_v4(),
            source_currency_id: THANK_YOU_ID,
            target_currency_id: KRISFLYER_ID,
            points: 500,
            received: 200,
            date: date(2025, 6, 2),
        })
        .await
        .unwrap();

    let after = ctx.ledger_service.balance(THANK_YOU_ID).await.unwrap();
    assert_eq!(after.balance, before.balance + 1000 - 300 - 500);

    let balances = ctx.ledger_service.balances().await.unwrap();
    let codes: Vec<&str> = balances.iter().map(|b| b.currency_code.as_str()).collect();
    assert_eq!(codes, vec!["KF", "TY", "UNI$"]);
    assert!(balances.iter().any(|b| b.currency_id == UNI_DOLLARS_ID && b.earned > 0));
}

#[tokio::test]
async fn test_dismissed_insight_stays_hidden_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let today = date(2025, 3, 31);
    let insight = Insight::new("Big spender", "large_transaction", "You spent {amount} at {merchant}")
        .with_param("amount", 50)
        .with_priority(3);

    {
        let repo = open_repo(temp_dir.path());
        repo.upsert_insight(&insight).await.unwrap();
        repo.upsert_transaction(&dining_purchase(Uuid::new_v4(), 120, date(2025, 3, 20)))
            .await
            .unwrap();

        let ctx = CardwiseContext::with_repository(Config::default(), temp_dir.path(), repo);
        let triggered = ctx.insight_service.evaluate(date(2025, 3, 1), today).await.unwrap();
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].insight_id, insight.id);

        ctx.insight_service.dismiss(insight.id).await.unwrap();
    }

    let repo = open_repo(temp_dir.path());
    let ctx = CardwiseContext::with_repository(Config::default(), temp_dir.path(), repo);
    let triggered = ctx.insight_service.evaluate(date(2025, 3, 1), today).await.unwrap();
    assert!(triggered.is_empty());
    assert!(ctx.insight_service.dismiss(Uuid::new_v4()).await.is_err());
}

#[tokio::test]
async fn test_recommendation_on_seeded_memory_repository() {
    let temp_dir = TempDir::new().unwrap();
    let repo = Arc::new(MemoryRepository::new());
    seed_demo_data(repo.clone()).await.unwrap();
    let ctx = CardwiseContext::with_repository(Config::default(), temp_dir.path(), repo);

    let coffee = ctx
        .repository
        .get_transactions()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.payment_method_id == Some(DEBIT_CARD_ID))
        .expect("demo data has debit card purchases");

    // The debit card earns nothing, so the whole best value was missed
    let rec = ctx.simulator.recommend(&coffee, Some(KRISFLYER_ID)).await.unwrap();
    assert_eq!(rec.actual.as_ref().map(|a| a.payment_method_id), Some(DEBIT_CARD_ID));
    let best = rec.best.as_ref().expect("a rewards card wins");
    assert_ne!(best.payment_method_id, DEBIT_CARD_ID);
    assert!(rec.missed_value > 0);
    assert_eq!(Some(rec.missed_value), best.converted_value);
    assert!(!rec.used_best_card());
}
