//! Demo data generator
//!
//! Seeds a wallet that exercises every feature:
//! - 3 reward currencies (two bank programs, one airline) with rates
//! - 4 payment methods with different calculation methods and bonus rules
//! - 90 days of purchases with MCCs, refunds and reimbursements
//! - insight templates and a few ledger entries

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    CalculationMethod, ConversionRate, Insight, PaymentMethod, PaymentMethodType, PointsAdjustment,
    PointsBalance, PointsRedemption, PointsTransfer, RewardCurrency, RewardRule, Rounding, RuleCondition,
    SpendPeriod, Transaction,
};

pub const UNI_DOLLARS_ID: Uuid = Uuid::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
pub const THANK_YOU_ID: Uuid = Uuid::from_u128(0x2222_2222_2222_2222_2222_2222_2222_2222);
pub const KRISFLYER_ID: Uuid = Uuid::from_u128(0x3333_3333_3333_3333_3333_3333_3333_3333);

pub const DINING_CARD_ID: Uuid = Uuid::from_u128(0xAAAA_0000_0000_0000_0000_0000_0000_0001);
pub const ONLINE_CARD_ID: Uuid = Uuid::from_u128(0xAAAA_0000_0000_0000_0000_0000_0000_0002);
pub const MILES_CARD_ID: Uuid = Uuid::from_u128(0xAAAA_0000_0000_0000_0000_0000_0000_0003);
pub const DEBIT_CARD_ID: Uuid = Uuid::from_u128(0xAAAA_0000_0000_0000_0000_0000_0000_0004);

pub fn generate_demo_currencies() -> Vec<RewardCurrency> {
    let mut uni = RewardCurrency::new(UNI_DOLLARS_ID, "UNI$", "UNI$ Rewards");
    uni.issuer = Some("UOB".to_string());
    uni.is_transferrable = true;

    let mut thank_you = RewardCurrency::new(THANK_YOU_ID, "TY", "ThankYou Points");
    thank_you.issuer = Some("Citi".to_string());
    thank_you.is_transferrable = true;

    let mut krisflyer = RewardCurrency::new(KRISFLYER_ID, "KF", "KrisFlyer Miles");
    krisflyer.issuer = Some("Singapore Airlines".to_string());

    vec![uni, thank_you, krisflyer]
}

pub fn generate_demo_rates() -> Vec<ConversionRate> {
    vec![
        ConversionRate::new(UNI_DOLLARS_ID, KRISFLYER_ID, Decimal::from(2)),
        ConversionRate::new(THANK_YOU_ID, KRISFLYER_ID, Decimal::new(4, 1)),
        ConversionRate::new(KRISFLYER_ID, UNI_DOLLARS_ID, Decimal::new(5, 1)),
    ]
}

fn category(name: &str) -> RuleCondition {
    RuleCondition::Category {
        categories: vec![name.to_string()],
        exclude: false,
    }
}

pub fn generate_demo_payment_methods() -> Vec<PaymentMethod> {
    let mut dining = PaymentMethod::new(DINING_CARD_ID, "Lady's Dining");
    dining.issuer = Some("UOB".to_string());
    dining.reward_currency_id = Some(UNI_DOLLARS_ID);
    dining.points_multiplier = Decimal::new(4, 1);
    dining.calculation_method = CalculationMethod::Block {
        block_size: Decimal::from(5),
    };
    dining.spend_period = SpendPeriod::Statement { day: 15 };
    let mut dining_bonus = RewardRule::new("Dining 10X", Decimal::from(4)).with_condition(category("Dining"));
    dining_bonus.priority = 10;
    dining_bonus.monthly_cap = Some(1000);
    dining_bonus.min_spend = Some(Decimal::from(300));
    let mut contactless = RewardRule::new("Contactless boost", Decimal::ONE)
        .with_condition(RuleCondition::Contactless);
    contactless.monthly_cap = Some(300);
    dining.reward_rules = vec![dining_bonus, contactless];

    let mut online = PaymentMethod::new(ONLINE_CARD_ID, "Rewards+ Online");
    online.issuer = Some("Citi".to_string());
    online.reward_currency_id = Some(THANK_YOU_ID);
    online.points_multiplier = Decimal::ONE;
    let mut online_bonus = RewardRule::new("Online 10X", Decimal::from(9))
        .with_condition(RuleCondition::Online)
        .with_condition(RuleCondition::Category {
            categories: vec!["Travel".to_string()],
            exclude: true,
        });
    online_bonus.monthly_cap = Some(9000);
    online.reward_rules = vec![online_bonus];

    let mut miles = PaymentMethod::new(MILES_CARD_ID, "KrisFlyer Everyday");
    miles.issuer = Some("AMEX".to_string());
    miles.reward_currency_id = Some(KRISFLYER_ID);
    miles.points_multiplier = Decimal::new(11, 1);
    miles.calculation_method = CalculationMethod::Standard {
        rounding: Rounding::Nearest,
    };
    let mut travel = RewardRule::new("Airline and hotel 2X", Decimal::new(9, 1)).with_condition(category("Travel"));
    travel.priority = 5;
    miles.reward_rules = vec![travel];

    let mut debit = PaymentMethod::new(DEBIT_CARD_ID, "Everyday Debit");
    debit.method_type = PaymentMethodType::DebitCard;
    debit.points_multiplier = Decimal::ZERO;

    vec![dining, online, miles, debit]
}

struct DemoPurchase {
    merchant: &'static str,
    mcc: &'static str,
    amount_cents: i64,
    card: Uuid,
    online: bool,
    contactless: bool,
}

const fn purchase(merchant: &'static str, mcc: &'static str, amount_cents: i64, card: Uuid) -> DemoPurchase {
    DemoPurchase {
        merchant,
        mcc,
        amount_cents,
        card,
        online: false,
        contactless: false,
    }
}

fn demo_transaction(p: &DemoPurchase, date: NaiveDate, seq: u32) -> Transaction {
    // Stable IDs so reseeding the same day produces the same rows
    let id = Uuid::from_u128(((date.num_days_from_ce() as u128) << 32) | seq as u128);
    let mut tx = Transaction::new(id, Decimal::new(p.amount_cents, 2), "SGD", date);
    tx.merchant_name = Some(p.merchant.to_string());
    tx.mcc = Some(p.mcc.to_string());
    tx.payment_method_id = Some(p.card);
    tx.is_online = p.online;
    tx.is_contactless = p.contactless;
    tx
}

/// 90 days of purchases ending today, without points; the demo service
/// runs them through the reward calculation when seeding.
pub fn generate_demo_transactions() -> Vec<Transaction> {
    generate_demo_transactions_until(Utc::now().date_naive())
}

pub fn generate_demo_transactions_until(today: NaiveDate) -> Vec<Transaction> {
    let hawkers = [
        ("MAXWELL FOOD CENTRE", 850i64),
        ("TIAN TIAN CHICKEN RICE", 1250),
        ("JUMBO SEAFOOD", 18600),
        ("DIN TAI FUNG", 6420),
        ("YA KUN KAYA TOAST", 760),
    ];
    let groceries = [8523i64, 6745, 9234, 7100, 5899, 10523];

    let mut transactions = Vec::new();
    for days_ago in 0..90i64 {
        let date = today - Duration::days(days_ago);
        let mut seq = 0u32;
        let mut push = |p: DemoPurchase, transactions: &mut Vec<Transaction>| {
            seq += 1;
            transactions.push(demo_transaction(&p, date, seq));
        };

        // Dining most days, paid by tapping the dining card
        if days_ago % 3 != 2 {
            let (merchant, cents) = hawkers[days_ago as usize % hawkers.len()];
            let mut meal = purchase(merchant, "5812", cents, DINING_CARD_ID);
            meal.contactless = true;
            push(meal, &mut transactions);
        }

        // Coffee on the debit card
        if days_ago % 2 == 0 {
            push(purchase("STARBUCKS", "5814", 680, DEBIT_CARD_ID), &mut transactions);
        }

        // Groceries every 4 days on the miles card
        if days_ago % 4 == 0 {
            let cents = groceries[days_ago as usize % groceries.len()];
            push(purchase("FAIRPRICE FINEST", "5411", cents, MILES_CARD_ID), &mut transactions);
        }

        // Online shopping and rides on the online card
        if days_ago % 5 == 0 {
            let mut order = purchase("SHOPEE", "5311", 4590 + days_ago * 37, ONLINE_CARD_ID);
            order.online = true;
            push(order, &mut transactions);
        }
        if days_ago % 3 == 0 {
            let mut ride = purchase("GRAB RIDES", "4121", 1820, ONLINE_CARD_ID);
            ride.online = true;
            push(ride, &mut transactions);
        }

        // Fuel weekly
        if days_ago % 7 == 0 {
            push(purchase("SHELL", "5541", 9200, MILES_CARD_ID), &mut transactions);
        }

        // Monthly bills and a flight
        match date.day() {
            3 => {
                let mut netflix = purchase("NETFLIX", "4899", 1998, ONLINE_CARD_ID);
                netflix.online = true;
                push(netflix, &mut transactions);
            }
            18 => push(purchase("SINGAPORE AIRLINES", "3075", 84200, MILES_CARD_ID), &mut transactions),
            _ => {}
        }

        // A shared dinner to be paid back, and a refund
        if days_ago == 10 {
            let mut dinner = demo_transaction(&purchase("BURNT ENDS", "5812", 42000, DINING_CARD_ID), date, 90);
            dinner.reimbursement_amount = Some(Decimal::from(280));
            transactions.push(dinner);
        }
        if days_ago == 12 {
            transactions.push(demo_transaction(
                &purchase("SHOPEE", "5311", -2590, ONLINE_CARD_ID),
                date,
                91,
            ));
        }
    }

    transactions
}

pub fn generate_demo_insights() -> Vec<Insight> {
    vec![
        Insight::new(
            "Dining takes the biggest share",
            "category_ratio",
            "{category} was {percentage}% of your spending ({amount} of {total})",
        )
        .with_param("threshold", 0.3)
        .with_priority(8),
        Insight::new(
            "Spending went up",
            "spending_increase",
            "You spent {difference} more than the previous period (+{percentage}%)",
        )
        .with_param("threshold", 15)
        .with_priority(7),
        Insight::new(
            "Spending went down",
            "spending_decrease",
            "You spent {difference} less than the previous period (-{percentage}%)",
        )
        .with_param("threshold", 15)
        .with_priority(4),
        Insight::new(
            "Category trending up",
            "category_trend",
            "{category} is up {percentage}% on the previous period",
        )
        .with_param("threshold", 25)
        .with_priority(5),
        Insight::new(
            "Favourite merchant",
            "frequent_merchant",
            "You visited {merchant} {count} times ({amount})",
        )
        .with_param("min_count", 8)
        .with_priority(3),
        Insight::new(
            "Big purchase",
            "large_transaction",
            "Your largest purchase was {amount} at {merchant}",
        )
        .with_param("amount", 500)
        .with_priority(6),
        Insight::new(
            "Weekend spender",
            "weekend_spending",
            "{percentage}% of your spending ({amount}) happened on weekends",
        )
        .with_param("threshold", 0.35)
        .with_priority(2),
        Insight::new(
            "Low reward rate",
            "low_reward_rate",
            "You earned {rate} points per dollar; a better card could earn more",
        )
        .with_param("threshold", 1.5)
        .with_priority(9),
        Insight::new(
            "Money owed to you",
            "pending_reimbursements",
            "{count} purchases are waiting on {amount} in reimbursements",
        )
        .with_priority(6),
        Insight::new(
            "Small purchases add up",
            "small_purchases",
            "{count} purchases under $10 added up to {amount}",
        )
        .with_param("max_amount", 10)
        .with_param("min_count", 15)
        .with_priority(1),
    ]
}

/// Starting balances and a few ledger entries dated relative to `today`
pub fn generate_demo_ledger(
    today: NaiveDate,
) -> (Vec<PointsBalance>, Vec<PointsAdjustment>, Vec<PointsRedemption>, Vec<PointsTransfer>) {
    let balances = vec![
        PointsBalance {
            currency_id: UNI_DOLLARS_ID,
            starting_balance: 4200,
        },
        PointsBalance {
            currency_id: THANK_YOU_ID,
            starting_balance: 12500,
        },
        PointsBalance {
            currency_id: KRISFLYER_ID,
            starting_balance: 28000,
        },
    ];

    let adjustments = vec![PointsAdjustment {
        id: Uuid::from_u128(0xBBBB_0000_0000_0000_0000_0000_0000_0001),
        currency_id: THANK_YOU_ID,
        amount: 2000,
        reason: Some("Sign-up bonus".to_string()),
        date: today - Duration::days(60),
    }];

    let redemptions = vec![PointsRedemption {
        id: Uuid::from_u128(0xBBBB_0000_0000_0000_0000_0000_0000_0002),
        currency_id: KRISFLYER_ID,
        points: 17500,
        description: Some("Saver award SIN-BKK".to_string()),
        date: today - Duration::days(30),
    }];

    let transfers = vec![PointsTransfer {
        id: Uuid::from_u128(0xBBBB_0000_0000_0000_0000_0000_0000_0003),
        source_currency_id: UNI_DOLLARS_ID,
        target_currency_id: KRISFLYER_ID,
        points: 2500,
        received: 5000,
        date: today - Duration::days(45),
    }];

    (balances, adjustments, redemptions, transfers)
}
