//! Recommend command - compare past purchases against the best card

use anyhow::{Context, Result};
use cardwise_core::services::CardRecommendation;
use cardwise_core::Transaction;
use chrono::Duration;
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{get_context, parse_uuid, resolve_target, today};
use crate::output::{self, create_table, format_amount, format_points};

#[derive(Debug, Serialize)]
struct TransactionReview {
    transaction_id: Uuid,
    date: String,
    merchant: Option<String>,
    amount: Decimal,
    currency: String,
    used_best_card: bool,
    recommendation: CardRecommendation,
}

#[derive(Debug, Serialize)]
struct ReviewSummary {
    reviewed: usize,
    optimal: usize,
    total_missed_value: u64,
    reviews: Vec<TransactionReview>,
}

pub async fn run(transaction: Option<&str>, days: u32, target: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let target_id = resolve_target(&ctx, target).await?;

    let transactions: Vec<Transaction> = match transaction {
        Some(id) => {
            let id = parse_uuid(id)?;
            let tx = ctx
                .repository
                .get_transactions()
                .await?
                .into_iter()
                .find(|t| t.id == id)
                .with_context(|| format!("Transaction {} not found", id))?;
            vec![tx]
        }
        None => {
            let end = today();
            let start = end - Duration::days(i64::from(days.max(1)) - 1);
            ctx.repository
                .get_transactions_by_date_range(start, end)
                .await?
                .into_iter()
                .filter(|t| t.is_purchase() && t.payment_method_id.is_some())
                .collect()
        }
    };

    let mut reviews = Vec::with_capacity(transactions.len());
    for tx in &transactions {
        let recommendation = ctx.simulator.recommend(tx, target_id).await?;
        reviews.push(TransactionReview {
            transaction_id: tx.id,
            date: tx.transaction_date.to_string(),
            merchant: tx.merchant_name.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            used_best_card: recommendation.used_best_card(),
            recommendation,
        });
    }

    let summary = ReviewSummary {
        reviewed: reviews.len(),
        optimal: reviews.iter().filter(|r| r.used_best_card).count(),
        total_missed_value: reviews.iter().map(|r| r.recommendation.missed_value).sum(),
        reviews,
    };

    if json {
        return output::json(&summary);
    }

    if summary.reviewed == 0 {
        println!("No purchases to review.");
        return Ok(());
    }

    let missed: Vec<&TransactionReview> = summary.reviews.iter().filter(|r| !r.used_best_card).collect();
    if missed.is_empty() {
        output::success(&format!("All {} purchases used the best card.", summary.reviewed));
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Date", "Merchant", "Amount", "Used", "Best", "Missed"]);
    for review in &missed {
        let rec = &review.recommendation;
        table.add_row(vec![
            review.date.clone(),
            review.merchant.clone().unwrap_or_else(|| "-".to_string()),
            format!("{} {}", review.currency, format_amount(review.amount)),
            rec.actual
                .as_ref()
                .map(|a| a.payment_method_name.clone())
                .unwrap_or_else(|| "unknown".dimmed().to_string()),
            rec.best
                .as_ref()
                .map(|b| b.payment_method_name.green().to_string())
                .unwrap_or_default(),
            format_points(rec.missed_value as i64).yellow().to_string(),
        ]);
    }
    println!("{}", table);
    println!();
    println!(
        "{} of {} purchases used the best card. Missed value: {}",
        summary.optimal,
        summary.reviewed,
        format_points(summary.total_missed_value as i64).bold()
    );

    Ok(())
}
