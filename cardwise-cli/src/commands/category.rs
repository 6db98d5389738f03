//! Category command - MCC mappings and spend by category

use anyhow::Result;
use cardwise_core::services::CategoryService;
use chrono::Duration;
use clap::Subcommand;
use rust_decimal::Decimal;

use super::{get_context, today};
use crate::output::{self, create_table, format_amount};

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Map a merchant category code to a category
    Set {
        /// Merchant category code
        mcc: String,
        /// Category name
        category: String,
    },
    /// Show spend grouped by category
    Spend {
        /// Number of days ending today
        #[arg(long, default_value = "30")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List your MCC mappings
    Mappings {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: CategoryCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        CategoryCommands::Set { mcc, category } => {
            ctx.category_service.set_mapping(mcc.trim(), category.trim()).await?;
            output::success(&format!("MCC {} now maps to {}", mcc.trim(), category.trim()));
        }
        CategoryCommands::Spend { days, json } => {
            let end = today();
            let start = end - Duration::days(i64::from(days.max(1)) - 1);
            let transactions = ctx.repository.get_transactions_by_date_range(start, end).await?;
            let categories = ctx.category_service.category_map().await;
            let spend = CategoryService::spend_by_category(&transactions, &categories);

            if json {
                return output::json(&spend);
            }
            if spend.is_empty() {
                println!("No purchases between {} and {}.", start, end);
                return Ok(());
            }

            let total: Decimal = spend.iter().map(|s| s.amount).sum();
            let mut table = create_table();
            table.set_header(vec!["Category", "Purchases", "Amount", "Share"]);
            for row in &spend {
                let share = if total > Decimal::ZERO {
                    (row.amount / total * Decimal::ONE_HUNDRED).round_dp(1)
                } else {
                    Decimal::ZERO
                };
                table.add_row(vec![
                    row.category.clone(),
                    row.transaction_count.to_string(),
                    format_amount(row.amount),
                    format!("{}%", share),
                ]);
            }
            println!("{}", table);
            println!("Total: {}", format_amount(total));
        }
        CategoryCommands::Mappings { json } => {
            let mut mappings: Vec<(String, String)> = ctx.repository.get_mcc_mappings().await?.into_iter().collect();
            mappings.sort();

            if json {
                return output::json(&mappings.into_iter().collect::<std::collections::BTreeMap<_, _>>());
            }
            if mappings.is_empty() {
                println!("No custom mappings. Built-in MCC categories apply.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["MCC", "Category"]);
            for (mcc, category) in mappings {
                table.add_row(vec![mcc, category]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
