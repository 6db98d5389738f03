//! Balance command - points balances and ledger entries

use anyhow::{bail, Result};
use cardwise_core::domain::{PointsAdjustment, PointsBalance, PointsRedemption, PointsTransfer};
use cardwise_core::services::PointsBalanceSummary;
use clap::Subcommand;
use colored::Colorize;
use uuid::Uuid;

use super::{get_context, parse_date, today};
use crate::output::{self, create_table, format_points};

#[derive(Subcommand)]
pub enum BalanceCommands {
    /// Show the balance of one currency
    Show {
        /// Reward currency code
        currency: String,
    },
    /// Set the opening balance of a currency
    Start {
        currency: String,
        #[arg(allow_negative_numbers = true)]
        points: i64,
    },
    /// Record a manual correction
    Adjust {
        currency: String,
        /// Points to add (negative to remove)
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        #[arg(long)]
        reason: Option<String>,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Record points spent on a reward
    Redeem {
        currency: String,
        points: u64,
        #[arg(long)]
        description: Option<String>,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Record points moved into another program
    Transfer {
        /// Source currency code
        from: String,
        /// Target currency code
        to: String,
        /// Points taken from the source
        points: u64,
        /// Points credited to the target, defaults to the conversion rate
        #[arg(long)]
        received: Option<u64>,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
}

fn entry_date(date: Option<&str>) -> Result<chrono::NaiveDate> {
    match date {
        Some(d) => parse_date(d),
        None => Ok(today()),
    }
}

fn print_balances(balances: &[PointsBalanceSummary]) {
    let mut table = create_table();
    table.set_header(vec!["Currency", "Start", "Earned", "Adjusted", "Redeemed", "Out", "In", "Balance"]);
    for b in balances {
        let balance = format_points(b.balance);
        table.add_row(vec![
            b.currency_code.clone(),
            format_points(b.starting_balance),
            format_points(b.earned as i64),
            format_points(b.adjustments),
            format_points(b.redeemed as i64),
            format_points(b.transferred_out as i64),
            format_points(b.transferred_in as i64),
            if b.balance < 0 {
                balance.red().to_string()
            } else {
                balance.bold().to_string()
            },
        ]);
    }
    println!("{}", table);
}

pub async fn run(command: Option<BalanceCommands>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let ledger = &ctx.ledger_service;

    match command {
        None => {
            let balances = ledger.balances().await?;
            if json {
                return output::json(&balances);
            }
            if balances.is_empty() {
                println!("No reward currencies found.");
                return Ok(());
            }
            print_balances(&balances);
        }
        Some(BalanceCommands::Show { currency }) => {
            let currency = ctx.find_currency(&currency).await?;
            let balance = ledger.balance(currency.id).await?;
            if json {
                return output::json(&balance);
            }
            print_balances(std::slice::from_ref(&balance));
        }
        Some(BalanceCommands::Start { currency, points }) => {
            let currency = ctx.find_currency(&currency).await?;
            ctx.repository
                .set_points_balance(&PointsBalance {
                    currency_id: currency.id,
                    starting_balance: points,
                })
                .await?;
            output::success(&format!("Opening balance for {} set to {}", currency.code, format_points(points)));
        }
        Some(BalanceCommands::Adjust {
            currency,
            amount,
            reason,
            date,
        }) => {
            let currency = ctx.find_currency(&currency).await?;
            ledger
                .adjust(&PointsAdjustment {
                    id: Uuid::new_v4(),
                    currency_id: currency.id,
                    amount,
                    reason,
                    date: entry_date(date.as_deref())?,
                })
                .await?;
            output::success(&format!("Adjusted {} by {}", currency.code, format_points(amount)));
        }
        Some(BalanceCommands::Redeem {
            currency,
            points,
            description,
            date,
        }) => {
            let currency = ctx.find_currency(&currency).await?;
            ledger
                .redeem(&PointsRedemption {
                    id: Uuid::new_v4(),
                    currency_id: currency.id,
                    points,
                    description,
                    date: entry_date(date.as_deref())?,
                })
                .await?;
            output::success(&format!("Redeemed {} {}", format_points(points as i64), currency.code));
        }
        Some(BalanceCommands::Transfer {
            from,
            to,
            points,
            received,
            date,
        }) => {
            let source = ctx.find_currency(&from).await?;
            let target = ctx.find_currency(&to).await?;
            let received = match received {
                Some(r) => r,
                None => match ctx.conversion_service.convert_points(points, source.id, target.id).await {
                    Some(r) => r,
                    None => bail!(
                        "No conversion rate from {} to {}; pass --received",
                        source.code,
                        target.code
                    ),
                },
            };
            ledger
                .transfer(&PointsTransfer {
                    id: Uuid::new_v4(),
                    source_currency_id: source.id,
                    target_currency_id: target.id,
                    points,
                    received,
                    date: entry_date(date.as_deref())?,
                })
                .await?;
            output::success(&format!(
                "Transferred {} {} -> {} {}",
                format_points(points as i64),
                source.code,
                format_points(received as i64),
                target.code
            ));
        }
    }

    Ok(())
}
