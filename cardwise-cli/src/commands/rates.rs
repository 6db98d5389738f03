//! Rates command - manage conversion rates between reward currencies

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::{get_context, parse_amount};
use crate::output::{self, create_table};

#[derive(Subcommand)]
pub enum RatesCommands {
    /// List conversion rates
    List {
        /// Only rates out of this currency
        #[arg(long)]
        from: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create or update a rate
    Set {
        /// Source currency code
        from: String,
        /// Target currency code
        to: String,
        /// Target points per source point
        rate: String,
    },
    /// Delete a rate
    Delete {
        /// Source currency code
        from: String,
        /// Target currency code
        to: String,
    },
}

#[derive(Debug, Serialize)]
struct RateRow {
    source: String,
    target: String,
    rate: rust_decimal::Decimal,
}

pub async fn run(command: RatesCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        RatesCommands::List { from, json } => {
            let mut sources = ctx.repository.get_reward_currencies().await?;
            if let Some(code) = from.as_deref() {
                sources = vec![ctx.find_currency(code).await?];
            }
            sources.sort_by(|a, b| a.code.cmp(&b.code));

            let mut rows = Vec::new();
            for source in &sources {
                for entry in ctx.conversion_service.rates_from(source.id).await? {
                    rows.push(RateRow {
                        source: source.code.clone(),
                        target: entry.target_code,
                        rate: entry.rate,
                    });
                }
            }

            if json {
                return output::json(&rows);
            }
            if rows.is_empty() {
                println!("No conversion rates found.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["From", "To", "Rate"]);
            for row in rows {
                table.add_row(vec![row.source, row.target, row.rate.normalize().to_string()]);
            }
            println!("{}", table);
        }
        RatesCommands::Set { from, to, rate } => {
            let source = ctx.find_currency(&from).await?;
            let target = ctx.find_currency(&to).await?;
            let rate = parse_amount(&rate)?;
            let saved = ctx.conversion_service.set_rate(source.id, target.id, rate).await?;
            output::success(&format!(
                "1 {} = {} {}",
                source.code,
                saved.rate.normalize(),
                target.code
            ));
        }
        RatesCommands::Delete { from, to } => {
            let source = ctx.find_currency(&from).await?;
            let target = ctx.find_currency(&to).await?;
            ctx.conversion_service.delete_rate(source.id, target.id).await?;
            output::success(&format!("Deleted rate {} -> {}", source.code, target.code));
        }
    }

    Ok(())
}
