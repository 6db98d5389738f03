//! Insights command - evaluate and dismiss spending insights

use anyhow::{bail, Result};
use chrono::Duration;
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value as JsonValue;

use super::{get_context, parse_date, parse_uuid, today};
use crate::output::{self, create_table};

#[derive(Subcommand)]
pub enum InsightsCommands {
    /// Show insights triggered for a period
    List {
        /// Number of days ending today, defaults to the configured lookback
        #[arg(long, conflicts_with_all = ["from", "to"])]
        days: Option<u32>,
        /// Period start (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Period end (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Hide an insight
    Dismiss {
        /// Insight ID
        id: String,
    },
}

fn render_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub async fn run(command: InsightsCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        InsightsCommands::List { days, from, to, json } => {
            let (start, end) = match (from, to) {
                (Some(from), Some(to)) => (parse_date(&from)?, parse_date(&to)?),
                _ => {
                    let days = days.unwrap_or(ctx.config.insight_lookback_days).max(1);
                    let end = today();
                    (end - Duration::days(i64::from(days) - 1), end)
                }
            };
            if end < start {
                bail!("Period ends before it starts");
            }

            let triggered = ctx.insight_service.evaluate(start, end).await?;
            if json {
                return output::json(&triggered);
            }

            println!("{} {} to {}", "Insights".bold(), start, end);
            println!();
            if triggered.is_empty() {
                println!("Nothing to report.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Priority", "Insight", "Details", "ID"]);
            for insight in &triggered {
                let details = insight
                    .data
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, render_value(v)))
                    .collect::<Vec<_>>()
                    .join("\n");
                table.add_row(vec![
                    insight.priority.to_string(),
                    insight.name.clone(),
                    details,
                    insight.insight_id.to_string().dimmed().to_string(),
                ]);
            }
            println!("{}", table);
        }
        InsightsCommands::Dismiss { id } => {
            let id = parse_uuid(&id)?;
            ctx.insight_service.dismiss(id).await?;
            output::success("Insight dismissed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&JsonValue::from("Dining")), "Dining");
        assert_eq!(render_value(&JsonValue::from(42)), "42");
    }
}
