//! Status command - show wallet summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output::{self, format_points};

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status().await?;

    if json {
        return output::json(&status);
    }

    let title = if ctx.config.demo_mode {
        format!("{} {}", "Cardwise Status".bold(), "(demo)".yellow())
    } else {
        "Cardwise Status".bold().to_string()
    };
    println!("{}", title);
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        "Payment methods".to_string(),
        format!("{} ({} active)", status.total_payment_methods, status.active_payment_methods),
    ]);
    table.add_row(vec!["Reward currencies".to_string(), status.total_reward_currencies.to_string()]);
    table.add_row(vec!["Conversion rates".to_string(), status.total_conversion_rates.to_string()]);
    table.add_row(vec!["Transactions".to_string(), status.total_transactions.to_string()]);
    table.add_row(vec!["Points earned".to_string(), format_points(status.total_points_earned as i64)]);
    table.add_row(vec!["Insights".to_string(), status.total_insights.to_string()]);

    println!("{}", table);
    println!();

    if let (Some(earliest), Some(latest)) = (&status.date_range.earliest, &status.date_range.latest) {
        println!("Date range: {} to {}", earliest, latest);
        println!();
    }

    if !status.payment_methods.is_empty() {
        println!("{}", "Payment Methods".bold());
        for method in &status.payment_methods {
            let issuer = method.issuer.as_deref().map(|i| format!(" ({})", i)).unwrap_or_default();
            if method.is_active {
                println!("  • {}{}", method.name, issuer);
            } else {
                println!("  • {}{} {}", method.name, issuer, "inactive".dimmed());
            }
        }
    }

    Ok(())
}
