//! Calc command - points one card earns on a purchase

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use serde_json::json;

use super::{get_context, PurchaseArgs};
use crate::output::{self, format_amount, format_points};

pub async fn run(card: &str, args: &PurchaseArgs, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let method = ctx.find_payment_method(card).await?;
    let purchase = args.to_purchase()?;
    let calc = ctx.reward_service.calculate_for_method(&method, &purchase, None).await?;

    let currency = match method.reward_currency_id {
        Some(id) => ctx.repository.get_reward_currency(id).await?,
        None => None,
    };

    if json {
        return output::json(&json!({
            "payment_method_id": method.id,
            "payment_method_name": method.name,
            "reward_currency": currency.as_ref().map(|c| c.code.clone()),
            "calculation": calc,
        }));
    }

    println!(
        "{} {} {} on {}",
        method.name.bold(),
        purchase.currency,
        format_amount(purchase.amount),
        purchase.date
    );
    println!();

    let unit = currency.map(|c| c.code).unwrap_or_else(|| "pts".to_string());
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Base".to_string(), format!("{} {}", format_points(calc.base_points as i64), unit)]);
    table.add_row(vec!["Bonus".to_string(), format!("{} {}", format_points(calc.bonus_points as i64), unit)]);
    table.add_row(vec![
        "Total".to_string(),
        format!("{} {}", format_points(calc.total_points as i64), unit).bold().to_string(),
    ]);
    if let Some(rule) = &calc.applied_rule {
        table.add_row(vec!["Rule".to_string(), rule.name.clone()]);
    }
    if let Some(remaining) = calc.remaining_bonus {
        table.add_row(vec!["Bonus left this period".to_string(), format_points(remaining as i64)]);
    }
    println!("{}", table);

    for message in &calc.messages {
        output::warning(&format!("  {}", message));
    }

    Ok(())
}
