//! Simulate command - rank every active card for a purchase

use anyhow::Result;
use cardwise_core::services::SimulationResult;
use colored::Colorize;

use super::{get_context, resolve_target, PurchaseArgs};
use crate::output::{self, create_table, format_amount, format_points};

pub async fn run(args: &PurchaseArgs, target: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let purchase = args.to_purchase()?;
    let target_id = resolve_target(&ctx, target).await?;
    let results = ctx.simulator.simulate(&purchase, target_id).await?;

    if json {
        return output::json(&results);
    }

    if results.is_empty() {
        println!("No active payment methods to simulate.");
        return Ok(());
    }

    let target_code = match target_id {
        Some(id) => ctx.repository.get_reward_currency(id).await?.map(|c| c.code),
        None => None,
    };

    println!(
        "{} {} {}",
        "Simulating".bold(),
        purchase.currency,
        format_amount(purchase.amount)
    );
    println!();
    print_results(&results, target_code.as_deref());
    Ok(())
}

pub fn print_results(results: &[SimulationResult], target_code: Option<&str>) {
    let value_header = match target_code {
        Some(code) => format!("Value ({})", code),
        None => "Value".to_string(),
    };

    let mut table = create_table();
    table.set_header(vec!["#", "Card", "Points", "Bonus", value_header.as_str(), "Rule"]);
    for (i, result) in results.iter().enumerate() {
        if let Some(error) = &result.error {
            table.add_row(vec![
                "-".to_string(),
                result.payment_method_name.clone(),
                error.red().to_string(),
                String::new(),
                String::new(),
                String::new(),
            ]);
            continue;
        }

        let points = format!(
            "{} {}",
            format_points(result.total_points as i64),
            result.reward_currency_code.as_deref().unwrap_or("pts")
        );
        let value = result
            .converted_value
            .map(|v| format_points(v as i64))
            .unwrap_or_else(|| "n/a".dimmed().to_string());
        let name = if i == 0 {
            result.payment_method_name.green().bold().to_string()
        } else {
            result.payment_method_name.clone()
        };

        table.add_row(vec![
            (i + 1).to_string(),
            name,
            points,
            format_points(result.bonus_points as i64),
            value,
            result.applied_rule.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);
}
