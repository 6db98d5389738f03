//! Cards command - list payment methods and their bonus rules

use std::collections::HashMap;

use anyhow::Result;
use cardwise_core::domain::{CalculationMethod, RuleCondition, SpendPeriod};
use colored::Colorize;
use uuid::Uuid;

use super::get_context;
use crate::output::{self, create_table, format_amount};

fn describe_method(method: &CalculationMethod) -> String {
    match method {
        CalculationMethod::Standard { rounding } => format!("standard ({:?})", rounding).to_lowercase(),
        CalculationMethod::RoundedAmount { amount_rounding } => {
            format!("rounded amount ({:?})", amount_rounding).to_lowercase()
        }
        CalculationMethod::Block { block_size } => format!("per {} block", block_size.normalize()),
    }
}

fn describe_period(period: &SpendPeriod) -> String {
    match period {
        SpendPeriod::Calendar => "calendar month".to_string(),
        SpendPeriod::Statement { day } => format!("statement from day {}", day),
    }
}

fn negate(exclude: bool) -> &'static str {
    if exclude {
        "not "
    } else {
        ""
    }
}

fn describe_condition(condition: &RuleCondition) -> String {
    match condition {
        RuleCondition::Mcc { codes, exclude } => format!("MCC {}in {}", negate(*exclude), codes.join("/")),
        RuleCondition::Merchant { patterns, exclude } => {
            format!("merchant {}matching {}", negate(*exclude), patterns.join("/"))
        }
        RuleCondition::Category { categories, exclude } => {
            format!("category {}in {}", negate(*exclude), categories.join("/"))
        }
        RuleCondition::Currency { codes, exclude } => {
            format!("currency {}in {}", negate(*exclude), codes.join("/"))
        }
        RuleCondition::Amount { min, max } => match (min, max) {
            (Some(min), Some(max)) => format!("amount {} to {}", format_amount(*min), format_amount(*max)),
            (Some(min), None) => format!("amount at least {}", format_amount(*min)),
            (None, Some(max)) => format!("amount at most {}", format_amount(*max)),
            (None, None) => "any amount".to_string(),
        },
        RuleCondition::Contactless => "contactless".to_string(),
        RuleCondition::Online => "online".to_string(),
        RuleCondition::InStore => "in store".to_string(),
    }
}

pub async fn run(all: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut methods = if all {
        ctx.repository.get_payment_methods().await?
    } else {
        ctx.repository.get_active_payment_methods().await?
    };
    methods.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    if json {
        return output::json(&methods);
    }

    if methods.is_empty() {
        println!("No payment methods found.");
        return Ok(());
    }

    let codes: HashMap<Uuid, String> = ctx
        .repository
        .get_reward_currencies()
        .await?
        .into_iter()
        .map(|c| (c.id, c.code))
        .collect();

    let mut table = create_table();
    table.set_header(vec!["Name", "Type", "Currency", "Base rate", "Method", "Period", "Rules"]);
    for method in &methods {
        let name = if method.is_active {
            method.name.clone()
        } else {
            format!("{} {}", method.name, "(inactive)".dimmed())
        };
        table.add_row(vec![
            name,
            method.method_type.as_str().replace('_', " "),
            method
                .reward_currency_id
                .and_then(|id| codes.get(&id).cloned())
                .unwrap_or_else(|| "-".to_string()),
            format!("{}x", method.points_multiplier.normalize()),
            describe_method(&method.calculation_method),
            describe_period(&method.spend_period),
            method.reward_rules.len().to_string(),
        ]);
    }
    println!("{}", table);

    for method in methods.iter().filter(|m| !m.reward_rules.is_empty()) {
        println!();
        println!("{}", method.name.bold());
        let mut rules: Vec<_> = method.reward_rules.iter().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        for rule in rules {
            let conditions = if rule.conditions.is_empty() {
                "every purchase".to_string()
            } else {
                rule.conditions.iter().map(describe_condition).collect::<Vec<_>>().join(", ")
            };
            let mut line = format!("  • {} +{}x when {}", rule.name, rule.bonus_multiplier.normalize(), conditions);
            if let Some(cap) = rule.monthly_cap {
                line.push_str(&format!(", cap {} bonus pts", cap));
            }
            if let Some(min) = rule.min_spend {
                line.push_str(&format!(", min spend {}", format_amount(min)));
            }
            if rule.enabled {
                println!("{}", line);
            } else {
                println!("{} {}", line.dimmed(), "disabled".yellow());
            }
        }
    }

    Ok(())
}
