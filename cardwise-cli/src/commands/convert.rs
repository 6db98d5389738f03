//! Convert command - points in one program expressed in another

use anyhow::{bail, Result};
use serde_json::json;

use super::get_context;
use crate::output::{self, format_points};

pub async fn run(points: u64, from: &str, to: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let source = ctx.find_currency(from).await?;
    let target = ctx.find_currency(to).await?;

    let converted = if source.id == target.id {
        Some(points)
    } else {
        ctx.conversion_service.convert_points(points, source.id, target.id).await
    };

    let Some(converted) = converted else {
        bail!("No conversion rate from {} to {}", source.code, target.code);
    };

    if json {
        return output::json(&json!({
            "points": points,
            "source": source.code,
            "target": target.code,
            "converted": converted,
        }));
    }

    println!(
        "{} {} = {} {}",
        format_points(points as i64),
        source.code,
        format_points(converted as i64),
        target.code
    );
    Ok(())
}
