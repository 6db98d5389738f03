//! CLI command implementations

pub mod balance;
pub mod calc;
pub mod cards;
pub mod category;
pub mod convert;
pub mod demo;
pub mod insights;
pub mod logs;
pub mod rates;
pub mod recommend;
pub mod simulate;
pub mod status;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use cardwise_core::{CardwiseContext, LoggingService, PurchaseInput};
use chrono::{Local, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, env!("CARGO_PKG_VERSION")).ok()
}

/// Data directory from `CARDWISE_DIR` or `~/.cardwise`
pub fn get_data_dir() -> Result<PathBuf> {
    cardwise_core::config::data_dir().context("Failed to locate the cardwise data directory")
}

/// Open the database for the current mode and wire the services
pub fn get_context() -> Result<CardwiseContext> {
    let data_dir = get_data_dir()?;
    let ctx = CardwiseContext::open(&data_dir)
        .with_context(|| format!("Failed to open cardwise data in {}", data_dir.display()))?;
    tracing::debug!(data_dir = %data_dir.display(), demo = ctx.config.demo_mode, "context opened");
    Ok(ctx)
}

/// Today in the local timezone
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))
}

pub fn parse_amount(value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim()).with_context(|| format!("Invalid amount '{}'", value))
}

pub fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim()).with_context(|| format!("Invalid ID '{}'", value))
}

/// Resolve `--target` or the configured default target currency
pub async fn resolve_target(ctx: &CardwiseContext, target: Option<&str>) -> Result<Option<Uuid>> {
    let code = match target.or(ctx.config.default_target_currency.as_deref()) {
        Some(code) => code,
        None => return Ok(None),
    };
    let currency = ctx.find_currency(code).await?;
    Ok(Some(currency.id))
}

/// Purchase details shared by `calc` and `simulate`
#[derive(Args, Debug, Clone)]
pub struct PurchaseArgs {
    /// Purchase amount
    pub amount: String,
    /// ISO 4217 currency of the purchase
    #[arg(long, default_value = "SGD")]
    pub currency: String,
    /// Merchant name
    #[arg(long)]
    pub merchant: Option<String>,
    /// Merchant category code
    #[arg(long)]
    pub mcc: Option<String>,
    /// Category, overriding the MCC mapping
    #[arg(long)]
    pub category: Option<String>,
    /// Online purchase
    #[arg(long, conflicts_with = "contactless")]
    pub online: bool,
    /// Contactless in-store purchase
    #[arg(long)]
    pub contactless: bool,
    /// Purchase date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<String>,
}

impl PurchaseArgs {
    pub fn to_purchase(&self) -> Result<PurchaseInput> {
        let amount = parse_amount(&self.amount)?;
        if amount <= Decimal::ZERO {
            bail!("Purchase amount must be positive");
        }
        let date = match &self.date {
            Some(d) => parse_date(d)?,
            None => today(),
        };

        let mut purchase = PurchaseInput::new(amount, &self.currency, date);
        if let Some(merchant) = &self.merchant {
            purchase = purchase.with_merchant(merchant.trim());
        }
        if let Some(mcc) = &self.mcc {
            purchase = purchase.with_mcc(mcc.trim());
        }
        purchase.category_override = self.category.clone();
        if self.online {
            purchase = purchase.online();
        }
        if self.contactless {
            purchase = purchase.contactless();
        }
        Ok(purchase)
    }
}
