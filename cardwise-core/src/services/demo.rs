//! Demo service - manage demo mode
//!
//! Demo mode switches the CLI to a separate database seeded with sample
//! cards, rates and purchases, so nothing touches the user's own data.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::adapters::demo::{
    generate_demo_currencies, generate_demo_insights, generate_demo_ledger, generate_demo_payment_methods,
    generate_demo_rates, generate_demo_transactions,
};
use crate::adapters::duckdb::DuckDbRepository;
use crate::config::Config;
use crate::domain::result::Result;
use crate::ports::Repository;
use crate::services::rewards::RewardService;

const DEMO_DB: &str = "demo.duckdb";

/// What the seeding wrote
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DemoSeedSummary {
    pub currencies: usize,
    pub payment_methods: usize,
    pub rates: usize,
    pub transactions: usize,
    pub insights: usize,
    pub points_earned: u64,
}

pub struct DemoService {
    data_dir: PathBuf,
}

impl DemoService {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn is_enabled(&self) -> Result<bool> {
        Ok(Config::load(&self.data_dir)?.demo_mode)
    }

    fn remove_demo_database(&self) -> Result<()> {
        for name in [DEMO_DB.to_string(), format!("{}.wal", DEMO_DB)] {
            let path = self.data_dir.join(name);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Recreate the demo database, seed it and switch demo mode on
    pub async fn enable(&self) -> Result<DemoSeedSummary> {
        std::fs::create_dir_all(&self.data_dir)?;
        self.remove_demo_database()?;

        let mut config = Config::load(&self.data_dir).unwrap_or_default();
        config.enable_demo_mode();
        config.save(&self.data_dir)?;

        let repository: Arc<dyn Repository> = Arc::new(DuckDbRepository::new(&self.data_dir.join(DEMO_DB))?);
        let summary = seed(repository).await?;
        tracing::info!(transactions = summary.transactions, "demo data seeded");
        Ok(summary)
    }

    /// Switch demo mode off, optionally deleting the demo database
    pub fn disable(&self, clean: bool) -> Result<()> {
        let mut config = Config::load(&self.data_dir).unwrap_or_default();
        config.disable_demo_mode();
        config.save(&self.data_dir)?;

        if clean {
            self.remove_demo_database()?;
        }
        Ok(())
    }
}

/// Write the demo data set into any repository.
///
/// Transactions go through the reward calculation in date order so bonus
/// caps and minimum-spend gates see the earlier spend of each period.
pub async fn seed(repository: Arc<dyn Repository>) -> Result<DemoSeedSummary> {
    let mut summary = DemoSeedSummary::default();

    for currency in generate_demo_currencies() {
        repository.upsert_reward_currency(&currency).await?;
        summary.currencies += 1;
    }
    for rate in generate_demo_rates() {
        repository.upsert_conversion_rate(&rate).await?;
        summary.rates += 1;
    }
    for method in generate_demo_payment_methods() {
        repository.upsert_payment_method(&method).await?;
        summary.payment_methods += 1;
    }
    for insight in generate_demo_insights() {
        repository.upsert_insight(&insight).await?;
        summary.insights += 1;
    }

    let rewards = RewardService::new(Arc::clone(&repository));
    let mut transactions = generate_demo_transactions();
    transactions.sort_by_key(|t| (t.transaction_date, t.id));
    for tx in transactions.iter_mut() {
        let calc = rewards.record_transaction(tx).await?;
        summary.points_earned += calc.total_points;
        summary.transactions += 1;
    }

    let (balances, adjustments, redemptions, transfers) = generate_demo_ledger(Utc::now().date_naive());
    for balance in &balances {
        repository.set_points_balance(balance).await?;
    }
    for adjustment in &adjustments {
        repository.add_points_adjustment(adjustment).await?;
    }
    for redemption in &redemptions {
        repository.add_points_redemption(redemption).await?;
    }
    for transfer in &transfers {
        repository.add_points_transfer(transfer).await?;
    }

    Ok(summary)
}
