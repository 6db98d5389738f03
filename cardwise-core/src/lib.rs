//! Cardwise Core - reward points calculation and card optimization
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core records (PaymentMethod, RewardRule, Transaction, etc.)
//! - **ports**: The Repository trait every backend implements
//! - **services**: Reward calculation, conversion, simulation, insights, ledger
//! - **adapters**: Concrete repositories (DuckDB, in-memory) and demo data

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use domain::result::Result;
use ports::Repository;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    CategoryMap, ConversionRate, Insight, PaymentMethod, PurchaseInput, RewardCurrency, RewardRule,
    Transaction,
};
pub use services::{LogEvent, LoggingService};

/// Main context for Cardwise operations
///
/// Holds the configuration, the repository and every service wired to it.
pub struct CardwiseContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<dyn Repository>,
    pub reward_service: Arc<RewardService>,
    pub conversion_service: Arc<ConversionService>,
    pub simulator: CardSimulator,
    pub insight_service: InsightService,
    pub ledger_service: PointsLedgerService,
    pub category_service: CategoryService,
    pub status_service: StatusService,
}

impl CardwiseContext {
    /// Open the DuckDB database for the current mode in `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;
        let db_path = data_dir.join(config.database_filename());
        let repository: Arc<dyn Repository> = Arc::new(DuckDbRepository::new(&db_path)?);
        Ok(Self::with_repository(config, data_dir, repository))
    }

    /// Wire the services around any repository
    pub fn with_repository(config: Config, data_dir: &Path, repository: Arc<dyn Repository>) -> Self {
        let reward_service = Arc::new(RewardService::new(Arc::clone(&repository)));
        let conversion_service = Arc::new(ConversionService::with_ttl(
            Arc::clone(&repository),
            config.conversion_cache_ttl,
        ));
        let simulator = CardSimulator::new(
            Arc::clone(&repository),
            Arc::clone(&reward_service),
            Arc::clone(&conversion_service),
        );

        Self {
            data_dir: data_dir.to_path_buf(),
            insight_service: InsightService::new(Arc::clone(&repository)),
            ledger_service: PointsLedgerService::new(Arc::clone(&repository)),
            category_service: CategoryService::new(Arc::clone(&repository)),
            status_service: StatusService::new(Arc::clone(&repository)),
            reward_service,
            conversion_service,
            simulator,
            repository,
            config,
        }
    }

    /// Look up a reward currency by code, case-insensitively
    pub async fn find_currency(&self, code: &str) -> Result<RewardCurrency> {
        let code = code.trim();
        self.repository
            .get_reward_currencies()
            .await?
            .into_iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| Error::not_found(format!("Reward currency '{}'", code)))
    }

    /// Look up a payment method by ID or by name, case-insensitively
    pub async fn find_payment_method(&self, key: &str) -> Result<PaymentMethod> {
        let key = key.trim();
        let methods = self.repository.get_payment_methods().await?;
        if let Ok(id) = uuid::Uuid::parse_str(key) {
            if let Some(method) = methods.iter().find(|m| m.id == id) {
                return Ok(method.clone());
            }
        }
        methods
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(key))
            .ok_or_else(|| Error::not_found(format!("Payment method '{}'", key)))
    }
}
