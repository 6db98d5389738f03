//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and repository calls. Each one owns a
//! single feature area and holds the repository behind the port trait.

pub mod categorize;
pub mod conversion;
mod demo;
pub mod insights;
mod ledger;
pub mod logging;
pub mod migration;
pub mod rewards;
pub mod simulator;
pub mod spend;
mod status;

pub use categorize::{CategoryService, CategorySpend};
pub use conversion::{ConversionService, RateEntry, DEFAULT_CACHE_TTL};
pub use demo::{seed as seed_demo_data, DemoSeedSummary, DemoService};
pub use insights::{InsightContext, InsightEvaluator, InsightOutcome, InsightService, TriggeredInsight};
pub use ledger::{PointsBalanceSummary, PointsLedgerService};
pub use logging::{EventStats, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use rewards::{calculate_points, AppliedRule, PointsCalculation, RewardService, SpendContext};
pub use simulator::{CardRecommendation, CardSimulator, SimulationResult};
pub use spend::{period_bounds, MonthlySpendTracker};
pub use status::{DateRange, PaymentMethodSummary, StatusService, StatusSummary};
