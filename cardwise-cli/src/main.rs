//! Cardwise CLI - pick the card that earns the most

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::balance::BalanceCommands;
use commands::category::CategoryCommands;
use commands::demo::DemoCommands;
use commands::insights::InsightsCommands;
use commands::logs::LogsCommands;
use commands::rates::RatesCommands;
use commands::PurchaseArgs;

/// Filter directive for diagnostic output on stderr
const LOG_ENV: &str = "CARDWISE_LOG";

#[derive(Parser)]
#[command(name = "cw", version, about = "Credit card rewards optimizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a summary of cards, currencies and transactions
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List payment methods and their reward rules
    Cards {
        /// Include inactive cards
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Calculate the points one card earns on a purchase
    Calc {
        /// Card name or ID
        card: String,
        #[command(flatten)]
        purchase: PurchaseArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rank every active card for a purchase
    Simulate {
        #[command(flatten)]
        purchase: PurchaseArgs,
        /// Reward currency code to compare in
        #[arg(long)]
        target: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check recent purchases against the best card
    Recommend {
        /// Check a single transaction
        #[arg(long)]
        transaction: Option<String>,
        /// How many days back to check
        #[arg(long, default_value = "30")]
        days: u32,
        /// Reward currency code to compare in
        #[arg(long)]
        target: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage conversion rates between reward currencies
    Rates {
        #[command(subcommand)]
        command: RatesCommands,
    },
    /// Convert points from one reward currency into another
    Convert {
        /// Number of points
        points: u64,
        /// Source currency code
        from: String,
        /// Target currency code
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show and manage points balances
    Balance {
        #[command(subcommand)]
        command: Option<BalanceCommands>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate spending insights
    Insights {
        #[command(subcommand)]
        command: InsightsCommands,
    },
    /// Map merchant category codes or show spend by category
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<DemoCommands>,
    },
    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: LogsCommands,
    },
}

impl Commands {
    /// Name recorded in the event log
    fn name(&self) -> &'static str {
        match self {
            Commands::Status { .. } => "status",
            Commands::Cards { .. } => "cards",
            Commands::Calc { .. } => "calc",
            Commands::Simulate { .. } => "simulate",
            Commands::Recommend { .. } => "recommend",
            Commands::Rates { .. } => "rates",
            Commands::Convert { .. } => "convert",
            Commands::Balance { .. } => "balance",
            Commands::Insights { .. } => "insights",
            Commands::Category { .. } => "category",
            Commands::Demo { .. } => "demo",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let name = cli.command.name();

    let started = Instant::now();
    let result = run(cli).await;
    let elapsed_ms = started.elapsed().as_millis() as i64;

    // Logging never changes the outcome of a command
    let logger = commands::get_logger();
    match result {
        Ok(()) => {
            if let Some(l) = &logger {
                let _ = l.log_command(name, elapsed_ms);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(l) = &logger {
                let _ = l.log_error(name, &e.to_string(), Some(&format!("{:#}", e)));
            }
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => commands::status::run(json).await,
        Commands::Cards { all, json } => commands::cards::run(all, json).await,
        Commands::Calc { card, purchase, json } => commands::calc::run(&card, &purchase, json).await,
        Commands::Simulate { purchase, target, json } => {
            commands::simulate::run(&purchase, target.as_deref(), json).await
        }
        Commands::Recommend {
            transaction,
            days,
            target,
            json,
        } => commands::recommend::run(transaction.as_deref(), days, target.as_deref(), json).await,
        Commands::Rates { command } => commands::rates::run(command).await,
        Commands::Convert { points, from, to, json } => commands::convert::run(points, &from, &to, json).await,
        Commands::Balance { command, json } => commands::balance::run(command, json).await,
        Commands::Insights { command } => commands::insights::run(command).await,
        Commands::Category { command } => commands::category::run(command).await,
        Commands::Demo { command } => commands::demo::run(command).await,
        Commands::Logs { command } => commands::logs::run(command),
    }
}
