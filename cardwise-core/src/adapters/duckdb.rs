//! DuckDB repository implementation
//!
//! A local file-backed stand-in for the hosted backend. IDs are stored as
//! VARCHAR, money and rates as DECIMAL, and nested documents (reward rules,
//! calculation methods, insight parameters) as JSON text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{params, Connection, OptionalExt, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    ConversionRate, Insight, PaymentMethod, PaymentMethodType, PointsAdjustment, PointsBalance,
    PointsRedemption, PointsTransfer, RewardCurrency, Transaction,
};
use crate::ports::Repository;
use crate::services::{MigrationResult, MigrationService};

/// Maximum attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// First retry delay; doubles on every attempt (50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Whether an open failure is a file lock that may clear on its own
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock")
}

const PAYMENT_METHOD_COLUMNS: &str = "payment_method_id, name, issuer, method_type, reward_currency_id, is_active,
     CAST(points_multiplier AS VARCHAR), calculation_method, spend_period, reward_rules,
     created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, CAST(amount AS VARCHAR), currency, merchant_name, mcc,
     category_override, payment_method_id, reward_points, bonus_points, is_contactless, is_online,
     CAST(reimbursement_amount AS VARCHAR), transaction_date::VARCHAR, created_at, updated_at";

/// DuckDB repository
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) a database file and apply pending migrations.
    ///
    /// Opening retries with exponential backoff while another process holds
    /// the file lock.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        let conn = loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => break conn,
                Err(e) if is_retryable_error(&e.to_string()) && attempt < MAX_RETRIES - 1 => {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let repository = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        };
        repository.ensure_schema()?;
        Ok(repository)
    }

    /// In-memory database with the schema applied
    pub fn open_in_memory() -> Result<Self> {
        let repository = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        repository.ensure_schema()?;
        Ok(repository)
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; json is linked in through the crate feature
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Apply pending migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            tracing::info!(applied = ?result.applied, "database migrations applied");
        }
        Ok(())
    }

    /// Path of the database file; None for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Row counts for the status summary
    pub fn table_counts(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.conn()?;
        let mut counts = Vec::new();
        for table in [
            "sys_payment_methods",
            "sys_reward_currencies",
            "sys_conversion_rates",
            "sys_transactions",
            "sys_insights",
        ] {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            counts.push((table.trim_start_matches("sys_").to_string(), count));
        }
        Ok(counts)
    }

    fn query_payment_methods(&self, filter: &str, args: &[&dyn duckdb::ToSql]) -> Result<Vec<PaymentMethod>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM sys_payment_methods {} ORDER BY name",
            PAYMENT_METHOD_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, PaymentMethodRow::read)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        rows.into_iter().map(PaymentMethodRow::into_domain).collect()
    }

    fn query_transactions(&self, filter: &str, args: &[&dyn duckdb::ToSql]) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM sys_transactions {} ORDER BY transaction_date DESC, created_at DESC",
            TRANSACTION_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, TransactionRow::read)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

struct PaymentMethodRow {
    id: String,
    name: String,
    issuer: Option<String>,
    method_type: String,
    reward_currency_id: Option<String>,
    is_active: bool,
    points_multiplier: String,
    calculation_method: String,
    spend_period: String,
    reward_rules: String,
    created_at: String,
    updated_at: String,
}

impl PaymentMethodRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            issuer: row.get(2)?,
            method_type: row.get(3)?,
            reward_currency_id: row.get(4)?,
            is_active: row.get(5)?,
            points_multiplier: row.get(6)?,
            calculation_method: row.get(7)?,
            spend_period: row.get(8)?,
            reward_rules: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_domain(self) -> Result<PaymentMethod> {
        Ok(PaymentMethod {
            id: parse_uuid(&self.id)?,
            name: self.name,
            issuer: self.issuer,
            method_type: PaymentMethodType::parse(&self.method_type),
            reward_currency_id: self.reward_currency_id.as_deref().map(parse_uuid).transpose()?,
            is_active: self.is_active,
            points_multiplier: parse_decimal(&self.points_multiplier)?,
            calculation_method: serde_json::from_str(&self.calculation_method)?,
            spend_period: serde_json::from_str(&self.spend_period)?,
            reward_rules: serde_json::from_str(&self.reward_rules)?,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

struct TransactionRow {
    id: String,
    amount: String,
    currency: String,
    merchant_name: Option<String>,
    mcc: Option<String>,
    category_override: Option<String>,
    payment_method_id: Option<String>,
    reward_points: i64,
    bonus_points: i64,
    is_contactless: bool,
    is_online: bool,
    reimbursement_amount: Option<String>,
    transaction_date: String,
    created_at: String,
    updated_at: String,
}

impl TransactionRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            amount: row.get(1)?,
            currency: row.get(2)?,
            merchant_name: row.get(3)?,
            mcc: row.get(4)?,
            category_override: row.get(5)?,
            payment_method_id: row.get(6)?,
            reward_points: row.get(7)?,
            bonus_points: row.get(8)?,
            is_contactless: row.get(9)?,
            is_online: row.get(10)?,
            reimbursement_amount: row.get(11)?,
            transaction_date: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn into_domain(self) -> Result<Transaction> {
        Ok(Transaction {
            id: parse_uuid(&self.id)?,
            amount: parse_decimal(&self.amount)?,
            currency: self.currency,
            merchant_name: self.merchant_name,
            mcc: self.mcc,
            category_override: self.category_override,
            payment_method_id: self.payment_method_id.as_deref().map(parse_uuid).transpose()?,
            reward_points: self.reward_points.max(0) as u64,
            bonus_points: self.bonus_points.max(0) as u64,
            is_contactless: self.is_contactless,
            is_online: self.is_online,
            reimbursement_amount: self.reimbursement_amount.as_deref().map(parse_decimal).transpose()?,
            transaction_date: parse_date(&self.transaction_date)?,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

#[async_trait]
impl Repository for DuckDbRepository {
    async fn upsert_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        method.validate().map_err(Error::validation)?;
        let calculation_method = serde_json::to_string(&method.calculation_method)?;
        let spend_period = serde_json::to_string(&method.spend_period)?;
        let reward_rules = serde_json::to_string(&method.reward_rules)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_payment_methods (payment_method_id, name, issuer, method_type,
                                              reward_currency_id, is_active, points_multiplier,
                                              calculation_method, spend_period, reward_rules,
                                              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, CAST(? AS DECIMAL(18, 4)), ?, ?, ?, ?, ?)
             ON CONFLICT (payment_method_id) DO UPDATE SET
                name = EXCLUDED.name,
                issuer = EXCLUDED.issuer,
                method_type = EXCLUDED.method_type,
                reward_currency_id = EXCLUDED.reward_currency_id,
                is_active = EXCLUDED.is_active,
                points_multiplier = EXCLUDED.points_multiplier,
                calculation_method = EXCLUDED.calculation_method,
                spend_period = EXCLUDED.spend_period,
                reward_rules = EXCLUDED.reward_rules,
                updated_at = EXCLUDED.updated_at",
            params![
                method.id.to_string(),
                method.name,
                method.issuer,
                method.method_type.as_str(),
                method.reward_currency_id.map(|id| id.to_string()),
                method.is_active,
                method.points_multiplier.to_string(),
                calculation_method,
                spend_period,
                reward_rules,
                method.created_at.to_rfc3339(),
                method.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn get_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        self.query_payment_methods("", &[])
    }

    async fn get_payment_method(&self, id: Uuid) -> Result<Option<PaymentMethod>> {
        let id = id.to_string();
        let mut methods = self.query_payment_methods("WHERE payment_method_id = ?", &[&id])?;
        Ok(methods.pop())
    }

    async fn get_active_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        self.query_payment_methods("WHERE is_active", &[])
    }

    async fn upsert_reward_currency(&self, currency: &RewardCurrency) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_reward_currencies (currency_id, code, display_name, issuer, is_transferrable)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (currency_id) DO UPDATE SET
                code = EXCLUDED.code,
                display_name = EXCLUDED.display_name,
                issuer = EXCLUDED.issuer,
                is_transferrable = EXCLUDED.is_transferrable",
            params![
                currency.id.to_string(),
                currency.code,
                currency.display_name,
                currency.issuer,
                currency.is_transferrable,
            ],
        )?;
        Ok(())
    }

    async fn get_reward_currencies(&self) -> Result<Vec<RewardCurrency>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT currency_id, code, display_name, issuer, is_transferrable
             FROM sys_reward_currencies ORDER BY code",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, code, display_name, issuer, is_transferrable)| {
                Ok(RewardCurrency {
                    id: parse_uuid(&id)?,
                    code,
                    display_name,
                    issuer,
                    is_transferrable,
                })
            })
            .collect()
    }

    async fn get_conversion_rate(&self, source: Uuid, target: Uuid) -> Result<Option<ConversionRate>> {
        let conn = self.conn()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT CAST(rate AS VARCHAR), updated_at FROM sys_conversion_rates
                 WHERE source_currency_id = ? AND target_currency_id = ?",
                params![source.to_string(), target.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(rate, updated_at)| {
            Ok(ConversionRate {
                source_currency_id: source,
                target_currency_id: target,
                rate: parse_decimal(&rate)?,
                updated_at: parse_timestamp(&updated_at),
            })
        })
        .transpose()
    }

    async fn get_conversion_rates(&self) -> Result<Vec<ConversionRate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source_currency_id, target_currency_id, CAST(rate AS VARCHAR), updated_at
             FROM sys_conversion_rates",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(source, target, rate, updated_at)| {
                Ok(ConversionRate {
                    source_currency_id: parse_uuid(&source)?,
                    target_currency_id: parse_uuid(&target)?,
                    rate: parse_decimal(&rate)?,
                    updated_at: parse_timestamp(&updated_at),
                })
            })
            .collect()
    }

    async fn upsert_conversion_rate(&self, rate: &ConversionRate) -> Result<()> {
        rate.validate().map_err(Error::validation)?;
        let conn = self.conn()?;

        let known: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_reward_currencies WHERE currency_id IN (?, ?)",
            params![rate.source_currency_id.to_string(), rate.target_currency_id.to_string()],
            |row| row.get(0),
        )?;
        if known < 2 {
            return Err(Error::database(
                "insert or update on sys_conversion_rates violates foreign key constraint on sys_reward_currencies",
            ));
        }

        conn.execute(
            "INSERT INTO sys_conversion_rates (source_currency_id, target_currency_id, rate, updated_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 6)), ?)
             ON CONFLICT (source_currency_id, target_currency_id) DO UPDATE SET
                rate = EXCLUDED.rate,
                updated_at = EXCLUDED.updated_at",
            params![
                rate.source_currency_id.to_string(),
                rate.target_currency_id.to_string(),
                rate.rate.to_string(),
                rate.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn delete_conversion_rate(&self, source: Uuid, target: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sys_conversion_rates WHERE source_currency_id = ? AND target_currency_id = ?",
            params![source.to_string(), target.to_string()],
        )?;
        Ok(deleted > 0)
    }

    async fn upsert_transaction(&self, tx: &Transaction) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_transactions (transaction_id, amount, currency, merchant_name, mcc,
                                           category_override, payment_method_id, reward_points,
                                           bonus_points, is_contactless, is_online,
                                           reimbursement_amount, transaction_date, created_at, updated_at)
             VALUES (?, CAST(? AS DECIMAL(18, 4)), ?, ?, ?, ?, ?, ?, ?, ?, ?,
                     CAST(? AS DECIMAL(18, 4)), CAST(? AS DATE), ?, ?)
             ON CONFLICT (transaction_id) DO UPDATE SET
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                merchant_name = EXCLUDED.merchant_name,
                mcc = EXCLUDED.mcc,
                category_override = EXCLUDED.category_override,
                payment_method_id = EXCLUDED.payment_method_id,
                reward_points = EXCLUDED.reward_points,
                bonus_points = EXCLUDED.bonus_points,
                is_contactless = EXCLUDED.is_contactless,
                is_online = EXCLUDED.is_online,
                reimbursement_amount = EXCLUDED.reimbursement_amount,
                transaction_date = EXCLUDED.transaction_date,
                updated_at = EXCLUDED.updated_at",
            params![
                tx.id.to_string(),
                tx.amount.to_string(),
                tx.currency,
                tx.merchant_name,
                tx.mcc,
                tx.category_override,
                tx.payment_method_id.map(|id| id.to_string()),
                tx.reward_points as i64,
                tx.bonus_points as i64,
                tx.is_contactless,
                tx.is_online,
                tx.reimbursement_amount.map(|d| d.to_string()),
                tx.transaction_date.to_string(),
                tx.created_at.to_rfc3339(),
                tx.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn get_transactions_by_payment_method(
        &self,
        payment_method_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let id = payment_method_id.to_string();
        let start = start_date.to_string();
        let end = end_date.to_string();
        self.query_transactions(
            "WHERE payment_method_id = ?
               AND transaction_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE)",
            &[&id, &start, &end],
        )
    }

    async fn get_transactions_by_date_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let start = start_date.to_string();
        let end = end_date.to_string();
        self.query_transactions(
            "WHERE transaction_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE)",
            &[&start, &end],
        )
    }

    async fn get_transactions(&self) -> Result<Vec<Transaction>> {
        self.query_transactions("", &[])
    }

    async fn get_mcc_mappings(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT mcc, category FROM sys_mcc_mappings")?;
        let mappings = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<duckdb::Result<HashMap<_, _>>>()?;
        Ok(mappings)
    }

    async fn set_mcc_mapping(&self, mcc: &str, category: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_mcc_mappings (mcc, category) VALUES (?, ?)
             ON CONFLICT (mcc) DO UPDATE SET category = EXCLUDED.category",
            params![mcc.trim(), category.trim()],
        )?;
        Ok(())
    }

    async fn upsert_insight(&self, insight: &Insight) -> Result<()> {
        let parameters = serde_json::to_string(&insight.parameters)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_insights (insight_id, name, condition_type, parameters,
                                       message_template, priority, is_active)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (insight_id) DO UPDATE SET
                name = EXCLUDED.name,
                condition_type = EXCLUDED.condition_type,
                parameters = EXCLUDED.parameters,
                message_template = EXCLUDED.message_template,
                priority = EXCLUDED.priority,
                is_active = EXCLUDED.is_active",
            params![
                insight.id.to_string(),
                insight.name,
                insight.condition_type,
                parameters,
                insight.message_template,
                insight.priority,
                insight.is_active,
            ],
        )?;
        Ok(())
    }

    async fn get_insights(&self) -> Result<Vec<Insight>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT insight_id, name, condition_type, parameters, message_template, priority, is_active
             FROM sys_insights ORDER BY priority DESC, name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i32>(5)?,
                    row.get::<_, bool>(6)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, name, condition_type, parameters, message_template, priority, is_active)| {
                Ok(Insight {
                    id: parse_uuid(&id)?,
                    name,
                    condition_type,
                    parameters: serde_json::from_str(&parameters)?,
                    message_template,
                    priority,
                    is_active,
                })
            })
            .collect()
    }

    async fn get_dismissed_insight_ids(&self) -> Result<Vec<Uuid>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT insight_id FROM sys_dismissed_insights")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    async fn dismiss_insight(&self, id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_insights WHERE insight_id = ?",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::not_found(format!("Insight {}", id)));
        }
        conn.execute(
            "INSERT INTO sys_dismissed_insights (insight_id, dismissed_at) VALUES (?, ?)
             ON CONFLICT (insight_id) DO NOTHING",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn set_points_balance(&self, balance: &PointsBalance) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_points_balances (currency_id, starting_balance) VALUES (?, ?)
             ON CONFLICT (currency_id) DO UPDATE SET starting_balance = EXCLUDED.starting_balance",
            params![balance.currency_id.to_string(), balance.starting_balance],
        )?;
        Ok(())
    }

    async fn get_points_balance(&self, currency_id: Uuid) -> Result<Option<PointsBalance>> {
        let conn = self.conn()?;
        let starting_balance: Option<i64> = conn
            .query_row(
                "SELECT starting_balance FROM sys_points_balances WHERE currency_id = ?",
                [currency_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(starting_balance.map(|starting_balance| PointsBalance {
            currency_id,
            starting_balance,
        }))
    }

    async fn add_points_adjustment(&self, adjustment: &PointsAdjustment) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_points_adjustments (adjustment_id, currency_id, amount, reason, adjustment_date)
             VALUES (?, ?, ?, ?, CAST(? AS DATE))",
            params![
                adjustment.id.to_string(),
                adjustment.currency_id.to_string(),
                adjustment.amount,
                adjustment.reason,
                adjustment.date.to_string(),
            ],
        )?;
        Ok(())
    }

    async fn get_points_adjustments(&self, currency_id: Uuid) -> Result<Vec<PointsAdjustment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT adjustment_id, amount, reason, adjustment_date::VARCHAR
             FROM sys_points_adjustments WHERE currency_id = ? ORDER BY adjustment_date",
        )?;
        let rows = stmt
            .query_map([currency_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, amount, reason, date)| {
                Ok(PointsAdjustment {
                    id: parse_uuid(&id)?,
                    currency_id,
                    amount,
                    reason,
                    date: parse_date(&date)?,
                })
            })
            .collect()
    }

    async fn add_points_redemption(&self, redemption: &PointsRedemption) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_points_redemptions (redemption_id, currency_id, points, description, redemption_date)
             VALUES (?, ?, ?, ?, CAST(? AS DATE))",
            params![
                redemption.id.to_string(),
                redemption.currency_id.to_string(),
                redemption.points as i64,
                redemption.description,
                redemption.date.to_string(),
            ],
        )?;
        Ok(())
    }

    async fn get_points_redemptions(&self, currency_id: Uuid) -> Result<Vec<PointsRedemption>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT redemption_id, points, description, redemption_date::VARCHAR
             FROM sys_points_redemptions WHERE currency_id = ? ORDER BY redemption_date",
        )?;
        let rows = stmt
            .query_map([currency_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, points, description, date)| {
                Ok(PointsRedemption {
                    id: parse_uuid(&id)?,
                    currency_id,
                    points: points.max(0) as u64,
                    description,
                    date: parse_date(&date)?,
                })
            })
            .collect()
    }

    async fn add_points_transfer(&self, transfer: &PointsTransfer) -> Result<()> {
        if transfer.source_currency_id == transfer.target_currency_id {
            return Err(Error::validation("cannot transfer points into the same currency"));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_points_transfers (transfer_id, source_currency_id, target_currency_id,
                                               points, received, transfer_date)
             VALUES (?, ?, ?, ?, ?, CAST(? AS DATE))",
            params![
                transfer.id.to_string(),
                transfer.source_currency_id.to_string(),
                transfer.target_currency_id.to_string(),
                transfer.points as i64,
                transfer.received as i64,
                transfer.date.to_string(),
            ],
        )?;
        Ok(())
    }

    async fn get_points_transfers(&self, currency_id: Uuid) -> Result<Vec<PointsTransfer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT transfer_id, source_currency_id, target_currency_id, points, received,
                    transfer_date::VARCHAR
             FROM sys_points_transfers
             WHERE source_currency_id = ? OR target_currency_id = ?
             ORDER BY transfer_date",
        )?;
        let id = currency_id.to_string();
        let rows = stmt
            .query_map(params![id, id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, source, target, points, received, date)| {
                Ok(PointsTransfer {
                    id: parse_uuid(&id)?,
                    source_currency_id: parse_uuid(&source)?,
                    target_currency_id: parse_uuid(&target)?,
                    points: points.max(0) as u64,
                    received: received.max(0) as u64,
                    date: parse_date(&date)?,
                })
            })
            .collect()
    }
}

// Helper functions

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim()).map_err(|e| Error::database(format!("invalid id '{}': {}", s, e)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim()).map_err(|e| Error::database(format!("invalid decimal '{}': {}", s, e)))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::database(format!("invalid date '{}': {}", s, e)))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
