//! Spend tracking - per-card spend within a billing or calendar period

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::SpendPeriod;
use crate::ports::Repository;
use crate::services::rewards::SpendContext;

/// Number of days in the given month
fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Month before (year, month)
fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Month after (year, month)
fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Cycle start date in a month, clamping the statement day to the month length
fn cycle_start(year: i32, month: u32, day: u32) -> NaiveDate {
    let clamped = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, clamped)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default())
}

/// Inclusive (start, end) of the spend period containing `date`
pub fn period_bounds(date: NaiveDate, period: SpendPeriod) -> (NaiveDate, NaiveDate) {
    match period {
        SpendPeriod::Calendar => {
            let start = cycle_start(date.year(), date.month(), 1);
            let end = cycle_start(date.year(), date.month(), 31);
            (start, end)
        }
        SpendPeriod::Statement { day } => {
            let this_month = cycle_start(date.year(), date.month(), day);
            let start = if date >= this_month {
                this_month
            } else {
                let (y, m) = previous_month(date.year(), date.month());
                cycle_start(y, m, day)
            };
            let (ny, nm) = next_month(start.year(), start.month());
            let end = cycle_start(ny, nm, day) - Duration::days(1);
            (start, end)
        }
    }
}

/// Sums a card's spend within its current period
pub struct MonthlySpendTracker {
    repository: Arc<dyn Repository>,
}

impl MonthlySpendTracker {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Spend and bonus points already used in the period containing `date`.
    ///
    /// `exclude_transaction` skips the transaction being edited so it is not
    /// counted against itself. A backend failure yields an empty context.
    pub async fn spend_context(
        &self,
        payment_method_id: Uuid,
        period: SpendPeriod,
        date: NaiveDate,
        exclude_transaction: Option<Uuid>,
    ) -> SpendContext {
        let (start, end) = period_bounds(date, period);

        let transactions = match self
            .repository
            .get_transactions_by_payment_method(payment_method_id, start, end)
            .await
        {
            Ok(txs) => txs,
            Err(e) => {
                tracing::warn!(
                    payment_method = %payment_method_id,
                    error = %e,
                    "failed to load period spend, assuming zero"
                );
                return SpendContext::default();
            }
        };

        let mut context = SpendContext::default();
        for tx in transactions
            .iter()
            .filter(|t| Some(t.id) != exclude_transaction)
            .filter(|t| t.is_purchase())
        {
            context.period_spend = context.period_spend.checked_add(tx.amount).unwrap_or(Decimal::MAX);
            context.bonus_points_used = context.bonus_points_used.saturating_add(tx.bonus_points);
        }

        tracing::debug!(
            payment_method = %payment_method_id,
            %start,
            %end,
            spend = %context.period_spend,
            "period spend loaded"
        );

        context
    }

    /// Total spend only
    pub async fn monthly_spend(
        &self,
        payment_method_id: Uuid,
        period: SpendPeriod,
        date: NaiveDate,
    ) -> Decimal {
        self.spend_context(payment_method_id, period, date, None)
            .await
            .period_spend
    }
}
