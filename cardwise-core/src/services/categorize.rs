//! Category service - effective categories for transactions

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::{CategoryMap, Transaction};
use crate::ports::Repository;

/// Net spend in one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub amount: Decimal,
    pub transaction_count: usize,
}

/// Category service for MCC mapping and category rollups
pub struct CategoryService {
    repository: Arc<dyn Repository>,
}

impl CategoryService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Built-in MCC table with the user's overrides applied.
    ///
    /// Falls back to the built-in table if the overrides cannot be loaded.
    pub async fn category_map(&self) -> CategoryMap {
        match self.repository.get_mcc_mappings().await {
            Ok(mappings) => CategoryMap::with_user_mappings(mappings),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load MCC overrides, using built-in table");
                CategoryMap::builtin()
            }
        }
    }

    /// Effective category of a transaction
    pub async fn effective_category(&self, tx: &Transaction) -> String {
        tx.effective_category(&self.category_map().await)
    }

    /// Map an MCC to a category for this user
    pub async fn set_mapping(&self, mcc: &str, category: &str) -> Result<()> {
        if mcc.trim().is_empty() || category.trim().is_empty() {
            return Err(crate::domain::result::Error::validation(
                "MCC and category must both be non-empty",
            ));
        }
        self.repository.set_mcc_mapping(mcc, category).await
    }

    /// Net purchase spend grouped by effective category, largest first
    pub fn spend_by_category(transactions: &[Transaction], categories: &CategoryMap) -> Vec<CategorySpend> {
        let mut totals: HashMap<String, (Decimal, usize)> = HashMap::new();
        for tx in transactions.iter().filter(|t| t.is_purchase()) {
            let entry = totals
                .entry(tx.effective_category(categories))
                .or_insert((Decimal::ZERO, 0));
            entry.0 += tx.net_amount();
            entry.1 += 1;
        }

        let mut result: Vec<CategorySpend> = totals
            .into_iter()
            .map(|(category, (amount, transaction_count))| CategorySpend {
                category,
                amount,
                transaction_count,
            })
            .collect();
        result.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
        result
    }
}
