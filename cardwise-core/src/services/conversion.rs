//! Conversion service - reward currency conversion with a read-through cache
//!
//! Rates are looked up per (source, target) pair and kept for a fixed TTL.
//! Any write clears the whole cache; there is no finer invalidation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::ConversionRate;
use crate::ports::Repository;

/// Default time a cached rate stays fresh
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: Decimal,
    fetched_at: Instant,
}

/// Outgoing edge of the conversion graph, with the target's display code
#[derive(Debug, Clone, Serialize)]
pub struct RateEntry {
    pub target_currency_id: Uuid,
    pub target_code: String,
    pub rate: Decimal,
}

/// Converts points between reward currencies
pub struct ConversionService {
    repository: Arc<dyn Repository>,
    cache: Mutex<HashMap<(Uuid, Uuid), CachedRate>>,
    ttl: Duration,
}

impl ConversionService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self::with_ttl(repository, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(repository: Arc<dyn Repository>, ttl: Duration) -> Self {
        Self {
            repository,
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn cached(&self, key: (Uuid, Uuid)) -> Option<Decimal> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(&key)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.rate)
    }

    fn store(&self, key: (Uuid, Uuid), rate: Decimal) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                key,
                CachedRate {
                    rate,
                    fetched_at: Instant::now(),
                },
            );
        }
    }

    /// Rate from `source` to `target`, or None when no rate is known.
    ///
    /// Converting a currency into itself is always 1. Backend failures are
    /// logged and reported as a missing rate.
    pub async fn get_rate(&self, source: Uuid, target: Uuid) -> Option<Decimal> {
        if source == target {
            return Some(Decimal::ONE);
        }

        let key = (source, target);
        if let Some(rate) = self.cached(key) {
            tracing::debug!(%source, %target, "conversion rate cache hit");
            return Some(rate);
        }

        match self.repository.get_conversion_rate(source, target).await {
            Ok(Some(rate)) => {
                self.store(key, rate.rate);
                Some(rate.rate)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%source, %target, error = %e, "failed to load conversion rate");
                None
            }
        }
    }

    /// Convert `points` from `source` to `target`, rounding down.
    /// Results beyond `u64` saturate.
    pub async fn convert_points(&self, points: u64, source: Uuid, target: Uuid) -> Option<u64> {
        let rate = self.get_rate(source, target).await?;
        let converted = Decimal::from(points)
            .checked_mul(rate)
            .map(|v| v.floor().to_u64().unwrap_or(u64::MAX))
            .unwrap_or(u64::MAX);
        Some(converted)
    }

    /// Create or replace a rate, then clear the cache
    pub async fn set_rate(&self, source: Uuid, target: Uuid, rate: Decimal) -> Result<ConversionRate> {
        let edge = ConversionRate::new(source, target, rate);
        edge.validate().map_err(Error::validation)?;
        self.repository.upsert_conversion_rate(&edge).await?;
        self.invalidate();
        Ok(edge)
    }

    /// Remove a rate, then clear the cache
    pub async fn delete_rate(&self, source: Uuid, target: Uuid) -> Result<()> {
        let removed = self.repository.delete_conversion_rate(source, target).await?;
        self.invalidate();
        if !removed {
            return Err(Error::not_found(format!("Conversion rate {} -> {}", source, target)));
        }
        Ok(())
    }

    /// All outgoing rates from `source`, sorted by target code
    pub async fn rates_from(&self, source: Uuid) -> Result<Vec<RateEntry>> {
        let currencies = self.repository.get_reward_currencies().await?;
        let codes: HashMap<Uuid, String> = currencies.into_iter().map(|c| (c.id, c.code)).collect();

        let mut entries: Vec<RateEntry> = self
            .repository
            .get_conversion_rates()
            .await?
            .into_iter()
            .filter(|r| r.source_currency_id == source)
            .map(|r| RateEntry {
                target_code: codes
                    .get(&r.target_currency_id)
                    .cloned()
                    .unwrap_or_else(|| r.target_currency_id.to_string()),
                target_currency_id: r.target_currency_id,
                rate: r.rate,
            })
            .collect();
        entries.sort_by(|a, b| a.target_code.cmp(&b.target_code));
        Ok(entries)
    }

    /// Drop every cached rate
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Number of cached entries, fresh or stale
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}
