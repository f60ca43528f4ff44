//! Confirms that freshly written bookings are visible through the read cache.
//!
//! The change feed normally invalidates the cache before anyone looks, so
//! this is the fallback path: a bounded poll of cache then database that
//! ends in a manual refresh offer rather than an error.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use serde::Serialize;

use crate::cache::BookingCache;
use crate::config::AppConfig;
use crate::db::queries;
use crate::models::Booking;

#[async_trait]
pub trait VerificationBackend: Send + Sync {
    /// The subset of `ids` stored under `branch_id`.
    async fn existing_ids(&self, branch_id: &str, ids: &[String]) -> anyhow::Result<HashSet<String>>;
    async fn count_bookings(&self, branch_id: &str) -> anyhow::Result<i64>;
    async fn fetch_branch(&self, branch_id: &str) -> anyhow::Result<Vec<Booking>>;
}

pub struct SqliteBackend {
    db: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VerificationBackend for SqliteBackend {
    async fn existing_ids(&self, branch_id: &str, ids: &[String]) -> anyhow::Result<HashSet<String>> {
        let db = self.db.lock().unwrap();
        queries::get_existing_booking_ids(&db, branch_id, ids)
    }

    async fn count_bookings(&self, branch_id: &str) -> anyhow::Result<i64> {
        let db = self.db.lock().unwrap();
        queries::count_bookings_for_branch(&db, branch_id)
    }

    async fn fetch_branch(&self, branch_id: &str) -> anyhow::Result<Vec<Booking>> {
        let db = self.db.lock().unwrap();
        queries::get_bookings_for_branch(&db, branch_id)
    }
}

#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub initial_delay: Duration,
    pub retry_delay: Duration,
    pub max_attempts: u32,
}

impl VerifierSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            initial_delay: config.verify_initial_delay(),
            retry_delay: config.verify_retry_delay(),
            max_attempts: config.verify_max_attempts.max(1),
        }
    }
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            retry_delay: Duration::from_millis(1000),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPhase {
    Idle,
    Verifying,
    Retrying,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    Cache,
    Backend,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub expected: usize,
    pub found: usize,
    pub attempts: u32,
    pub resolved_by: Option<ResolvedBy>,
    pub cache_refreshed: bool,
    pub manual_refresh_offered: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountCheck {
    pub db_count: i64,
    pub cache_count: i64,
    pub refreshed: bool,
}

/// True when cache and database counts drift by more than
/// `max(5, 10% of db_count)`.
pub fn count_drift_exceeds(db_count: i64, cache_count: i64) -> bool {
    let threshold = (db_count as f64 * 0.1).max(5.0);
    (db_count - cache_count).abs() as f64 > threshold
}

pub struct BookingVerifier {
    backend: Arc<dyn VerificationBackend>,
    cache: Arc<BookingCache>,
    settings: VerifierSettings,
}

struct Run<'a> {
    branch_id: &'a str,
    phase: VerificationPhase,
}

impl Run<'_> {
    fn enter(&mut self, next: VerificationPhase, attempt: u32) {
        tracing::debug!(
            branch_id = self.branch_id,
            from = ?self.phase,
            to = ?next,
            attempt,
            "verification phase"
        );
        self.phase = next;
    }
}

impl BookingVerifier {
    pub fn new(
        backend: Arc<dyn VerificationBackend>,
        cache: Arc<BookingCache>,
        settings: VerifierSettings,
    ) -> Self {
        Self {
            backend,
            cache,
            settings,
        }
    }

    /// Polls for `expected_ids` in the cache, falling back to the database.
    /// Never fails: an unconfirmed write is reported with its counts and a
    /// manual refresh offer.
    pub async fn verify_created(
        &self,
        branch_id: &str,
        expected_ids: &[String],
    ) -> VerificationOutcome {
        let mut seen = HashSet::new();
        let unique: Vec<String> = expected_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        let expected_ids = unique.as_slice();
        let expected = expected_ids.len();
        if expected == 0 {
            return VerificationOutcome {
                verified: true,
                expected: 0,
                found: 0,
                attempts: 0,
                resolved_by: None,
                cache_refreshed: false,
                manual_refresh_offered: false,
            };
        }

        let mut run = Run {
            branch_id,
            phase: VerificationPhase::Idle,
        };
        let mut found = 0;

        for attempt in 1..=self.settings.max_attempts {
            let delay = if attempt == 1 {
                self.settings.initial_delay
            } else {
                self.settings.retry_delay
            };
            tokio::time::sleep(delay).await;
            run.enter(VerificationPhase::Verifying, attempt);

            let in_cache = self.cache.count_present(branch_id, expected_ids);
            if in_cache == expected {
                run.enter(VerificationPhase::Resolved, attempt);
                return VerificationOutcome {
                    verified: true,
                    expected,
                    found: in_cache,
                    attempts: attempt,
                    resolved_by: Some(ResolvedBy::Cache),
                    cache_refreshed: false,
                    manual_refresh_offered: false,
                };
            }
            found = in_cache;

            match self.backend.existing_ids(branch_id, expected_ids).await {
                Ok(existing) if existing.len() == expected => {
                    tracing::info!(
                        branch_id,
                        missing_from_cache = expected - in_cache,
                        "cache stale after write, refetching"
                    );
                    if let Err(e) = self.refetch(branch_id).await {
                        tracing::warn!(error = %e, branch_id, "cache refetch failed");
                    }

                    // Only the cache counts as visible
                    let refreshed = self.cache.count_present(branch_id, expected_ids);
                    if refreshed == expected {
                        run.enter(VerificationPhase::Resolved, attempt);
                        return VerificationOutcome {
                            verified: true,
                            expected,
                            found: refreshed,
                            attempts: attempt,
                            resolved_by: Some(ResolvedBy::Backend),
                            cache_refreshed: true,
                            manual_refresh_offered: false,
                        };
                    }
                    found = found.max(refreshed);
                }
                Ok(existing) => {
                    found = found.max(existing.len());
                }
                Err(e) => {
                    tracing::warn!(error = %e, branch_id, attempt, "verification lookup failed");
                }
            }

            if attempt < self.settings.max_attempts {
                run.enter(VerificationPhase::Retrying, attempt);
            }
        }

        run.enter(VerificationPhase::Idle, self.settings.max_attempts);
        tracing::warn!(
            branch_id,
            found,
            expected,
            attempts = self.settings.max_attempts,
            "could not confirm new bookings, offering manual refresh"
        );

        VerificationOutcome {
            verified: false,
            expected,
            found,
            attempts: self.settings.max_attempts,
            resolved_by: None,
            cache_refreshed: false,
            manual_refresh_offered: true,
        }
    }

    /// Refetches the branch when cache and database counts have drifted too far.
    pub async fn check_count_consistency(&self, branch_id: &str) -> anyhow::Result<CountCheck> {
        let db_count = self.backend.count_bookings(branch_id).await?;
        let cache_count = self.cache.count(branch_id) as i64;

        let refreshed = if count_drift_exceeds(db_count, cache_count) {
            tracing::info!(branch_id, db_count, cache_count, "booking count drift, refetching");
            self.refetch(branch_id).await?;
            true
        } else {
            false
        };

        Ok(CountCheck {
            db_count,
            cache_count,
            refreshed,
        })
    }

    /// The manual refresh action: unconditional refetch of the branch.
    pub async fn force_refresh(&self, branch_id: &str) -> anyhow::Result<usize> {
        tracing::info!(branch_id, "manual cache refresh");
        self.refetch(branch_id).await
    }

    async fn refetch(&self, branch_id: &str) -> anyhow::Result<usize> {
        self.cache.invalidate(branch_id);
        let generation = self.cache.generation(branch_id);
        let bookings = self.backend.fetch_branch(branch_id).await?;
        let count = bookings.len();
        self.cache.replace_branch(branch_id, bookings, generation);
        Ok(count)
    }
}
