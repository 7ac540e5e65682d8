//! Cache freshness decisions.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::application::repos::EngagementStore;
use crate::domain::entities::{EngagementRecord, PostId};

/// Decides whether a stored record may still be served without recomputation.
pub trait FreshnessPolicy: Send + Sync {
    fn is_fresh(&self, record: &EngagementRecord, now: OffsetDateTime) -> bool;
}

/// Age-based policy: a record is fresh while younger than `ttl`.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    ttl: Duration,
}

impl TtlPolicy {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::try_from(ttl).unwrap_or(Duration::MAX),
        }
    }
}

impl FreshnessPolicy for TtlPolicy {
    fn is_fresh(&self, record: &EngagementRecord, now: OffsetDateTime) -> bool {
        now - record.computed_at < self.ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    Valid(EngagementRecord),
    Missing,
    Stale(EngagementRecord),
}

#[derive(Clone)]
pub struct FreshnessOracle {
    store: Arc<dyn EngagementStore>,
    policy: Arc<dyn FreshnessPolicy>,
}

impl FreshnessOracle {
    pub fn new(store: Arc<dyn EngagementStore>, policy: Arc<dyn FreshnessPolicy>) -> Self {
        Self { store, policy }
    }

    /// Classify the cached record for `id`.
    ///
    /// Never fails: a store error is logged and reported as [`CacheDecision::Missing`],
    /// which forces a recomputation whose write will surface the error if it persists.
    pub async fn decide(&self, id: &PostId) -> CacheDecision {
        let record = match self.store.read(id).await {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    target = "tweetreach::freshness",
                    id = %id,
                    error = %err,
                    "cache read failed; treating as missing"
                );
                return CacheDecision::Missing;
            }
        };

        match record {
            None => CacheDecision::Missing,
            Some(record) if self.policy.is_fresh(&record, OffsetDateTime::now_utc()) => {
                CacheDecision::Valid(record)
            }
            Some(record) => CacheDecision::Stale(record),
        }
    }

    pub async fn is_valid(&self, id: &PostId) -> bool {
        matches!(self.decide(id).await, CacheDecision::Valid(_))
    }
}
