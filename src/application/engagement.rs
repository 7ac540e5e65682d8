//! Engagement orchestration: cache check, single-flight recomputation, commit.
//!
//! A request for a post is served from the store when the freshness oracle
//! vouches for the cached record. Otherwise the caller claims the post's
//! aggregation. The first claimant spawns the aggregation as its own task and
//! every claimant, first or not, waits on the same broadcast outcome. Because
//! the aggregation is detached from its callers, dropping a caller never
//! cancels it and its result is still committed for later requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::application::freshness::{CacheDecision, FreshnessOracle, FreshnessPolicy};
use crate::application::inflight::{Claim, FlightGuard, InFlightAggregations};
use crate::application::pipeline::{AggregateOutcome, AggregationError, AggregationPipeline};
use crate::application::repos::{EngagementStore, PersistError};
use crate::domain::entities::{EngagementRecord, PostId, ShareInfo};
use crate::domain::post_id::{ExtractError, extract_post_id};

pub(crate) const METRIC_CACHE_HIT: &str = "tweetreach_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "tweetreach_cache_miss_total";
pub(crate) const METRIC_AGGREGATION: &str = "tweetreach_aggregation_total";
pub(crate) const METRIC_AGGREGATION_JOINED: &str = "tweetreach_aggregation_joined_total";
pub(crate) const METRIC_AGGREGATION_FAILED: &str = "tweetreach_aggregation_failed_total";
pub(crate) const METRIC_AGGREGATION_MS: &str = "tweetreach_aggregation_ms";

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngagementResult {
    Served {
        id: PostId,
        total_reach: u64,
        share_details: Vec<ShareInfo>,
    },
    /// The post has never been shared. A valid answer, not a failure.
    NoEngagement { id: PostId },
    Failed(EngagementFailure),
}

impl EngagementResult {
    fn served(record: EngagementRecord) -> Self {
        Self::Served {
            id: record.id,
            total_reach: record.total_reach,
            share_details: record.share_details,
        }
    }

    pub fn post_id(&self) -> Option<&PostId> {
        match self {
            Self::Served { id, .. } | Self::NoEngagement { id } => Some(id),
            Self::Failed(failure) => failure.post_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedQuery,
    Aggregation,
    Persist,
    Timeout,
    Aborted,
}

impl FailureKind {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::MalformedQuery)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngagementFailure {
    #[error("malformed query: {0}")]
    MalformedQuery(#[source] ExtractError),
    #[error("aggregation failed for post {id}: {source}")]
    Aggregation {
        id: PostId,
        #[source]
        source: AggregationError,
    },
    #[error("failed to persist engagement for post {id}: {source}")]
    Persist {
        id: PostId,
        #[source]
        source: PersistError,
    },
    #[error("timed out after {waited:?} waiting for aggregation of post {id}")]
    Timeout { id: PostId, waited: Duration },
    #[error("aggregation of post {id} aborted before completing")]
    Aborted { id: PostId },
}

impl EngagementFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MalformedQuery(_) => FailureKind::MalformedQuery,
            Self::Aggregation { .. } => FailureKind::Aggregation,
            Self::Persist { .. } => FailureKind::Persist,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Aborted { .. } => FailureKind::Aborted,
        }
    }

    pub fn post_id(&self) -> Option<&PostId> {
        match self {
            Self::MalformedQuery(_) => None,
            Self::Aggregation { id, .. }
            | Self::Persist { id, .. }
            | Self::Timeout { id, .. }
            | Self::Aborted { id } => Some(id),
        }
    }
}

#[derive(Clone)]
pub struct EngagementService {
    store: Arc<dyn EngagementStore>,
    oracle: FreshnessOracle,
    pipeline: AggregationPipeline,
    inflight: InFlightAggregations,
    wait_timeout: Duration,
}

impl EngagementService {
    pub fn new(
        store: Arc<dyn EngagementStore>,
        policy: Arc<dyn FreshnessPolicy>,
        pipeline: AggregationPipeline,
    ) -> Self {
        Self {
            oracle: FreshnessOracle::new(store.clone(), policy),
            store,
            pipeline,
            inflight: InFlightAggregations::new(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Bound how long any caller waits on an aggregation.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn in_flight(&self) -> &InFlightAggregations {
        &self.inflight
    }

    pub async fn health_check(&self) -> Result<(), PersistError> {
        self.store.health_check().await
    }

    /// Resolve the engagement for the post referenced by `raw_query`.
    #[instrument(skip(self))]
    pub async fn calculate_engagement(&self, raw_query: &str) -> EngagementResult {
        match extract_post_id(raw_query) {
            Ok(id) => self.engagement_for(id).await,
            Err(err) => {
                debug!(error = %err, "rejecting malformed query");
                EngagementResult::Failed(EngagementFailure::MalformedQuery(err))
            }
        }
    }

    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn engagement_for(&self, id: PostId) -> EngagementResult {
        if let CacheDecision::Valid(record) = self.oracle.decide(&id).await {
            counter!(METRIC_CACHE_HIT).increment(1);
            info!(total_reach = record.total_reach, "returning from cache");
            return EngagementResult::served(record);
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        info!("cache needs to be refreshed");

        let mut receiver = match self.inflight.claim(&id) {
            Claim::Leader { guard, receiver } => {
                self.spawn_refresh(guard);
                receiver
            }
            Claim::Follower(receiver) => {
                counter!(METRIC_AGGREGATION_JOINED).increment(1);
                debug!("joining in-flight aggregation");
                receiver
            }
        };

        match tokio::time::timeout(self.wait_timeout, receiver.recv()).await {
            Ok(Ok(result)) => result,
            Ok(Err(_closed)) => {
                error!("aggregation task ended without publishing an outcome");
                EngagementResult::Failed(EngagementFailure::Aborted { id })
            }
            Err(_elapsed) => {
                warn!(
                    waited_ms = self.wait_timeout.as_millis(),
                    "gave up waiting for aggregation"
                );
                EngagementResult::Failed(EngagementFailure::Timeout {
                    id,
                    waited: self.wait_timeout,
                })
            }
        }
    }

    fn spawn_refresh(&self, guard: FlightGuard) {
        let service = self.clone();
        let span = info_span!("refresh", id = %guard.post_id());
        tokio::spawn(
            async move {
                let result = service.refresh(guard.post_id()).await;
                guard.complete(result);
            }
            .instrument(span),
        );
    }

    async fn refresh(&self, id: &PostId) -> EngagementResult {
        // A caller that lost the race to an already finished flight lands here;
        // the record that flight committed is good enough.
        if let CacheDecision::Valid(record) = self.oracle.decide(id).await {
            debug!("record refreshed by a previous flight");
            return EngagementResult::served(record);
        }

        counter!(METRIC_AGGREGATION).increment(1);
        let started = Instant::now();
        let outcome = self.pipeline.aggregate(id).await;
        histogram!(METRIC_AGGREGATION_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(AggregateOutcome::NoEngagement) => {
                info!("post has not been shared yet");
                EngagementResult::NoEngagement { id: id.clone() }
            }
            Ok(AggregateOutcome::Computed {
                total_reach,
                share_details,
            }) => match self.store.write(id, total_reach, share_details).await {
                Ok(record) => {
                    info!(total_reach = record.total_reach, "engagement persisted");
                    EngagementResult::served(record)
                }
                Err(err) => {
                    counter!(METRIC_AGGREGATION_FAILED).increment(1);
                    error!(error = %err, "failed to persist engagement");
                    EngagementResult::Failed(EngagementFailure::Persist {
                        id: id.clone(),
                        source: err,
                    })
                }
            },
            Err(err) => {
                counter!(METRIC_AGGREGATION_FAILED).increment(1);
                warn!(error = %err, "aggregation failed");
                EngagementResult::Failed(EngagementFailure::Aggregation {
                    id: id.clone(),
                    source: err,
                })
            }
        }
    }
}
