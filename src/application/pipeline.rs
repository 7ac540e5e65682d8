//! Aggregation of share events into a reach figure.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{PostId, ShareInfo};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider responded with status {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
}

impl AggregationError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Access to the provider's share graph for a post.
#[async_trait]
pub trait EngagementCalculator: Send + Sync {
    /// Cheap probe: has the post been shared at all?
    async fn has_any_shares(&self, id: &PostId) -> Result<bool, AggregationError>;

    /// Every share event, in the provider's natural order.
    async fn collect(&self, id: &PostId) -> Result<Vec<ShareInfo>, AggregationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateOutcome {
    NoEngagement,
    Computed {
        total_reach: u64,
        share_details: Vec<ShareInfo>,
    },
}

#[derive(Clone)]
pub struct AggregationPipeline {
    calculator: Arc<dyn EngagementCalculator>,
}

impl AggregationPipeline {
    pub fn new(calculator: Arc<dyn EngagementCalculator>) -> Self {
        Self { calculator }
    }

    pub async fn aggregate(&self, id: &PostId) -> Result<AggregateOutcome, AggregationError> {
        if !self.calculator.has_any_shares(id).await? {
            return Ok(AggregateOutcome::NoEngagement);
        }

        let share_details = self.calculator.collect(id).await?;
        // The probe and the listing can disagree when shares are withdrawn in between.
        if share_details.is_empty() {
            return Ok(AggregateOutcome::NoEngagement);
        }

        Ok(AggregateOutcome::Computed {
            total_reach: total_reach(&share_details),
            share_details,
        })
    }
}

/// Reach of a share set: each share counts once, plus the audience of its author.
pub fn total_reach(shares: &[ShareInfo]) -> u64 {
    shares.iter().fold(0u64, |acc, share| {
        acc.saturating_add(1).saturating_add(share.author_followers)
    })
}
