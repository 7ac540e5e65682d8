//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{EngagementRecord, PostId, ShareInfo};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl PersistError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Durable home of engagement records.
///
/// At most one record exists per [`PostId`]. `write` replaces the previous
/// record wholesale and must be atomic with respect to concurrent `read`s: a
/// reader observes either the old record or the new one.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    async fn read(&self, id: &PostId) -> Result<Option<EngagementRecord>, PersistError>;

    /// Replace the record for `id`, returning it as stored.
    async fn write(
        &self,
        id: &PostId,
        total_reach: u64,
        share_details: Vec<ShareInfo>,
    ) -> Result<EngagementRecord, PersistError>;

    async fn health_check(&self) -> Result<(), PersistError> {
        Ok(())
    }
}
