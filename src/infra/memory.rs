//! Bounded in-process engagement store.
//!
//! Used when no database is configured. Records live in an LRU map behind a
//! single lock, so a write replaces the record for an id in one step and a
//! concurrent reader sees either the previous record or the new one.

use std::num::NonZeroUsize;
use std::sync::{LockResult, RwLock};

use async_trait::async_trait;
use lru::LruCache;
use time::OffsetDateTime;
use tracing::warn;

use crate::application::repos::{EngagementStore, PersistError};
use crate::domain::entities::{EngagementRecord, PostId, ShareInfo};

pub struct InMemoryEngagementStore {
    records: RwLock<LruCache<PostId, EngagementRecord>>,
}

impl InMemoryEngagementStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            records: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        recover(self.records.read(), "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EngagementStore for InMemoryEngagementStore {
    async fn read(&self, id: &PostId) -> Result<Option<EngagementRecord>, PersistError> {
        Ok(recover(self.records.write(), "read").get(id).cloned())
    }

    async fn write(
        &self,
        id: &PostId,
        total_reach: u64,
        share_details: Vec<ShareInfo>,
    ) -> Result<EngagementRecord, PersistError> {
        let record = EngagementRecord {
            id: id.clone(),
            total_reach,
            share_details,
            computed_at: OffsetDateTime::now_utc(),
        };
        recover(self.records.write(), "write").put(id.clone(), record.clone());
        Ok(record)
    }
}

// A panic while holding the lock cannot leave a half-written record: `put`
// swaps whole values, so the map is usable after recovery.
fn recover<G>(result: LockResult<G>, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = "infra::memory",
            result = "poisoned_recovered",
            "Recovered from poisoned store lock"
        );
        poisoned.into_inner()
    })
}
