#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::macros::datetime;
use tokio::sync::Notify;
use tweetreach::application::engagement::EngagementService;
use tweetreach::application::freshness::TtlPolicy;
use tweetreach::application::pipeline::{
    AggregationError, AggregationPipeline, EngagementCalculator,
};
use tweetreach::application::repos::{EngagementStore, PersistError};
use tweetreach::domain::entities::{EngagementRecord, PostId, ShareInfo};
use tweetreach::infra::memory::InMemoryEngagementStore;

pub fn share(id: &str, author: &str, author_followers: u64) -> ShareInfo {
    ShareInfo {
        id: id.to_string(),
        author: author.to_string(),
        author_followers,
        shared_at: datetime!(2024-05-01 12:00 UTC),
    }
}

/// Two shares whose reach adds up to 42.
pub fn sample_shares() -> Vec<ShareInfo> {
    vec![share("e1", "alice", 30), share("e2", "bob", 10)]
}

pub fn status_url(id: &str) -> String {
    format!("https://x.com/user/status/{id}")
}

/// Scripted provider that records how often it is asked.
#[derive(Default)]
pub struct StubCalculator {
    shares: Mutex<HashMap<PostId, Vec<ShareInfo>>>,
    gates: Mutex<HashMap<PostId, Arc<Notify>>>,
    delay: Mutex<Option<Duration>>,
    fail_collect: AtomicBool,
    panic_on_collect: AtomicBool,
    probe_calls: AtomicUsize,
    collect_calls: AtomicUsize,
}

impl StubCalculator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_shares(&self, id: &str, shares: Vec<ShareInfo>) -> &Self {
        self.shares
            .lock()
            .expect("shares lock")
            .insert(PostId::new(id), shares);
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock") = Some(delay);
    }

    /// Hold `collect` for `id` until the returned handle is notified.
    pub fn gate(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .expect("gates lock")
            .insert(PostId::new(id), Arc::clone(&gate));
        gate
    }

    pub fn fail_collect(&self, fail: bool) {
        self.fail_collect.store(fail, Ordering::SeqCst);
    }

    pub fn panic_on_collect(&self, panic: bool) {
        self.panic_on_collect.store(panic, Ordering::SeqCst);
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn collect_calls(&self) -> usize {
        self.collect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngagementCalculator for StubCalculator {
    async fn has_any_shares(&self, id: &PostId) -> Result<bool, AggregationError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let shares = self.shares.lock().expect("shares lock");
        Ok(shares.get(id).is_some_and(|shares| !shares.is_empty()))
    }

    async fn collect(&self, id: &PostId) -> Result<Vec<ShareInfo>, AggregationError> {
        self.collect_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().expect("gates lock").get(id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let delay = *self.delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.panic_on_collect.load(Ordering::SeqCst) {
            panic!("provider stub panicked");
        }
        if self.fail_collect.load(Ordering::SeqCst) {
            return Err(AggregationError::transport("connection reset by peer"));
        }

        Ok(self
            .shares
            .lock()
            .expect("shares lock")
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory store that counts traffic and can be told to reject writes.
pub struct CountingStore {
    inner: InMemoryEngagementStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryEngagementStore::new(NonZeroUsize::new(64).expect("non-zero")),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Seed a record without counting it as orchestrator traffic.
    pub async fn seed(
        &self,
        id: &str,
        total_reach: u64,
        shares: Vec<ShareInfo>,
    ) -> EngagementRecord {
        self.inner
            .write(&PostId::new(id), total_reach, shares)
            .await
            .expect("seed write")
    }

    pub async fn peek(&self, id: &str) -> Option<EngagementRecord> {
        self.inner.read(&PostId::new(id)).await.expect("peek read")
    }
}

#[async_trait]
impl EngagementStore for CountingStore {
    async fn read(&self, id: &PostId) -> Result<Option<EngagementRecord>, PersistError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(id).await
    }

    async fn write(
        &self,
        id: &PostId,
        total_reach: u64,
        share_details: Vec<ShareInfo>,
    ) -> Result<EngagementRecord, PersistError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistError::from_persistence("disk full"));
        }
        self.inner.write(id, total_reach, share_details).await
    }
}

pub struct Harness {
    pub service: EngagementService,
    pub store: Arc<CountingStore>,
    pub calculator: Arc<StubCalculator>,
}

/// Service whose cached records stay fresh for an hour.
pub fn harness() -> Harness {
    harness_with_ttl(Duration::from_secs(3600))
}

/// Service that treats every cached record as stale.
pub fn stale_harness() -> Harness {
    harness_with_ttl(Duration::ZERO)
}

pub fn harness_with_ttl(ttl: Duration) -> Harness {
    let store = CountingStore::new();
    let calculator = StubCalculator::new();
    let service = EngagementService::new(
        store.clone(),
        Arc::new(TtlPolicy::new(ttl)),
        AggregationPipeline::new(calculator.clone()),
    );
    Harness {
        service,
        store,
        calculator,
    }
}
