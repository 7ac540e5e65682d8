//! Domain entities mirrored from persistent storage.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Canonical identifier of a post, as extracted from a request query.
///
/// Opaque to the rest of the system; equality is byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One share (retweet) of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub id: String,
    pub author: String,
    pub author_followers: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub shared_at: OffsetDateTime,
}

/// Cached engagement for a single post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub id: PostId,
    pub total_reach: u64,
    pub share_details: Vec<ShareInfo>,
    #[serde(with = "time::serde::rfc3339")]
    pub computed_at: OffsetDateTime,
}
