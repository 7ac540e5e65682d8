use serde::{Deserialize, Serialize};

use crate::domain::entities::{PostId, ShareInfo};

pub const NO_RETWEET_MESSAGE: &str = "This tweet has not been retweeted yet.";

/// Query string of `GET /api/engagement` and body of the `POST` variant.
#[derive(Debug, Default, Deserialize)]
pub struct CalculateRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EngagementEnvelope {
    pub success: bool,
    pub data: EngagementData,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EngagementData {
    Reach {
        id: PostId,
        sum: u64,
        tweet: Vec<ShareInfo>,
    },
    Message {
        message: &'static str,
    },
}

impl EngagementEnvelope {
    pub fn served(id: PostId, total_reach: u64, share_details: Vec<ShareInfo>) -> Self {
        Self {
            success: true,
            data: EngagementData::Reach {
                id,
                sum: total_reach,
                tweet: share_details,
            },
        }
    }

    pub fn not_shared() -> Self {
        Self {
            success: false,
            data: EngagementData::Message {
                message: NO_RETWEET_MESSAGE,
            },
        }
    }
}
