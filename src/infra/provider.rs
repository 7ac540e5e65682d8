//! HTTP client for the social network's status API.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, de::DeserializeOwned};
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};
use tracing::{debug, warn};

use crate::{
    application::pipeline::{AggregationError, EngagementCalculator},
    config::ProviderSettings,
    domain::entities::{PostId, ShareInfo},
};

use super::error::InfraError;

/// `Wed Oct 10 20:19:24 +0000 2018`
const PROVIDER_DATE_FORMAT: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
);

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    retweet_count: u64,
}

#[derive(Debug, Deserialize)]
struct RetweetPayload {
    id_str: String,
    created_at: String,
    user: RetweeterPayload,
}

#[derive(Debug, Deserialize)]
struct RetweeterPayload {
    screen_name: String,
    #[serde(default)]
    followers_count: u64,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorPayload {
    #[serde(default)]
    errors: Vec<ProviderErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEntry {
    message: String,
}

impl TryFrom<RetweetPayload> for ShareInfo {
    type Error = AggregationError;

    fn try_from(payload: RetweetPayload) -> Result<Self, Self::Error> {
        let shared_at = parse_provider_date(&payload.created_at)?;
        Ok(Self {
            id: payload.id_str,
            author: payload.user.screen_name,
            author_followers: payload.user.followers_count,
            shared_at,
        })
    }
}

fn parse_provider_date(raw: &str) -> Result<OffsetDateTime, AggregationError> {
    OffsetDateTime::parse(raw, PROVIDER_DATE_FORMAT)
        .map_err(|err| AggregationError::decode(format!("invalid created_at `{raw}`: {err}")))
}

/// Engagement calculator backed by the provider's REST API.
#[derive(Clone, Debug)]
pub struct ProviderCalculator {
    client: Client,
    base: Url,
    page_size: u8,
}

impl ProviderCalculator {
    pub fn new(settings: &ProviderSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InfraError::provider(err.to_string()))?;

        Ok(Self {
            client,
            base: settings.base_url.clone(),
            page_size: settings.page_size,
        })
    }

    pub fn with_client(client: Client, base: Url, page_size: u8) -> Self {
        Self {
            client,
            base,
            page_size,
        }
    }

    pub fn user_agent() -> &'static str {
        concat!("tweetreach/", env!("CARGO_PKG_VERSION"))
    }

    fn endpoint(&self, resource: &str, id: &PostId) -> Result<Url, AggregationError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AggregationError::transport(format!("base URL {} cannot carry a path", self.base))
            })?
            .pop_if_empty()
            .extend(["statuses", resource, &format!("{id}.json")]);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, AggregationError> {
        debug!(%url, "querying provider");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AggregationError::transport)?;

        let response = ensure_success(response).await?;
        response.json::<T>().await.map_err(AggregationError::decode)
    }
}

async fn ensure_success(response: Response) -> Result<Response, AggregationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ProviderErrorPayload>(&body)
        .ok()
        .and_then(|payload| payload.errors.into_iter().next())
        .map(|entry| entry.message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body
            }
        });

    Err(AggregationError::Provider {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl EngagementCalculator for ProviderCalculator {
    async fn has_any_shares(&self, id: &PostId) -> Result<bool, AggregationError> {
        let url = self.endpoint("show", id)?;
        let status: StatusPayload = self.fetch(url).await?;
        Ok(status.retweet_count > 0)
    }

    async fn collect(&self, id: &PostId) -> Result<Vec<ShareInfo>, AggregationError> {
        let mut url = self.endpoint("retweets", id)?;
        url.query_pairs_mut()
            .append_pair("count", &self.page_size.to_string());

        let retweets: Vec<RetweetPayload> = self.fetch(url).await?;
        if listing_may_be_truncated(retweets.len(), self.page_size) {
            warn!(
                id = %id,
                page_size = self.page_size,
                "retweet listing filled a whole page; reach only covers the most recent shares"
            );
        }
        retweets.into_iter().map(ShareInfo::try_from).collect()
    }
}

/// The retweets endpoint serves one page of the most recent shares.
fn listing_may_be_truncated(returned: usize, page_size: u8) -> bool {
    returned >= usize::from(page_size)
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode,
        response::IntoResponse,
        routing::get,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use time::macros::datetime;
    use tokio::net::TcpListener;

    use super::*;

    async fn show(Path(file): Path<String>) -> impl IntoResponse {
        match file.as_str() {
            "42.json" => (StatusCode::OK, Json(json!({ "retweet_count": 2 }))),
            "7.json" => (StatusCode::OK, Json(json!({ "retweet_count": 0 }))),
            _ => (
                StatusCode::NOT_FOUND,
                Json(json!({ "errors": [{ "code": 144, "message": "No status found with that ID." }] })),
            ),
        }
    }

    async fn retweets(
        Path(file): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        if file != "42.json" {
            return (StatusCode::OK, Json(json!([])));
        }
        let count = params.get("count").cloned().unwrap_or_default();
        (
            StatusCode::OK,
            Json(json!([
                {
                    "id_str": "1001",
                    "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                    "user": { "screen_name": "alice", "followers_count": 10 }
                },
                {
                    "id_str": "1002",
                    "created_at": "Thu Oct 11 08:00:00 +0000 2018",
                    "user": { "screen_name": count, "followers_count": 5 }
                }
            ])),
        )
    }

    async fn spawn_provider() -> Url {
        let router = Router::new()
            .route("/1.1/statuses/show/{file}", get(show))
            .route("/1.1/statuses/retweets/{file}", get(retweets))
            .route(
                "/1.1/statuses/show-garbled/{file}",
                get(|| async { "not json" }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        Url::parse(&format!("http://{addr}/1.1/")).expect("url")
    }

    fn calculator(base: Url) -> ProviderCalculator {
        ProviderCalculator::with_client(Client::new(), base, 25)
    }

    #[test]
    fn parses_provider_dates() {
        let parsed = parse_provider_date("Wed Oct 10 20:19:24 +0000 2018").expect("date");
        assert_eq!(parsed, datetime!(2018-10-10 20:19:24 UTC));
        assert!(parse_provider_date("2018-10-10").is_err());
    }

    #[test]
    fn endpoint_encodes_the_identifier_as_one_segment() {
        let calc = calculator(Url::parse("https://provider.test/1.1/").expect("url"));
        let url = calc
            .endpoint("show", &PostId::new("a/b"))
            .expect("endpoint");
        assert_eq!(url.as_str(), "https://provider.test/1.1/statuses/show/a%2Fb.json");
    }

    #[test]
    fn full_page_is_flagged_as_possibly_truncated() {
        assert!(listing_may_be_truncated(100, 100));
        assert!(!listing_may_be_truncated(99, 100));
        assert!(!listing_may_be_truncated(0, 25));
    }

    #[tokio::test]
    async fn probe_reports_whether_post_was_shared() {
        let calc = calculator(spawn_provider().await);

        assert!(calc.has_any_shares(&PostId::new("42")).await.expect("probe"));
        assert!(!calc.has_any_shares(&PostId::new("7")).await.expect("probe"));
    }

    #[tokio::test]
    async fn provider_errors_carry_status_and_message() {
        let calc = calculator(spawn_provider().await);

        let err = calc
            .has_any_shares(&PostId::new("missing"))
            .await
            .expect_err("not found");
        assert_eq!(
            err,
            AggregationError::Provider {
                status: 404,
                message: "No status found with that ID.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn collect_maps_retweets_to_share_events() {
        let calc = calculator(spawn_provider().await);

        let shares = calc.collect(&PostId::new("42")).await.expect("collect");
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].id, "1001");
        assert_eq!(shares[0].author, "alice");
        assert_eq!(shares[0].author_followers, 10);
        assert_eq!(shares[0].shared_at, datetime!(2018-10-10 20:19:24 UTC));
        // The mock echoes the requested page size as the second author.
        assert_eq!(shares[1].author, "25");
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_decode_error() {
        let base = spawn_provider().await;
        let calc = calculator(base.clone());
        let url = base
            .join("statuses/show-garbled/1.json")
            .expect("url");

        let err = calc.fetch::<StatusPayload>(url).await.expect_err("garbled");
        assert!(matches!(err, AggregationError::Decode(_)));
    }
}
