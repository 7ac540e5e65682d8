mod error;
mod handlers;
mod middleware;
mod models;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use models::{CalculateRequest, EngagementData, EngagementEnvelope, NO_RETWEET_MESSAGE};

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::application::engagement::EngagementService;

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub engagement: EngagementService,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(
            "/api/engagement",
            get(handlers::engagement_get).post(handlers::engagement_post),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
