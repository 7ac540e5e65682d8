use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::{engagement::EngagementResult, error::ErrorReport};

use super::{
    HttpState,
    error::ApiError,
    models::{CalculateRequest, EngagementEnvelope},
};

const MISSING_QUERY_HINT: &str = "Pass the status URL as `query`";

pub(super) async fn engagement_get(
    State(state): State<HttpState>,
    request: Result<Query<CalculateRequest>, QueryRejection>,
) -> Response {
    match request {
        Ok(Query(request)) => respond(&state, request).await,
        Err(rejection) => {
            ApiError::bad_request("Invalid query string", Some(rejection.body_text()))
                .into_response()
        }
    }
}

pub(super) async fn engagement_post(
    State(state): State<HttpState>,
    request: Result<Json<CalculateRequest>, JsonRejection>,
) -> Response {
    match request {
        Ok(Json(request)) => respond(&state, request).await,
        Err(rejection) => {
            ApiError::bad_request("Invalid request body", Some(rejection.body_text()))
                .into_response()
        }
    }
}

async fn respond(state: &HttpState, request: CalculateRequest) -> Response {
    let Some(query) = request.query.filter(|query| !query.trim().is_empty()) else {
        let hint = Some(MISSING_QUERY_HINT.to_string());
        return ApiError::bad_request("The query field is required", hint).into_response();
    };

    match state.engagement.calculate_engagement(query.trim()).await {
        EngagementResult::Served {
            id,
            total_reach,
            share_details,
        } => Json(EngagementEnvelope::served(id, total_reach, share_details)).into_response(),
        EngagementResult::NoEngagement { .. } => {
            Json(EngagementEnvelope::not_shared()).into_response()
        }
        EngagementResult::Failed(failure) => ApiError::from(&failure).into_response(),
    }
}

pub(super) async fn health(State(state): State<HttpState>) -> Response {
    match state.engagement.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error("infra::http::health", StatusCode::SERVICE_UNAVAILABLE, &err)
                .attach(&mut response);
            response
        }
    }
}
