use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use murmur_api_types::{
    CreateTweetRequest, FeedPageQuery, ToggleFollowResponse, ToggleLikeResponse, VIEWER_HEADER,
};

use crate::application::pagination::PageRequest;
use crate::domain::types::{TweetId, UserId};
use crate::infra::wire;

use super::DevServerState;
use super::error::ApiError;

const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Viewer named by the request header, if any.
fn viewer(headers: &HeaderMap) -> Result<Option<UserId>, ApiError> {
    match headers.get(VIEWER_HEADER) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| ApiError::bad_request("Invalid viewer header", None))?
                .trim();
            Ok((!raw.is_empty()).then(|| UserId::from(raw)))
        }
    }
}

fn require_viewer(headers: &HeaderMap) -> Result<UserId, ApiError> {
    viewer(headers)?.ok_or_else(ApiError::unauthorized)
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn feed_page(
    State(state): State<DevServerState>,
    headers: HeaderMap,
    Query(query): Query<FeedPageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer(&headers)?;
    let identity = wire::identity_from_query(&query)?;
    let request = PageRequest::new(query.limit.unwrap_or(DEFAULT_PAGE_LIMIT), query.cursor);

    let page = state
        .backend
        .fetch_page(viewer.as_ref(), &identity, request)
        .await?;
    Ok(Json(wire::page_to_response(&page)))
}

pub async fn create_tweet(
    State(state): State<DevServerState>,
    headers: HeaderMap,
    Json(body): Json<CreateTweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = require_viewer(&headers)?;
    let tweet = state.backend.create_tweet(&viewer, &body.content).await?;
    Ok((StatusCode::CREATED, Json(wire::tweet_to_dto(&tweet))))
}

pub async fn toggle_like(
    State(state): State<DevServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = require_viewer(&headers)?;
    let outcome = state
        .backend
        .toggle_like(&viewer, &TweetId::new(id))
        .await?;
    Ok(Json(ToggleLikeResponse {
        added_like: outcome.added_like,
    }))
}

pub async fn toggle_follow(
    State(state): State<DevServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = require_viewer(&headers)?;
    let outcome = state
        .backend
        .toggle_follow(&viewer, &UserId::new(id))
        .await?;
    Ok(Json(ToggleFollowResponse {
        added_follow: outcome.added_follow,
    }))
}

pub async fn profile(
    State(state): State<DevServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer(&headers)?;
    let profile = state
        .backend
        .profile(viewer.as_ref(), &UserId::new(id))
        .await?;
    Ok(Json(wire::profile_to_response(&profile)))
}
