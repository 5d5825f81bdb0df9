//! `FeedBackend` over JSON/HTTP, talking to the development server or any
//! server speaking the same contract.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderValue;
use murmur_api_types::{
    ApiErrorBody, CreateTweetRequest, FeedPageResponse, ProfileResponse, ToggleFollowResponse,
    ToggleLikeResponse, TweetDto, VIEWER_HEADER, codes,
};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::backend::{BackendError, FeedBackend, FollowOutcome, LikeOutcome};
use crate::application::pagination::{Page, PageRequest, PaginationError};
use crate::cache::FeedIdentity;
use crate::domain::entities::{Profile, Tweet};
use crate::domain::types::{TweetId, UserId};
use crate::infra::error::InfraError;

use super::wire;

#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    viewer: Option<HeaderValue>,
}

impl HttpBackend {
    pub fn new(base: &Url, timeout: Duration, viewer: Option<&UserId>) -> Result<Self, InfraError> {
        let base = base
            .join("/")
            .map_err(|err| InfraError::configuration(format!("invalid backend url: {err}")))?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;
        let viewer = viewer
            .map(|id| HeaderValue::from_str(id.as_str()))
            .transpose()
            .map_err(|err| InfraError::configuration(format!("invalid viewer id: {err}")))?;
        Ok(Self {
            client,
            base,
            viewer,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("murmur/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, BackendError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| BackendError::Protocol(format!("invalid path `{path}`: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, query)?;
        debug!(%method, %url, "Backend request");

        let mut request = self.client.request(method, url);
        if let Some(viewer) = &self.viewer {
            request = request.header(VIEWER_HEADER, viewer.clone());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        Self::handle(response).await
    }

    async fn handle<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| BackendError::Protocol(format!("failed to parse body: {err}")))
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

fn status_error(status: StatusCode, body: &[u8]) -> BackendError {
    let error = serde_json::from_slice::<ApiErrorBody>(body).ok().map(|body| body.error);
    let detail = error
        .as_ref()
        .map(|error| error.hint.clone().unwrap_or_else(|| error.message.clone()))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    let code = error.as_ref().map(|error| error.code.as_str());

    match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound,
        StatusCode::SERVICE_UNAVAILABLE => BackendError::Unavailable(detail),
        StatusCode::BAD_REQUEST if code == Some(codes::INVALID_CURSOR) => {
            BackendError::Pagination(PaginationError::InvalidCursor(detail))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::invalid_input(detail)
        }
        _ => BackendError::Protocol(format!("status {status}: {detail}")),
    }
}

#[async_trait]
impl FeedBackend for HttpBackend {
    async fn fetch_feed_page(
        &self,
        identity: &FeedIdentity,
        request: PageRequest,
    ) -> Result<Page, BackendError> {
        let query = wire::identity_to_query(identity, request.cursor, request.limit);
        let mut pairs = vec![("scope", scope_param(&query.scope))];
        if let Some(user_id) = query.user_id {
            pairs.push(("userId", user_id));
        }
        if let Some(cursor) = query.cursor {
            pairs.push(("cursor", cursor));
        }
        if let Some(limit) = query.limit {
            pairs.push(("limit", limit.to_string()));
        }

        let response: FeedPageResponse = self
            .request::<(), _>(Method::GET, murmur_api_types::FEED_PATH, &pairs, None)
            .await?;
        Ok(wire::page_from_response(response))
    }

    async fn toggle_like(&self, tweet_id: &TweetId) -> Result<LikeOutcome, BackendError> {
        let path = murmur_api_types::like_path(tweet_id.as_str());
        let response: ToggleLikeResponse =
            self.request::<(), _>(Method::POST, &path, &[], None).await?;
        Ok(LikeOutcome {
            added_like: response.added_like,
        })
    }

    async fn toggle_follow(&self, user_id: &UserId) -> Result<FollowOutcome, BackendError> {
        let path = murmur_api_types::follow_path(user_id.as_str());
        let response: ToggleFollowResponse =
            self.request::<(), _>(Method::POST, &path, &[], None).await?;
        Ok(FollowOutcome {
            added_follow: response.added_follow,
        })
    }

    async fn create_tweet(&self, content: &str) -> Result<Tweet, BackendError> {
        let body = CreateTweetRequest {
            content: content.to_string(),
        };
        let response: TweetDto = self
            .request(Method::POST, murmur_api_types::TWEETS_PATH, &[], Some(&body))
            .await?;
        Ok(wire::tweet_from_dto(response))
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        let path = murmur_api_types::profile_path(user_id.as_str());
        let response: ProfileResponse =
            self.request::<(), _>(Method::GET, &path, &[], None).await?;
        Ok(wire::profile_from_response(response))
    }
}

fn scope_param(scope: &murmur_api_types::FeedScopeParam) -> String {
    match scope {
        murmur_api_types::FeedScopeParam::All => "all",
        murmur_api_types::FeedScopeParam::Following => "following",
        murmur_api_types::FeedScopeParam::Profile => "profile",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_map_to_backend_errors() {
        let body = br#"{"error":{"code":"invalid_cursor","message":"Invalid cursor","hint":"bad base64"}}"#;
        assert_eq!(
            status_error(StatusCode::BAD_REQUEST, body),
            BackendError::Pagination(PaginationError::InvalidCursor("bad base64".to_string()))
        );

        let body = br#"{"error":{"code":"invalid_input","message":"Invalid input"}}"#;
        assert_eq!(
            status_error(StatusCode::BAD_REQUEST, body),
            BackendError::invalid_input("Invalid input")
        );

        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, b""),
            BackendError::Unauthorized
        );
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, b"down").is_transient());
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, b"boom"),
            BackendError::Protocol(_)
        ));
    }

    #[test]
    fn backend_url_is_rooted() {
        let base = Url::parse("http://127.0.0.1:3400/some/path").expect("url");
        let backend = HttpBackend::new(&base, Duration::from_secs(1), Some(&UserId::from("u1")))
            .expect("backend");
        let url = backend
            .url("/api/feed", &[("scope", "all".to_string())])
            .expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:3400/api/feed?scope=all");
    }
}
