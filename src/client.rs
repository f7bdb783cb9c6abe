//! Authenticated Mattermost REST client.

use chrono::{Local, SecondsFormat};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

use crate::{
    consts::ERROR_BODY_MAX_CHARS,
    core::truncate_message,
    diagnostics::ClientDiagnostics,
    error::ApiError,
    model::{
        Channel, CustomStatus, CustomStatusWire, OrderedChannelCategories, SetStatusWire,
        StatusKind, Team, TeamsWire, UnreadMessageCount, UserProfile, UserStatus,
    },
    pipeline::{authorized_pipeline, AuthorizedPipeline},
    session::SessionManager,
    settings::Preferences,
    token_store::TokenStore,
    transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport},
};

pub struct MattermostClient {
    pipeline: AuthorizedPipeline,
    session: SessionManager,
}

impl std::fmt::Debug for MattermostClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MattermostClient")
            .field("session", &self.session)
            .finish()
    }
}

impl MattermostClient {
    pub fn new(
        preferences: &Preferences,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let session = SessionManager::new(preferences, Arc::clone(&transport), store);
        Self {
            pipeline: authorized_pipeline(transport, session.clone()),
            session,
        }
    }

    pub fn connect(
        preferences: &Preferences,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(&preferences.base_url)?;
        tracing::debug!("client: using {}", transport.api_base());
        Ok(Self::new(preferences, Arc::new(transport), store))
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn diagnostics(&self) -> ClientDiagnostics {
        self.session.diagnostics().snapshot()
    }

    /// Runs one logical request through the authorized pipeline; any non-2xx
    /// answer other than an exhausted 401 becomes [`ApiError::Backend`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        let response = self.pipeline.send(request).await?;
        if !response.is_success() {
            return Err(ApiError::Backend {
                status: Some(response.status),
                cause: truncate_message(&response.body, ERROR_BODY_MAX_CHARS),
            });
        }
        Ok(response)
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let response = self.request(method, path, body).await?;
        serde_json::from_str::<T>(&response.body).map_err(|error| ApiError::Decode {
            path: path.to_string(),
            cause: error.to_string(),
        })
    }

    pub async fn get_me(&self) -> Result<UserProfile, ApiError> {
        self.request_json(Method::GET, "/users/me", None).await
    }

    pub async fn get_teams(&self) -> Result<Vec<Team>, ApiError> {
        let teams: TeamsWire = self.request_json(Method::GET, "/teams", None).await?;
        Ok(teams.into_teams())
    }

    pub async fn get_my_channels(&self, team_id: &str) -> Result<Vec<Channel>, ApiError> {
        let path = format!("/users/me/teams/{team_id}/channels");
        self.request_json(Method::GET, &path, None).await
    }

    pub async fn get_channel_categories(
        &self,
        team_id: &str,
    ) -> Result<OrderedChannelCategories, ApiError> {
        let path = format!("/users/me/teams/{team_id}/channels/categories");
        self.request_json(Method::GET, &path, None).await
    }

    pub async fn get_unread_messages(
        &self,
        team_id: &str,
    ) -> Result<Vec<UnreadMessageCount>, ApiError> {
        let path = format!("/users/me/teams/{team_id}/channels/members");
        self.request_json(Method::GET, &path, None).await
    }

    pub async fn get_profiles_by_ids(&self, ids: &[String]) -> Result<Vec<UserProfile>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.request_json(Method::POST, "/users/ids", Some(json!(ids)))
            .await
    }

    pub async fn get_profile_status(&self) -> Result<UserStatus, ApiError> {
        self.request_json(Method::GET, "/users/me/status", None)
            .await
    }

    pub async fn get_profiles_status(&self, ids: &[String]) -> Result<Vec<UserStatus>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.request_json(Method::POST, "/users/status/ids", Some(json!(ids)))
            .await
    }

    pub async fn set_profile_status(
        &self,
        user_id: &str,
        status: StatusKind,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(SetStatusWire { user_id, status }).map_err(|error| {
            ApiError::Decode {
                path: "/users/me/status".to_string(),
                cause: error.to_string(),
            }
        })?;
        self.request(Method::PUT, "/users/me/status", Some(body))
            .await
            .map(|_| ())
    }

    pub async fn set_custom_status(&self, status: &CustomStatus) -> Result<(), ApiError> {
        let wire = CustomStatusWire {
            emoji: status.emoji.clone(),
            text: status.text.clone(),
            duration: status.duration,
            expires_at: status
                .resolved_expiry(Local::now())
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        };
        let body = serde_json::to_value(wire).map_err(|error| ApiError::Decode {
            path: "/users/me/status/custom".to_string(),
            cause: error.to_string(),
        })?;
        self.request(Method::PUT, "/users/me/status/custom", Some(body))
            .await
            .map(|_| ())
    }

    pub async fn clear_custom_status(&self) -> Result<(), ApiError> {
        self.request(Method::DELETE, "/users/me/status/custom", None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consts::TOKEN_STORE_KEY,
        error::AuthError,
        model::CustomStatusDuration,
        testing::{credentials_preferences, StubServer},
        token_store::MemoryTokenStore,
    };
    use futures_util::future::join_all;

    fn client_with_cached_token(server: &Arc<StubServer>, token: &str) -> MattermostClient {
        let store = Arc::new(MemoryTokenStore::with_entry(TOKEN_STORE_KEY, token));
        MattermostClient::new(&credentials_preferences(), server.clone(), store)
    }

    #[tokio::test]
    async fn attaches_bearer_token_to_api_calls() {
        let server = StubServer::new("fresh");
        server.accept_token("cached");
        server.route(
            Method::GET,
            "/users/me",
            200,
            json!({ "id": "u1", "username": "alice" }),
        );
        let client = client_with_cached_token(&server, "cached");
        client.session().ensure_session().await.expect("session");

        let me = client.get_me().await.expect("me");
        assert_eq!(me.username, "alice");

        let request = server.requests().pop().expect("request");
        assert_eq!(request.bearer.as_deref(), Some("cached"));
        assert_eq!(server.login_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_unauthorized_requests_share_one_sign_in() {
        let server = StubServer::new("fresh");
        server.accept_token("fresh");
        server.hold_unauthorized(5);
        server.delay_logins();
        server.route(Method::GET, "/teams", 200, json!([{ "id": "t1", "name": "core" }]));
        let client = client_with_cached_token(&server, "stale");
        client.session().ensure_session().await.expect("session");

        let outcomes = join_all((0..5).map(|_| client.get_teams())).await;

        assert_eq!(server.login_count(), 1);
        for outcome in outcomes {
            assert_eq!(outcome.expect("teams")[0].id, "t1");
        }
        let retried_with: Vec<_> = server
            .requests()
            .into_iter()
            .filter(|request| !request.is_login())
            .filter_map(|request| request.bearer)
            .collect();
        assert_eq!(retried_with.iter().filter(|t| *t == "stale").count(), 5);
        assert_eq!(retried_with.iter().filter(|t| *t == "fresh").count(), 5);
        assert_eq!(client.diagnostics().sign_ins, 1);
    }

    #[tokio::test]
    async fn persistent_unauthorized_stops_after_three_attempts() {
        let server = StubServer::new("fresh");
        server.reject_all_requests();
        let client = client_with_cached_token(&server, "cached");
        client.session().ensure_session().await.expect("session");

        let result = client.get_me().await;

        assert_eq!(
            result,
            Err(ApiError::MaxRetriesExceeded {
                path: "/users/me".to_string()
            })
        );
        let attempts = server
            .requests()
            .iter()
            .filter(|request| request.path == "/users/me")
            .count();
        assert_eq!(attempts, 3);
        assert_eq!(server.login_count(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_auth_error() {
        let server = StubServer::new("fresh");
        server.reject_logins();
        let client = client_with_cached_token(&server, "stale");
        client.session().ensure_session().await.expect("session");

        match client.get_me().await {
            Err(ApiError::Auth(AuthError::Exchange { status, .. })) => {
                assert_eq!(status, Some(401))
            }
            other => panic!("expected auth failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_failures_are_surfaced_unmodified() {
        let server = StubServer::new("fresh");
        server.accept_token("cached");
        server.route(
            Method::GET,
            "/users/me/status",
            500,
            json!({ "message": "database down" }),
        );
        let client = client_with_cached_token(&server, "cached");
        client.session().ensure_session().await.expect("session");

        match client.get_profile_status().await {
            Err(ApiError::Backend { status, cause }) => {
                assert_eq!(status, Some(500));
                assert!(cause.contains("database down"));
            }
            other => panic!("expected backend error, got {other:?}"),
        }
        assert_eq!(server.login_count(), 0);
    }

    #[tokio::test]
    async fn network_errors_have_no_status() {
        let server = StubServer::new("fresh");
        server.accept_token("cached");
        server.fail_path("/teams");
        let client = client_with_cached_token(&server, "cached");
        client.session().ensure_session().await.expect("session");

        let error = client.get_teams().await.expect_err("network failure");
        assert_eq!(error.status(), None);
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let server = StubServer::new("fresh");
        server.accept_token("cached");
        server.route(Method::GET, "/users/me", 200, json!("not a profile"));
        let client = client_with_cached_token(&server, "cached");
        client.session().ensure_session().await.expect("session");

        assert!(matches!(
            client.get_me().await,
            Err(ApiError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn status_updates_send_expected_bodies() {
        let server = StubServer::new("fresh");
        server.accept_token("cached");
        server.route(Method::PUT, "/users/me/status", 200, json!({}));
        server.route(Method::PUT, "/users/me/status/custom", 200, json!({}));
        server.route(Method::DELETE, "/users/me/status/custom", 200, json!({}));
        let client = client_with_cached_token(&server, "cached");
        client.session().ensure_session().await.expect("session");

        client
            .set_profile_status("u1", StatusKind::Dnd)
            .await
            .expect("set status");
        client
            .set_custom_status(&CustomStatus {
                emoji: "palm_tree".to_string(),
                text: "Vacation".to_string(),
                duration: Some(CustomStatusDuration::DontClear),
                expires_at: None,
            })
            .await
            .expect("custom status");
        client.clear_custom_status().await.expect("clear");

        let requests = server.requests();
        assert_eq!(
            requests[0].body,
            Some(json!({ "user_id": "u1", "status": "dnd" }))
        );
        assert_eq!(
            requests[1].body,
            Some(json!({ "emoji": "palm_tree", "text": "Vacation", "duration": "dont_clear" }))
        );
        assert_eq!(requests[2].method, Method::DELETE);
    }

    #[tokio::test]
    async fn empty_id_batches_skip_the_network() {
        let server = StubServer::new("fresh");
        let client = client_with_cached_token(&server, "cached");

        assert!(client.get_profiles_by_ids(&[]).await.expect("profiles").is_empty());
        assert!(client.get_profiles_status(&[]).await.expect("statuses").is_empty());
        assert!(server.requests().is_empty());
    }
}
