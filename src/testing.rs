//! In-process Mattermost stand-in for unit tests.

use async_trait::async_trait;
use reqwest::Method;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::sync::Barrier;

use crate::{
    consts::LOGIN_TOKEN_HEADER,
    error::ApiError,
    settings::{AuthorizationMode, Preferences},
    transport::{ApiRequest, ApiResponse, HttpTransport},
};

pub(crate) fn credentials_preferences() -> Preferences {
    Preferences {
        base_url: "https://chat.example.com".to_string(),
        authorization_mode: AuthorizationMode::Credentials,
        credentials: "alice:secret".to_string(),
        ..Preferences::default()
    }
}

#[derive(Default)]
struct StubState {
    requests: Vec<ApiRequest>,
    accepted: BTreeSet<String>,
    routes: HashMap<(Method, String), (u16, String)>,
    failing_paths: BTreeSet<String>,
    held: Option<(Arc<Barrier>, usize)>,
}

/// Answers `/users/login` with tokens from a fixed list and every other path
/// from registered routes, rejecting bearers it never issued or accepted.
#[derive(Default)]
pub(crate) struct StubServer {
    tokens: Vec<String>,
    logins: AtomicUsize,
    omit_login_token: AtomicBool,
    reject_logins: AtomicBool,
    delay_logins: AtomicBool,
    reject_all_requests: AtomicBool,
    state: Mutex<StubState>,
}

impl StubServer {
    pub(crate) fn new(token: &str) -> Arc<Self> {
        Self::with_tokens(&[token])
    }

    /// Logins hand out `tokens` in order, repeating the last one.
    pub(crate) fn with_tokens(tokens: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tokens: tokens.iter().map(|token| token.to_string()).collect(),
            ..Self::default()
        })
    }

    pub(crate) fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub(crate) fn omit_login_token(&self) {
        self.omit_login_token.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reject_logins(&self) {
        self.reject_logins.store(true, Ordering::SeqCst);
    }

    pub(crate) fn delay_logins(&self) {
        self.delay_logins.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reject_all_requests(&self) {
        self.reject_all_requests.store(true, Ordering::SeqCst);
    }

    pub(crate) fn accept_token(&self, token: &str) {
        self.lock().accepted.insert(token.to_string());
    }

    pub(crate) fn route(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
        self.lock()
            .routes
            .insert((method, path.to_string()), (status, body.to_string()));
    }

    pub(crate) fn fail_path(&self, path: &str) {
        self.lock().failing_paths.insert(path.to_string());
    }

    /// The first `count` unauthorized answers wait until all of them arrived.
    pub(crate) fn hold_unauthorized(&self, count: usize) {
        self.lock().held = Some((Arc::new(Barrier::new(count)), count));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn login(&self) -> ApiResponse {
        let index = self.logins.fetch_add(1, Ordering::SeqCst);
        if self.delay_logins.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        if self.reject_logins.load(Ordering::SeqCst) {
            return ApiResponse::new(401, r#"{"message":"invalid credentials"}"#);
        }

        let token = self
            .tokens
            .get(index)
            .or(self.tokens.last())
            .cloned()
            .unwrap_or_default();
        let response = ApiResponse::new(200, r#"{"id":"u1","username":"alice"}"#);
        if self.omit_login_token.load(Ordering::SeqCst) {
            return response;
        }
        let mut state = self.lock();
        state.accepted.insert(token.clone());
        response.with_header(LOGIN_TOKEN_HEADER, token)
    }

    async fn unauthorized(&self) -> ApiResponse {
        let barrier = {
            let mut state = self.lock();
            match state.held.as_mut() {
                Some((barrier, remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(Arc::clone(barrier))
                }
                _ => None,
            }
        };
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        ApiResponse::new(401, r#"{"message":"session expired"}"#)
    }
}

#[async_trait]
impl HttpTransport for StubServer {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.lock().requests.push(request.clone());
        if request.is_login() {
            return Ok(self.login().await);
        }

        let (authorized, failing, route) = {
            let state = self.lock();
            let authorized = !self.reject_all_requests.load(Ordering::SeqCst)
                && request
                    .bearer
                    .as_ref()
                    .is_some_and(|token| state.accepted.contains(token));
            let route = state
                .routes
                .get(&(request.method.clone(), request.path.clone()))
                .cloned();
            (authorized, state.failing_paths.contains(&request.path), route)
        };

        if failing {
            return Err(ApiError::Backend {
                status: None,
                cause: format!("{} {} failed: connection reset", request.method, request.path),
            });
        }
        if !authorized {
            return Ok(self.unauthorized().await);
        }
        Ok(match route {
            Some((status, body)) => ApiResponse::new(status, body),
            None => ApiResponse::new(404, r#"{"message":"not found"}"#),
        })
    }
}
