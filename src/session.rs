//! Session/token lifecycle.
//!
//! The [`SessionManager`] is the only writer of the bearer token. It signs in,
//! persists the token, and coordinates refreshes so that any number of
//! requests discovering a 401 at the same time share one sign-in exchange.

use futures_util::future::{BoxFuture, FutureExt as _, Shared};
use reqwest::Method;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::{
    consts::{ERROR_BODY_MAX_CHARS, LOGIN_PATH, LOGIN_TOKEN_HEADER, TOKEN_STORE_KEY},
    core::{redact_token, truncate_message},
    diagnostics::DiagnosticsRecorder,
    error::AuthError,
    pipeline::Observed,
    settings::{AuthorizationMode, Credentials, Preferences},
    token_store::TokenStore,
    transport::{ApiRequest, HttpTransport},
};

type PendingRefresh = Shared<BoxFuture<'static, Result<String, AuthError>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    /// Bumped on every token change so callers can tell a stale 401 from a fresh one.
    pub generation: u64,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    authorization_mode: AuthorizationMode,
    credentials: String,
    transport: Observed<Arc<dyn HttpTransport>>,
    store: Arc<dyn TokenStore>,
    diagnostics: Arc<DiagnosticsRecorder>,
    state: RwLock<Session>,
    refresh: Mutex<Option<PendingRefresh>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session();
        formatter
            .debug_struct("SessionManager")
            .field("authorization_mode", &self.inner.authorization_mode)
            .field("token", &redact_token(&session.token))
            .field("generation", &session.generation)
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        preferences: &Preferences,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let diagnostics = Arc::new(DiagnosticsRecorder::default());
        Self {
            inner: Arc::new(SessionInner {
                authorization_mode: preferences.authorization_mode,
                credentials: preferences.credentials.clone(),
                transport: Observed::new(transport, Arc::clone(&diagnostics)),
                store,
                diagnostics,
                state: RwLock::new(Session::default()),
                refresh: Mutex::new(None),
            }),
        }
    }

    pub fn auth_mode(&self) -> AuthorizationMode {
        self.inner.authorization_mode
    }

    pub fn session(&self) -> Session {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_token(&self) -> String {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    pub(crate) fn diagnostics(&self) -> Arc<DiagnosticsRecorder> {
        Arc::clone(&self.inner.diagnostics)
    }

    /// Makes sure a token is live. Returns `true` when one was already
    /// available (live or cached in the token store) and no sign-in ran.
    pub async fn ensure_session(&self) -> Result<bool, AuthError> {
        let session = self.session();
        if !session.token.is_empty() {
            return Ok(true);
        }

        if let Some(token) = self.inner.store.get(TOKEN_STORE_KEY)? {
            tracing::debug!("ensure_session: using cached token {}", redact_token(&token));
            self.install_token(&token);
            return Ok(true);
        }

        tracing::debug!("ensure_session: no cached token, signing in");
        self.refresh_on_unauthorized(session.generation).await?;
        Ok(false)
    }

    /// Resolves credentials, obtains a fresh token, persists it and makes it
    /// live. A token that could not be persisted never becomes live.
    pub async fn sign_in(&self) -> Result<String, AuthError> {
        self.inner.diagnostics.record_sign_in();
        let credentials =
            Credentials::resolve(self.inner.authorization_mode, &self.inner.credentials)?;

        let token = match credentials {
            Credentials::StaticToken(token) => {
                tracing::debug!("sign_in: using configured static token");
                token
            }
            Credentials::Password { login_id, password } => {
                tracing::debug!("sign_in: exchanging credentials for {login_id}");
                self.exchange_credentials(&login_id, &password).await?
            }
        };

        self.inner.store.set(TOKEN_STORE_KEY, &token)?;
        self.install_token(&token);
        tracing::debug!("sign_in: token updated {}", redact_token(&token));
        Ok(token)
    }

    /// Single-flight refresh after a 401 observed while `observed_generation`
    /// was live.
    ///
    /// Callers arriving while a refresh is pending attach to it and receive
    /// its outcome. A caller whose generation is already outdated gets the
    /// current token without a new sign-in.
    pub async fn refresh_on_unauthorized(
        &self,
        observed_generation: u64,
    ) -> Result<String, AuthError> {
        let pending = {
            let mut slot = self
                .inner
                .refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pending) => {
                    tracing::debug!("refresh: joining in-flight sign-in");
                    self.inner.diagnostics.record_refresh_joined();
                    pending.clone()
                }
                None => {
                    let session = self.session();
                    if session.generation != observed_generation && !session.token.is_empty() {
                        tracing::debug!(
                            "refresh: token already replaced (generation {observed_generation} -> {})",
                            session.generation
                        );
                        return Ok(session.token);
                    }
                    tracing::debug!("refresh: starting sign-in");
                    let manager = self.clone();
                    let pending = async move { manager.sign_in().await }.boxed().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let outcome = pending.clone().await;

        {
            let mut slot = self
                .inner
                .refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot
                .as_ref()
                .is_some_and(|current| current.ptr_eq(&pending))
            {
                *slot = None;
            }
        }

        if let Err(error) = &outcome {
            tracing::warn!("refresh: sign-in failed: {error}");
        }
        outcome
    }

    fn install_token(&self, token: &str) {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        state.token = token.to_string();
        state.generation = state.generation.wrapping_add(1);
    }

    async fn exchange_credentials(
        &self,
        login_id: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        let body = json!({ "login_id": login_id, "password": password });
        let request = ApiRequest::new(Method::POST, LOGIN_PATH).with_body(body);
        let response = self
            .inner
            .transport
            .send(request)
            .await
            .map_err(|error| AuthError::Exchange {
                status: error.status(),
                cause: error.to_string(),
            })?;

        if !response.is_success() {
            return Err(AuthError::Exchange {
                status: Some(response.status),
                cause: truncate_message(&response.body, ERROR_BODY_MAX_CHARS),
            });
        }

        response
            .header(LOGIN_TOKEN_HEADER)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or(AuthError::MissingToken)
    }
}
