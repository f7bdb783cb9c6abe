//! Request pipeline stages layered around an [`HttpTransport`].
//!
//! The authorized pipeline is, outermost first:
//! [`UnauthorizedRetry`] → [`BearerAuth`] → [`Observed`] → transport.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    consts::MAX_RETRY_ATTEMPTS,
    diagnostics::DiagnosticsRecorder,
    error::ApiError,
    session::SessionManager,
    transport::{ApiRequest, ApiResponse, HttpTransport},
};

pub type AuthorizedPipeline = UnauthorizedRetry<BearerAuth<Observed<Arc<dyn HttpTransport>>>>;

pub fn authorized_pipeline(
    transport: Arc<dyn HttpTransport>,
    session: SessionManager,
) -> AuthorizedPipeline {
    let observed = Observed::new(transport, session.diagnostics());
    let authorized = BearerAuth::new(observed, session.clone());
    UnauthorizedRetry::new(authorized, session)
}

/// Records every exchange in the diagnostics counters and the debug log.
pub struct Observed<T> {
    inner: T,
    diagnostics: Arc<DiagnosticsRecorder>,
}

impl<T> Observed<T> {
    pub fn new(inner: T, diagnostics: Arc<DiagnosticsRecorder>) -> Self {
        Self { inner, diagnostics }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for Observed<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.diagnostics.observe_request(&request);
        let logged = ApiRequest {
            body: None,
            bearer: None,
            ..request.clone()
        };
        match self.inner.send(request).await {
            Ok(response) => {
                self.diagnostics.observe_response(&logged, &response);
                Ok(response)
            }
            Err(error) => {
                self.diagnostics.observe_error(&logged, &error.to_string());
                Err(error)
            }
        }
    }
}

/// Attaches the session's current bearer token, except on the login exchange.
pub struct BearerAuth<T> {
    inner: T,
    session: SessionManager,
}

impl<T> BearerAuth<T> {
    pub fn new(inner: T, session: SessionManager) -> Self {
        Self { inner, session }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for BearerAuth<T> {
    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if request.is_login() {
            request.bearer = None;
        } else if request.bearer.is_none() {
            request.bearer = Some(self.session.current_token());
        }
        self.inner.send(request).await
    }
}

/// Re-issues a request after a 401 once the session has refreshed its token.
///
/// The attempt counter belongs to one logical request; after
/// `max_attempts` unauthorized answers the request fails with
/// [`ApiError::MaxRetriesExceeded`].
pub struct UnauthorizedRetry<T> {
    inner: T,
    session: SessionManager,
    max_attempts: u32,
}

impl<T> UnauthorizedRetry<T> {
    pub fn new(inner: T, session: SessionManager) -> Self {
        Self {
            inner,
            session,
            max_attempts: MAX_RETRY_ATTEMPTS,
        }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for UnauthorizedRetry<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if request.is_login() {
            return self.inner.send(request).await;
        }

        let diagnostics = self.session.diagnostics();
        let mut attempt: u32 = 1;
        loop {
            // Read right before sending so it matches the token BearerAuth attaches.
            let generation = self.session.generation();
            let response = self.inner.send(request.clone()).await?;
            if !response.is_unauthorized() {
                return Ok(response);
            }

            if attempt >= self.max_attempts {
                tracing::warn!(
                    "{} {}: still unauthorized after {attempt} attempts",
                    request.method,
                    request.path
                );
                return Err(ApiError::MaxRetriesExceeded {
                    path: request.path.clone(),
                });
            }

            tracing::debug!(
                "{} {}: unauthorized on attempt {attempt}, refreshing session",
                request.method,
                request.path
            );
            self.session.refresh_on_unauthorized(generation).await?;
            diagnostics.record_retry();
            attempt += 1;
        }
    }
}
