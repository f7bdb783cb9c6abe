use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, PoisonError,
};

use crate::{
    consts::LOG_BODY_MAX_CHARS,
    core::{redact_token, truncate_message},
    transport::{ApiRequest, ApiResponse},
};

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ClientDiagnostics {
    pub requests_sent: u64,
    pub unauthorized_responses: u64,
    pub retries: u64,
    pub sign_ins: u64,
    pub refreshes_joined: u64,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
}

/// Counters shared by the session manager and the request pipeline.
#[derive(Debug, Default)]
pub struct DiagnosticsRecorder {
    requests_sent: AtomicU64,
    unauthorized_responses: AtomicU64,
    retries: AtomicU64,
    sign_ins: AtomicU64,
    refreshes_joined: AtomicU64,
    last: Mutex<LastOutcome>,
}

#[derive(Debug, Default)]
struct LastOutcome {
    status: Option<u16>,
    error: Option<String>,
}

impl DiagnosticsRecorder {
    pub fn snapshot(&self) -> ClientDiagnostics {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        ClientDiagnostics {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            unauthorized_responses: self.unauthorized_responses.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            sign_ins: self.sign_ins.load(Ordering::Relaxed),
            refreshes_joined: self.refreshes_joined.load(Ordering::Relaxed),
            last_status: last.status,
            last_error: last.error.clone(),
        }
    }

    pub(crate) fn observe_request(&self, request: &ApiRequest) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "{} {} bearer={}",
            request.method,
            request.path,
            request
                .bearer
                .as_deref()
                .map(redact_token)
                .unwrap_or_else(|| "none".to_string())
        );
    }

    pub(crate) fn observe_response(&self, request: &ApiRequest, response: &ApiResponse) {
        if response.status == 401 {
            self.unauthorized_responses.fetch_add(1, Ordering::Relaxed);
        }
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        last.status = Some(response.status);
        drop(last);
        tracing::debug!(
            "{} {} -> HTTP {} body={}",
            request.method,
            request.path,
            response.status,
            truncate_message(&response.body, LOG_BODY_MAX_CHARS)
        );
    }

    pub(crate) fn observe_error(&self, request: &ApiRequest, error: &str) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        last.error = Some(truncate_message(error, 300));
        drop(last);
        tracing::debug!("{} {} failed: {error}", request.method, request.path);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sign_in(&self) {
        self.sign_ins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh_joined(&self) {
        self.refreshes_joined.fetch_add(1, Ordering::Relaxed);
    }
}
