use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    consts::{DEEP_LINK_SCHEME, ENV_BASE_URL, ENV_CREDENTIALS},
    core::{restrict_file_permissions, write_file_atomic},
    error::{AuthError, SettingsError},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthorizationMode {
    #[default]
    Credentials,
    StaticToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Keyring,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub base_url: String,
    pub authorization_mode: AuthorizationMode,
    /// `username:password` in credentials mode, the personal access token otherwise.
    pub credentials: String,
    pub team_name: Option<String>,
    pub token_store: TokenStoreKind,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            authorization_mode: AuthorizationMode::default(),
            credentials: String::new(),
            team_name: None,
            token_store: TokenStoreKind::default(),
        }
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Preferences")
            .field("base_url", &self.base_url)
            .field("authorization_mode", &self.authorization_mode)
            .field("credentials", &"<redacted>")
            .field("team_name", &self.team_name)
            .field("token_store", &self.token_store)
            .finish()
    }
}

impl Preferences {
    pub fn team_filter(&self) -> Option<&str> {
        self.team_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn credentials(&self) -> Result<Credentials, AuthError> {
        Credentials::resolve(self.authorization_mode, &self.credentials)
    }

    /// Validates and normalizes the fields a session needs.
    pub fn validated(mut self) -> Result<Self, SettingsError> {
        self.base_url = normalize_base_url(&self.base_url)?;
        if self.credentials.trim().is_empty() {
            return Err(SettingsError::Missing("credentials"));
        }
        Ok(self)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            if !base_url.trim().is_empty() {
                tracing::debug!("settings: base_url overridden from {ENV_BASE_URL}");
                self.base_url = base_url;
            }
        }
        if let Ok(credentials) = std::env::var(ENV_CREDENTIALS) {
            if !credentials.trim().is_empty() {
                tracing::debug!("settings: credentials overridden from {ENV_CREDENTIALS}");
                self.credentials = credentials;
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    StaticToken(String),
    Password { login_id: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::StaticToken(_) => formatter.write_str("StaticToken(<redacted>)"),
            Credentials::Password { login_id, .. } => formatter
                .debug_struct("Password")
                .field("login_id", login_id)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl Credentials {
    pub fn resolve(mode: AuthorizationMode, raw: &str) -> Result<Self, AuthError> {
        match mode {
            AuthorizationMode::StaticToken => {
                let token = raw.trim();
                if token.is_empty() {
                    return Err(AuthError::MissingToken);
                }
                Ok(Credentials::StaticToken(token.to_string()))
            }
            AuthorizationMode::Credentials => {
                let (login_id, password) = parse_credentials(raw)?;
                Ok(Credentials::Password { login_id, password })
            }
        }
    }
}

/// Splits `username:password` at the first colon, so passwords may contain `:`.
pub fn parse_credentials(raw: &str) -> Result<(String, String), AuthError> {
    let (login_id, password) = raw
        .split_once(':')
        .ok_or(AuthError::InvalidCredentialsFormat)?;
    if login_id.is_empty() || password.is_empty() {
        return Err(AuthError::InvalidCredentialsFormat);
    }
    Ok((login_id.to_string(), password.to_string()))
}

pub fn read_settings(path: &Path) -> Result<Preferences, SettingsError> {
    if !path.exists() {
        tracing::debug!("read_settings: {path:?} not found, using defaults");
        return Ok(Preferences::default());
    }

    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str::<Preferences>(&content)?)
}

pub fn save_settings(path: &Path, preferences: &Preferences) -> Result<(), SettingsError> {
    let mut normalized = preferences.clone();
    normalized.base_url = normalize_base_url(&preferences.base_url)?;
    let content = serde_json::to_string_pretty(&normalized)?;
    write_file_atomic(path, &content)?;
    restrict_file_permissions(path);
    tracing::debug!("save_settings: written to {path:?}");
    Ok(())
}

pub fn normalize_base_url(input: &str) -> Result<String, SettingsError> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SettingsError::Missing("Server URL"));
    }

    let url = reqwest::Url::parse(trimmed)
        .map_err(|error| SettingsError::InvalidUrl(error.to_string()))?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(SettingsError::InvalidUrl(
            "Server URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// `https://chat.example.com` becomes `mattermost://chat.example.com`.
pub fn deep_link_base(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    format!("{DEEP_LINK_SCHEME}://{without_scheme}")
}
