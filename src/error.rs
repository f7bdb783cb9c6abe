use thiserror::Error;

/// Failures of the sign-in exchange and the token lifecycle around it.
/// One refresh outcome is cloned out to every caller attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials format, expected \"username:password\"")]
    InvalidCredentialsFormat,
    #[error("no token received from server")]
    MissingToken,
    #[error("sign-in request failed{}: {cause}", status_suffix(.status))]
    Exchange { status: Option<u16>, cause: String },
    #[error("token store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("max retry attempts reached for {path}")]
    MaxRetriesExceeded { path: String },
    #[error("request failed{}: {cause}", status_suffix(.status))]
    Backend { status: Option<u16>, cause: String },
    #[error("failed to decode response from {path}: {cause}")]
    Decode { path: String, cause: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => *status,
            ApiError::Auth(AuthError::Exchange { status, .. }) => *status,
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        AuthError::Store(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeamSelectionError {
    #[error("you are not on any team")]
    NoTeams,
    #[error("you are on multiple teams, specify a team name. Available teams: {}", .available.join(", "))]
    TeamFilterRequired { available: Vec<String> },
    #[error("team with name {name} not found. Available teams: {}", .available.join(", "))]
    TeamNotFound { name: String, available: Vec<String> },
}

fn status_suffix(status: &Option<u16>) -> String {
    (*status)
        .map(|code| format!(" (HTTP {code})"))
        .unwrap_or_default()
}
