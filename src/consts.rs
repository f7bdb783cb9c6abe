pub const API_PREFIX: &str = "/api/v4";
pub const LOGIN_PATH: &str = "/users/login";
pub const LOGIN_TOKEN_HEADER: &str = "token";

pub const TOKEN_STORE_KEY: &str = "mattermost-token";
pub const KEYRING_SERVICE: &str = "net.mattermost.launcher";

pub const MAX_RETRY_ATTEMPTS: u32 = 3;
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const ERROR_BODY_MAX_CHARS: usize = 200;
pub const LOG_BODY_MAX_CHARS: usize = 140;

pub const DIRECT_CHANNEL_SEPARATOR: &str = "__";
pub const UNREAD_GROUP_NAME: &str = "Unread Messages";
pub const DEEP_LINK_SCHEME: &str = "mattermost";

pub const SETTINGS_DIR_NAME: &str = "mattermost-launcher";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const TOKEN_FILE_NAME: &str = "token.json";

pub const ENV_BASE_URL: &str = "MATTERMOST_BASE_URL";
pub const ENV_CREDENTIALS: &str = "MATTERMOST_CREDENTIALS";
