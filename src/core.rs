#[cfg(unix)]
use std::os::unix::fs::PermissionsExt as _;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::consts::{SETTINGS_DIR_NAME, SETTINGS_FILE_NAME, TOKEN_FILE_NAME};

/// Monotonic counter for generating unique temp file suffixes.
static FILE_SUFFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR_NAME))
}

pub fn default_settings_file() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join(SETTINGS_FILE_NAME))
}

/// Token file lives next to the settings file it belongs to.
pub fn token_file_beside(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .map(|dir| dir.join(TOKEN_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(TOKEN_FILE_NAME))
}

pub fn restrict_file_permissions(path: &Path) {
    #[cfg(unix)]
    {
        if !path.exists() {
            return;
        }
        if let Err(error) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            tracing::debug!("restrict_file_permissions: failed for {path:?}: {error}");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Writes `content` to a sibling temp file and renames it over `path`.
pub fn write_file_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", unique_time_suffix()));
    fs::write(&temp_path, content)?;
    restrict_file_permissions(&temp_path);
    if let Err(error) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(error);
    }
    Ok(())
}

pub fn truncate_message(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Keeps enough of a token to correlate log lines without leaking it.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    let prefix: String = trimmed.chars().take(4).collect();
    format!("{prefix}***(len={})", trimmed.len())
}

pub fn unique_time_suffix() -> u64 {
    let counter = FILE_SUFFIX_COUNTER.fetch_add(1, Ordering::Relaxed);
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    millis.wrapping_mul(1000).wrapping_add(counter % 1000)
}
