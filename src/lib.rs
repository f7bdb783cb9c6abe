//! Mattermost launcher core: session lifecycle, authorized REST client and
//! the channel read-model built on top of it.

pub mod channels;
pub mod client;
pub mod consts;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod presence;
pub mod session;
pub mod settings;
pub mod teams;
pub mod token_store;
pub mod transport;

#[cfg(test)]
mod testing;

pub use channels::{assemble_channel_view, build_channel_view, deep_link, ChannelSources};
pub use client::MattermostClient;
pub use error::{ApiError, AuthError, SettingsError, StoreError, TeamSelectionError};
pub use session::{Session, SessionManager};
pub use settings::{AuthorizationMode, Credentials, Preferences, TokenStoreKind};
pub use teams::select_team;
pub use token_store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
