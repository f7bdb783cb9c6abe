use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub position: String,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// `GET /teams` answers either a bare array or a paged envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TeamsWire {
    List(Vec<Team>),
    WithCount { teams: Vec<Team> },
}

impl TeamsWire {
    pub(crate) fn into_teams(self) -> Vec<Team> {
        match self {
            TeamsWire::List(teams) => teams,
            TeamsWire::WithCount { teams } => teams,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "D")]
    Direct,
    #[serde(rename = "G")]
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCategory {
    #[serde(default)]
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedChannelCategories {
    #[serde(default)]
    pub categories: Vec<ChannelCategory>,
    #[serde(default)]
    pub order: Vec<String>,
}

/// Channel membership row from `/users/me/teams/{id}/channels/members`,
/// used as the unread-count join source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadMessageCount {
    pub channel_id: String,
    #[serde(default)]
    pub mention_count: Option<u32>,
    #[serde(default)]
    pub msg_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Online,
    Away,
    Offline,
    Dnd,
}

impl StatusKind {
    pub const ALL: [StatusKind; 4] = [
        StatusKind::Online,
        StatusKind::Away,
        StatusKind::Offline,
        StatusKind::Dnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Online => "online",
            StatusKind::Away => "away",
            StatusKind::Offline => "offline",
            StatusKind::Dnd => "dnd",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatusKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(StatusKind::Online),
            "away" => Ok(StatusKind::Away),
            "offline" => Ok(StatusKind::Offline),
            "dnd" | "do-not-disturb" => Ok(StatusKind::Dnd),
            other => Err(format!(
                "unknown status {other:?}, expected one of online, away, offline, dnd"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub user_id: String,
    pub status: StatusKind,
    /// Epoch milliseconds.
    #[serde(default)]
    pub last_activity_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomStatusDuration {
    ThirtyMinutes,
    OneHour,
    FourHours,
    Today,
    ThisWeek,
    DateAndTime,
    DontClear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomStatus {
    pub emoji: String,
    pub text: String,
    pub duration: Option<CustomStatusDuration>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CustomStatusWire {
    pub(crate) emoji: String,
    pub(crate) text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) duration: Option<CustomStatusDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) expires_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetStatusWire<'a> {
    pub(crate) user_id: &'a str,
    pub(crate) status: StatusKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Direct,
    Group,
    Public,
    Private,
}

impl From<ChannelType> for ChannelKind {
    fn from(channel_type: ChannelType) -> Self {
        match channel_type {
            ChannelType::Open => ChannelKind::Public,
            ChannelType::Private => ChannelKind::Private,
            ChannelType::Direct => ChannelKind::Direct,
            ChannelType::Group => ChannelKind::Group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presence {
    pub kind: StatusKind,
    pub last_activity_at: DateTime<Utc>,
    /// Relative description of `last_activity_at`; absent while online.
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    pub id: String,
    pub kind: ChannelKind,
    pub title: String,
    pub subtitle: Option<String>,
    pub mention_name: String,
    pub email: Option<String>,
    pub keywords: BTreeSet<String>,
    pub mention_count: Option<u32>,
    pub presence: Option<Presence>,
    /// Channel path appended to the team in a deep link.
    pub path: String,
}

impl ChannelRecord {
    pub fn has_mentions(&self) -> bool {
        self.mention_count.is_some_and(|count| count > 0)
    }

    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .keywords
                .iter()
                .any(|keyword| keyword.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelGroup {
    pub name: String,
    pub channels: Vec<ChannelRecord>,
}

impl ChannelGroup {
    pub fn count(&self) -> usize {
        self.channels.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelView {
    pub unread: Option<ChannelGroup>,
    pub categories: Vec<ChannelGroup>,
}

impl ChannelView {
    /// Unread grouping first, then the declared categories.
    pub fn groups(&self) -> impl Iterator<Item = &ChannelGroup> {
        self.unread.iter().chain(self.categories.iter())
    }

    pub fn find(&self, query: &str) -> Option<&ChannelRecord> {
        self.categories
            .iter()
            .flat_map(|group| group.channels.iter())
            .find(|record| record.matches(query))
    }
}
