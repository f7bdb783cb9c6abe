//! Channel read-model: joins categories, memberships, unread counts, peer
//! profiles and presence into one display-ready [`ChannelView`].

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    client::MattermostClient,
    consts::{DIRECT_CHANNEL_SEPARATOR, UNREAD_GROUP_NAME},
    error::ApiError,
    model::{
        Channel, ChannelGroup, ChannelKind, ChannelRecord, ChannelType, ChannelView,
        OrderedChannelCategories, Presence, StatusKind, UnreadMessageCount, UserProfile,
        UserStatus,
    },
    presence::{describe_last_activity, timestamp_from_millis},
    settings::deep_link_base,
};

/// Everything the read-model is assembled from.
#[derive(Debug, Clone, Default)]
pub struct ChannelSources {
    pub categories: OrderedChannelCategories,
    pub channels: Vec<Channel>,
    pub unread: Vec<UnreadMessageCount>,
    pub profiles: Vec<UserProfile>,
    pub statuses: Vec<UserStatus>,
}

/// The other member of a direct chat named `<id>__<id>`, or the caller for a
/// chat with themself.
pub fn peer_user_id(composite_name: &str, caller_id: &str) -> String {
    composite_name
        .split(DIRECT_CHANNEL_SEPARATOR)
        .find(|member_id| *member_id != caller_id)
        .unwrap_or(caller_id)
        .to_string()
}

/// Distinct peer ids of the direct chats in `channels`, in first-seen order.
pub fn direct_peer_ids(channels: &[Channel], caller_id: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    channels
        .iter()
        .filter(|channel| channel.channel_type == ChannelType::Direct)
        .map(|channel| peer_user_id(&channel.name, caller_id))
        .filter(|peer_id| seen.insert(peer_id.clone()))
        .collect()
}

pub async fn build_channel_view(
    client: &MattermostClient,
    team_id: &str,
    caller_user_id: &str,
) -> Result<ChannelView, ApiError> {
    let (categories, channels, unread) = tokio::try_join!(
        client.get_channel_categories(team_id),
        client.get_my_channels(team_id),
        client.get_unread_messages(team_id),
    )?;

    let peer_ids = direct_peer_ids(&channels, caller_user_id);
    let (profiles, statuses) = if peer_ids.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        tokio::try_join!(
            client.get_profiles_by_ids(&peer_ids),
            client.get_profiles_status(&peer_ids),
        )?
    };

    tracing::debug!(
        "channels: team {team_id}: {} channels, {} categories, {} direct peers",
        channels.len(),
        categories.categories.len(),
        peer_ids.len()
    );

    let sources = ChannelSources {
        categories,
        channels,
        unread,
        profiles,
        statuses,
    };
    Ok(assemble_channel_view(sources, caller_user_id, Utc::now()))
}

pub fn assemble_channel_view(
    sources: ChannelSources,
    caller_user_id: &str,
    now: DateTime<Utc>,
) -> ChannelView {
    let ChannelSources {
        categories,
        channels,
        unread,
        profiles,
        statuses,
    } = sources;

    let mention_counts: HashMap<String, Option<u32>> = unread
        .into_iter()
        .map(|entry| (entry.channel_id, entry.mention_count))
        .collect();
    let profiles: HashMap<&str, &UserProfile> = profiles
        .iter()
        .map(|profile| (profile.id.as_str(), profile))
        .collect();
    let statuses: HashMap<&str, &UserStatus> = statuses
        .iter()
        .map(|status| (status.user_id.as_str(), status))
        .collect();

    let mut records: HashMap<String, ChannelRecord> = HashMap::new();
    for channel in &channels {
        let mut record = if channel.channel_type == ChannelType::Direct {
            let peer_id = peer_user_id(&channel.name, caller_user_id);
            let Some(profile) = profiles.get(peer_id.as_str()) else {
                tracing::debug!("channels: no profile for direct chat {}", channel.id);
                continue;
            };
            let mut record = direct_record(channel, profile);
            record.presence = statuses
                .get(peer_id.as_str())
                .map(|status| presence_of(status, now));
            record
        } else {
            channel_record(channel)
        };
        record.mention_count = mention_counts.get(&channel.id).copied().flatten();
        records.insert(channel.id.clone(), record);
    }

    let categories: Vec<ChannelGroup> = categories
        .categories
        .into_iter()
        .map(|category| ChannelGroup {
            name: category.display_name,
            channels: category
                .channel_ids
                .iter()
                .filter_map(|channel_id| records.get(channel_id).cloned())
                .collect(),
        })
        .collect();

    ChannelView {
        unread: unread_group(&categories),
        categories,
    }
}

/// `mattermost://<host>/<team><path>` for a record.
pub fn deep_link(base_url: &str, team_name: &str, record: &ChannelRecord) -> String {
    format!("{}/{team_name}{}", deep_link_base(base_url), record.path)
}

fn unread_group(categories: &[ChannelGroup]) -> Option<ChannelGroup> {
    let mut seen = HashSet::new();
    let channels: Vec<ChannelRecord> = categories
        .iter()
        .flat_map(|group| group.channels.iter())
        .filter(|record| record.has_mentions())
        .filter(|record| seen.insert(record.id.clone()))
        .cloned()
        .collect();

    (!channels.is_empty()).then(|| ChannelGroup {
        name: UNREAD_GROUP_NAME.to_string(),
        channels,
    })
}

fn direct_record(channel: &Channel, profile: &UserProfile) -> ChannelRecord {
    let full_name = profile.full_name();
    let title = if full_name.is_empty() {
        profile.username.clone()
    } else {
        full_name
    };
    let handle = format!("@{}", profile.username);

    let keywords = [
        profile.first_name.as_str(),
        profile.last_name.as_str(),
        profile.username.as_str(),
        profile.email.as_str(),
        profile.nickname.as_str(),
        profile.position.as_str(),
        channel.header.as_str(),
    ]
    .into_iter()
    .chain(profile.username.split('.'))
    .filter(|keyword| !keyword.is_empty())
    .map(str::to_string)
    .collect();

    ChannelRecord {
        id: channel.id.clone(),
        kind: ChannelKind::Direct,
        title,
        subtitle: Some(handle.clone()),
        mention_name: handle,
        email: (!profile.email.is_empty()).then(|| profile.email.clone()),
        keywords,
        mention_count: None,
        presence: None,
        path: format!("/messages/@{}", profile.username),
    }
}

fn channel_record(channel: &Channel) -> ChannelRecord {
    let keywords: BTreeSet<String> = [
        channel.display_name.as_str(),
        channel.name.as_str(),
        channel.header.as_str(),
        channel.purpose.as_str(),
    ]
    .into_iter()
    .filter(|keyword| !keyword.is_empty())
    .map(str::to_string)
    .collect();

    ChannelRecord {
        id: channel.id.clone(),
        kind: ChannelKind::from(channel.channel_type),
        title: channel.display_name.clone(),
        subtitle: None,
        mention_name: format!("@{}", channel.name),
        email: None,
        keywords,
        mention_count: None,
        presence: None,
        path: format!("/channels/{}", channel.name),
    }
}

fn presence_of(status: &UserStatus, now: DateTime<Utc>) -> Presence {
    let last_activity_at = timestamp_from_millis(status.last_activity_at);
    Presence {
        kind: status.status,
        last_activity_at,
        last_seen: (status.status != StatusKind::Online)
            .then(|| describe_last_activity(last_activity_at, now)),
    }
}
