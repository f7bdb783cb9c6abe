use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::{
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
};

use mattermost_launcher::{
    build_channel_view,
    core::{default_settings_file, token_file_beside},
    deep_link,
    model::{ChannelRecord, ChannelView, CustomStatus, CustomStatusDuration, StatusKind, Team},
    presence::available_status_changes,
    select_team,
    settings::read_settings,
    FileTokenStore, KeyringTokenStore, MattermostClient, Preferences, TokenStore, TokenStoreKind,
};

#[derive(Parser)]
#[command(name = "mattermost-launcher")]
#[command(about = "Jump to Mattermost channels and manage your status", long_about = None)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in if needed and show the current user
    Check,
    /// List channels grouped by sidebar category
    Channels,
    /// Print the deep link of the first channel matching a query
    Open {
        query: String,
        /// Hand the link to the system opener
        #[arg(long)]
        launch: bool,
    },
    /// Show or change your status
    Status {
        #[command(subcommand)]
        action: Option<StatusAction>,
    },
}

#[derive(Subcommand)]
enum StatusAction {
    /// Switch to online, away, offline or dnd
    Set { kind: StatusKind },
    /// Set a custom status
    Custom {
        #[arg(long)]
        emoji: String,
        #[arg(long)]
        text: String,
        /// thirty_minutes, one_hour, four_hours, today, this_week or dont_clear
        #[arg(long, value_parser = parse_duration)]
        duration: Option<CustomStatusDuration>,
    },
    /// Remove the custom status
    ClearCustom,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings_path = match cli.config {
        Some(path) => path,
        None => default_settings_file()
            .ok_or_else(|| anyhow!("Unable to resolve the user config directory"))?,
    };
    let preferences = load_preferences(&settings_path)?;
    let store = token_store(&preferences, &settings_path);
    let client = MattermostClient::connect(&preferences, store)?;

    client
        .session()
        .ensure_session()
        .await
        .context("Failed to sign in")?;

    let outcome = match cli.command {
        Commands::Check => check(&client, &preferences).await,
        Commands::Channels => channels(&client, &preferences).await,
        Commands::Open { query, launch } => open(&client, &preferences, &query, launch).await,
        Commands::Status { action } => status(&client, action).await,
    };

    tracing::debug!("diagnostics: {:?}", client.diagnostics());
    outcome
}

fn load_preferences(path: &Path) -> Result<Preferences> {
    let mut preferences = read_settings(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    preferences.apply_env_overrides();
    Ok(preferences.validated()?)
}

fn token_store(preferences: &Preferences, settings_path: &Path) -> Arc<dyn TokenStore> {
    match preferences.token_store {
        TokenStoreKind::File => Arc::new(FileTokenStore::new(token_file_beside(settings_path))),
        TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new()),
    }
}

fn parse_duration(value: &str) -> Result<CustomStatusDuration, String> {
    let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| format!("unknown duration {value:?}"))
}

async fn check(client: &MattermostClient, preferences: &Preferences) -> Result<()> {
    let me = client.get_me().await?;
    let name = me.full_name();
    if name.is_empty() {
        println!("Signed in to {} as @{}", preferences.base_url, me.username);
    } else {
        println!("Signed in to {} as {name} (@{})", preferences.base_url, me.username);
    }
    Ok(())
}

async fn load_view(
    client: &MattermostClient,
    preferences: &Preferences,
) -> Result<(Team, ChannelView)> {
    let (me, teams) = tokio::try_join!(client.get_me(), client.get_teams())?;
    let team = select_team(teams, preferences.team_filter())?;
    let view = build_channel_view(client, &team.id, &me.id).await?;
    Ok((team, view))
}

async fn channels(client: &MattermostClient, preferences: &Preferences) -> Result<()> {
    let (team, view) = load_view(client, preferences).await?;
    println!("{}", display_team(&team));
    for group in view.groups() {
        println!();
        println!("{} ({})", group.name, group.count());
        for record in &group.channels {
            println!("  {}", describe_record(record));
        }
    }
    Ok(())
}

async fn open(
    client: &MattermostClient,
    preferences: &Preferences,
    query: &str,
    launch: bool,
) -> Result<()> {
    let (team, view) = load_view(client, preferences).await?;
    let Some(record) = view.find(query) else {
        bail!("No channel matches {query:?} in {}", display_team(&team));
    };

    let link = deep_link(&preferences.base_url, &team.name, record);
    println!("{link}");
    if launch {
        open_deep_link(&link)?;
    }
    Ok(())
}

async fn status(client: &MattermostClient, action: Option<StatusAction>) -> Result<()> {
    match action {
        None => {
            let current = client.get_profile_status().await?;
            println!("Status: {}", current.status.title());
            let changes: Vec<_> = available_status_changes(current.status)
                .into_iter()
                .map(StatusKind::as_str)
                .collect();
            println!("Available: {}", changes.join(", "));
        }
        Some(StatusAction::Set { kind }) => {
            let me = client.get_me().await?;
            client.set_profile_status(&me.id, kind).await?;
            println!("Status set to {}", kind.title());
        }
        Some(StatusAction::Custom {
            emoji,
            text,
            duration,
        }) => {
            client
                .set_custom_status(&CustomStatus {
                    emoji,
                    text: text.clone(),
                    duration,
                    expires_at: None,
                })
                .await?;
            println!("Custom status set: {text}");
        }
        Some(StatusAction::ClearCustom) => {
            client.clear_custom_status().await?;
            println!("Custom status cleared");
        }
    }
    Ok(())
}

fn display_team(team: &Team) -> &str {
    if team.display_name.is_empty() {
        &team.name
    } else {
        &team.display_name
    }
}

fn describe_record(record: &ChannelRecord) -> String {
    let mut line = format!("{}  {}", record.title, record.mention_name);
    if let Some(count) = record.mention_count.filter(|count| *count > 0) {
        line.push_str(&format!("  [{count}]"));
    }
    if let Some(presence) = record.presence.as_ref() {
        line.push_str(&format!("  {}", presence.kind));
        if let Some(last_seen) = presence.last_seen.as_deref() {
            line.push_str(&format!(" ({last_seen})"));
        }
    }
    line
}

fn open_deep_link(link: &str) -> Result<()> {
    let Some(mut command) = opener_command(link) else {
        bail!("No system opener available on this platform, open {link} manually");
    };
    let status = command.status().context("Failed to open deep link")?;
    if !status.success() {
        bail!(
            "Failed to open deep link (exit code {})",
            status.code().unwrap_or(-1)
        );
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn opener_command(link: &str) -> Option<Command> {
    let mut command = Command::new("open");
    command.arg(link);
    Some(command)
}

#[cfg(target_os = "linux")]
fn opener_command(link: &str) -> Option<Command> {
    let mut command = Command::new("xdg-open");
    command.arg(link);
    Some(command)
}

#[cfg(target_os = "windows")]
fn opener_command(link: &str) -> Option<Command> {
    let mut command = Command::new("cmd");
    command.arg("/C").arg("start").arg("").arg(link);
    Some(command)
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn opener_command(_link: &str) -> Option<Command> {
    None
}
