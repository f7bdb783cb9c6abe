use chrono::{DateTime, Datelike as _, Duration, Local, NaiveTime, TimeZone as _, Utc};

use crate::model::{CustomStatus, CustomStatusDuration, StatusKind};

impl StatusKind {
    pub fn title(self) -> &'static str {
        match self {
            StatusKind::Online => "Online",
            StatusKind::Away => "Away",
            StatusKind::Offline => "Offline",
            StatusKind::Dnd => "Do not disturb",
        }
    }
}

/// Every status the user can switch to from `current`.
pub fn available_status_changes(current: StatusKind) -> Vec<StatusKind> {
    StatusKind::ALL
        .into_iter()
        .filter(|kind| *kind != current)
        .collect()
}

pub fn timestamp_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// "5 minutes ago" / "in 2 hours", using the largest whole unit.
pub fn describe_last_activity(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const UNITS: [(&str, i64); 7] = [
        ("year", 365 * 24 * 3600),
        ("month", 30 * 24 * 3600),
        ("week", 7 * 24 * 3600),
        ("day", 24 * 3600),
        ("hour", 3600),
        ("minute", 60),
        ("second", 1),
    ];

    let delta = now.signed_duration_since(at).num_seconds();
    let magnitude = delta.abs();
    let Some((unit, amount)) = UNITS
        .iter()
        .find(|(_, seconds)| magnitude >= *seconds)
        .map(|(unit, seconds)| (*unit, magnitude / seconds))
    else {
        return "just now".to_string();
    };

    let plural = if amount == 1 { "" } else { "s" };
    if delta >= 0 {
        format!("{amount} {unit}{plural} ago")
    } else {
        format!("in {amount} {unit}{plural}")
    }
}

impl CustomStatus {
    /// Expiry sent with the status: explicit `expires_at` first, otherwise
    /// derived from the duration.
    pub fn resolved_expiry(&self, now: DateTime<Local>) -> Option<DateTime<Utc>> {
        if let Some(expires_at) = self.expires_at {
            return Some(expires_at);
        }
        let expiry = match self.duration? {
            CustomStatusDuration::ThirtyMinutes => now + Duration::minutes(30),
            CustomStatusDuration::OneHour => now + Duration::hours(1),
            CustomStatusDuration::FourHours => now + Duration::hours(4),
            CustomStatusDuration::Today => end_of_day(now)?,
            CustomStatusDuration::ThisWeek => {
                let days_to_sunday = 6 - i64::from(now.weekday().num_days_from_monday());
                end_of_day(now + Duration::days(days_to_sunday))?
            }
            CustomStatusDuration::DateAndTime | CustomStatusDuration::DontClear => return None,
        };
        Some(expiry.with_timezone(&Utc))
    }
}

fn end_of_day(at: DateTime<Local>) -> Option<DateTime<Local>> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59)?;
    Local
        .from_local_datetime(&at.date_naive().and_time(last_second))
        .latest()
}
