//! Raw and normalized presence events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::ParseError;

/// Raw state code written when a user leaves a voice channel.
pub const INACTIVE_CODE: i16 = 0;

/// Raw state code written while a user is present in a voice channel.
pub const ACTIVE_CODE: i16 = 2;

/// One voice channel membership row, as written by the upstream bot.
///
/// Timestamps are kept as text so that normalization decides how malformed
/// values are handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawActivityEvent {
    pub id: i64,
    pub user_id: String,
    /// Coarse scope (clan) used to narrow a report before reconstruction.
    #[serde(default, rename = "clan_id")]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub channel_id: i64,
    pub display_name: String,
    #[serde(rename = "create_time")]
    pub created_at: String,
    #[serde(rename = "update_time")]
    pub updated_at: String,
    /// Raw state code; see [`PresenceState::from_code`].
    #[serde(rename = "active")]
    pub state: i16,
}

/// A presence transition understood by the reconstructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    /// The user is (still) present.
    Active,
    /// The user left.
    Inactive,
}

impl PresenceState {
    /// Maps a raw state code; codes other than active/inactive carry no
    /// presence information and yield `None`.
    #[must_use]
    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            ACTIVE_CODE => Some(Self::Active),
            INACTIVE_CODE => Some(Self::Inactive),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Active => ACTIVE_CODE,
            Self::Inactive => INACTIVE_CODE,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw event with parsed timestamps and a known presence state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub id: i64,
    pub display_name: String,
    pub user_id: String,
    pub group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    /// Parsed `update_time`. A leave event may carry the parse failure
    /// instead; it only surfaces if the event closes a session.
    pub updated_at: Result<DateTime<Utc>, ParseError>,
    pub state: PresenceState,
}

impl ActivityEvent {
    /// Returns the parsed `update_time`, or the failure recorded for it.
    pub fn updated_at(&self) -> Result<DateTime<Utc>, ParseError> {
        self.updated_at.clone()
    }

    /// Returns the partition key of this event under `group_by`.
    pub fn subject_key(&self, group_by: GroupBy) -> &str {
        group_by.key(&self.display_name, &self.user_id)
    }
}

/// Which identity partitions events into per-subject streams.
///
/// Display names are what the upstream service groups by, so two accounts
/// sharing a name end up in one stream. `UserId` partitions by the stable
/// account identifier instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    DisplayName,
    UserId,
}

impl GroupBy {
    /// Selects the partition key from a subject's two identities.
    pub fn key<'a>(self, display_name: &'a str, user_id: &'a str) -> &'a str {
        match self {
            Self::DisplayName => display_name,
            Self::UserId => user_id,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DisplayName => "display_name",
            Self::UserId => "user_id",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "display_name" => Ok(Self::DisplayName),
            "user_id" => Ok(Self::UserId),
            _ => Err(format!("invalid grouping key: {s}")),
        }
    }
}

/// Orders events by `(subject key, created_at)`.
///
/// The sort is stable, so events sharing a key and creation time keep their
/// arrival order.
pub fn sort_events(events: &mut [ActivityEvent], group_by: GroupBy) {
    events.sort_by(|a, b| {
        a.subject_key(group_by)
            .cmp(b.subject_key(group_by))
            .then(a.created_at.cmp(&b.created_at))
    });
}
