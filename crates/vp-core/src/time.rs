//! Timestamp normalization and shared time helpers.
//!
//! Raw events carry RFC 3339 text. [`normalize_events`] parses the
//! timestamps the reconstructor reads and applies a [`FailurePolicy`] when
//! one of them is malformed.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{ActivityEvent, GroupBy, PresenceState, RawActivityEvent};
use crate::window::ConfigError;

/// Which timestamp of a raw event failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    CreatedAt,
    UpdatedAt,
}

impl fmt::Display for TimestampField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreatedAt => "create_time",
            Self::UpdatedAt => "update_time",
        })
    }
}

/// A raw event timestamp that is not valid RFC 3339.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {field} for event {event_id}: {value:?}")]
pub struct ParseError {
    pub event_id: i64,
    /// Partition key of the event's subject.
    pub subject: String,
    pub field: TimestampField,
    pub value: String,
    #[source]
    pub source: chrono::ParseError,
}

/// What normalization does with a malformed timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole batch on the first malformed timestamp.
    #[default]
    FailFast,
    /// Drop every event of an affected subject and keep the rest.
    IsolateSubject,
}

impl FailurePolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FailFast => "fail_fast",
            Self::IsolateSubject => "isolate_subject",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail_fast" => Ok(Self::FailFast),
            "isolate_subject" => Ok(Self::IsolateSubject),
            _ => Err(format!("invalid failure policy: {s}")),
        }
    }
}

/// Events that survived normalization, plus the failures that were
/// tolerated under [`FailurePolicy::IsolateSubject`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub events: Vec<ActivityEvent>,
    pub rejections: Vec<ParseError>,
}

/// Parses an RFC 3339 timestamp and converts it to UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

/// Parses a `YYYY-MM-DD` report date.
pub fn parse_target_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        value: value.to_string(),
    })
}

/// Returns UTC midnight at the start of `date`.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Parses raw events into [`ActivityEvent`]s.
///
/// Events whose state code is neither active nor inactive are dropped
/// without parsing. Active events need both timestamps. Inactive events only
/// need a position in the timeline: `create_time` falls back to
/// `update_time`, and an `update_time` that does not parse is kept on the
/// event as an error for the reconstructor, which reads it only when the
/// event closes a session.
pub fn normalize_events<'a, I>(
    raw: I,
    group_by: GroupBy,
    policy: FailurePolicy,
) -> Result<NormalizedBatch, ParseError>
where
    I: IntoIterator<Item = &'a RawActivityEvent>,
{
    let mut batch = NormalizedBatch::default();
    let mut tainted: HashSet<&'a str> = HashSet::new();

    for record in raw {
        let Some(state) = PresenceState::from_code(record.state) else {
            tracing::trace!(
                event_id = record.id,
                state = record.state,
                "ignoring event without presence transition"
            );
            continue;
        };

        match normalize_event(record, state, group_by) {
            Ok(event) => batch.events.push(event),
            Err(err) => match policy {
                FailurePolicy::FailFast => return Err(err),
                FailurePolicy::IsolateSubject => {
                    tracing::warn!(error = %err, subject = %err.subject, "excluding subject");
                    tainted.insert(group_by.key(&record.display_name, &record.user_id));
                    batch.rejections.push(err);
                }
            },
        }
    }

    if !tainted.is_empty() {
        batch
            .events
            .retain(|event| !tainted.contains(event.subject_key(group_by)));
    }

    Ok(batch)
}

fn normalize_event(
    record: &RawActivityEvent,
    state: PresenceState,
    group_by: GroupBy,
) -> Result<ActivityEvent, ParseError> {
    let parse = |field: TimestampField, value: &str| {
        parse_timestamp(value).map_err(|source| ParseError {
            event_id: record.id,
            subject: group_by
                .key(&record.display_name, &record.user_id)
                .to_string(),
            field,
            value: value.to_string(),
            source,
        })
    };

    let (created_at, updated_at) = match state {
        PresenceState::Active => {
            let created_at = parse(TimestampField::CreatedAt, &record.created_at)?;
            let updated_at = parse(TimestampField::UpdatedAt, &record.updated_at)?;
            (created_at, Ok(updated_at))
        }
        PresenceState::Inactive => {
            let updated_at = parse(TimestampField::UpdatedAt, &record.updated_at);
            let created_at = match (parse_timestamp(&record.created_at), &updated_at) {
                (Ok(created_at), _) => created_at,
                (Err(_), Ok(updated_at)) => *updated_at,
                // Neither field places the event on the timeline.
                (Err(_), Err(err)) => return Err(err.clone()),
            };
            (created_at, updated_at)
        }
    };

    Ok(ActivityEvent {
        id: record.id,
        display_name: record.display_name.clone(),
        user_id: record.user_id.clone(),
        group_id: record.group_id,
        created_at,
        updated_at,
        state,
    })
}
