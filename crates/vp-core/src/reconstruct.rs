//! Presence session reconstruction.
//!
//! # Algorithm Summary
//!
//! 1. Partition events by subject key, keeping arrival order per partition
//! 2. Walk each partition with at most one open session:
//!    - `Active` opens a session, or widens the open one to cover the event
//!    - `Inactive` extends the open session's end and closes it
//!    - `Inactive` with nothing open is ignored, timestamps unread
//! 3. A session still open at the end of its partition is emitted as-is
//!
//! A timestamp that failed to parse is an error only once a session reads
//! it; the [`FailurePolicy`] then decides whether the run or the subject
//! is given up.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::event::{ActivityEvent, GroupBy, PresenceState};
use crate::time::{FailurePolicy, ParseError};

/// A reconstructed presence interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub display_name: String,
    /// User id of the event that opened the session.
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Session {
    /// Opens a session covering a single `Active` event.
    ///
    /// Input does not guarantee `created_at <= updated_at`, so the bounds are
    /// ordered here; widening never moves them back past each other.
    fn open(event: &ActivityEvent) -> Result<Self, ParseError> {
        let updated_at = event.updated_at()?;
        Ok(Self {
            display_name: event.display_name.clone(),
            user_id: event.user_id.clone(),
            start_time: event.created_at.min(updated_at),
            end_time: event.created_at.max(updated_at),
        })
    }

    fn widen(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.start_time = self.start_time.min(start);
        self.end_time = self.end_time.max(end);
    }

    /// Returns the partition key of this session under `group_by`.
    pub fn subject_key(&self, group_by: GroupBy) -> &str {
        group_by.key(&self.display_name, &self.user_id)
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// True if `other` lies strictly inside this session on both ends.
    pub fn strictly_contains(&self, other: &Self) -> bool {
        self.start_time < other.start_time && self.end_time > other.end_time
    }
}

/// Sessions rebuilt from a batch, plus the subjects given up under
/// [`FailurePolicy::IsolateSubject`].
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub sessions: Vec<Session>,
    pub rejections: Vec<ParseError>,
}

/// Rebuilds presence sessions from events in arrival order.
///
/// Events need not be grouped, but within a subject they must already be
/// ordered by creation time (see [`crate::event::sort_events`]). Partitions
/// are emitted in first-seen order; no ordering across subjects is implied.
pub fn reconstruct_sessions(
    events: &[ActivityEvent],
    group_by: GroupBy,
    policy: FailurePolicy,
) -> Result<Reconstruction, ParseError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<Vec<&ActivityEvent>> = Vec::new();

    for event in events {
        let slot = *index
            .entry(event.subject_key(group_by))
            .or_insert_with(|| {
                partitions.push(Vec::new());
                partitions.len() - 1
            });
        partitions[slot].push(event);
    }

    let mut output = Reconstruction::default();
    for partition in &partitions {
        match reconstruct_partition(partition) {
            Ok(sessions) => output.sessions.extend(sessions),
            Err(err) => match policy {
                FailurePolicy::FailFast => return Err(err),
                FailurePolicy::IsolateSubject => {
                    tracing::warn!(error = %err, subject = %err.subject, "excluding subject");
                    output.rejections.push(err);
                }
            },
        }
    }

    tracing::debug!(
        events = events.len(),
        subjects = partitions.len(),
        sessions = output.sessions.len(),
        rejected = output.rejections.len(),
        "reconstructed sessions"
    );
    Ok(output)
}

fn reconstruct_partition(events: &[&ActivityEvent]) -> Result<Vec<Session>, ParseError> {
    let mut sessions = Vec::new();
    let mut current: Option<Session> = None;

    for event in events {
        match event.state {
            PresenceState::Active => match current.as_mut() {
                Some(session) => session.widen(event.created_at, event.updated_at()?),
                None => current = Some(Session::open(event)?),
            },
            PresenceState::Inactive => {
                if let Some(mut session) = current.take() {
                    session.end_time = session.end_time.max(event.updated_at()?);
                    sessions.push(session);
                }
            }
        }
    }

    // No closing event observed: keep what was accumulated.
    if let Some(session) = current {
        tracing::trace!(subject = %session.display_name, "emitting trailing open session");
        sessions.push(session);
    }
    Ok(sessions)
}
