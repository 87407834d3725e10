//! End-to-end presence computation for one report date.

use chrono::NaiveDate;

use crate::event::{GroupBy, RawActivityEvent, sort_events};
use crate::filter::remove_nested_sessions;
use crate::reconstruct::{Session, reconstruct_sessions};
use crate::time::{FailurePolicy, ParseError, normalize_events};
use crate::window::{AggregatedTime, DailyWindow, WindowAggregator};

/// Caller-supplied parameters of a presence computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Calendar date (UTC) being reported.
    pub date: NaiveDate,
    pub window: DailyWindow,
    pub group_by: GroupBy,
    pub failure_policy: FailurePolicy,
    /// Keep only events of this clan.
    pub group_filter: Option<i64>,
}

impl PipelineConfig {
    /// Creates a configuration with the default window and policies.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            window: DailyWindow::default(),
            group_by: GroupBy::default(),
            failure_policy: FailurePolicy::default(),
            group_filter: None,
        }
    }
}

/// Result of a presence computation.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Sessions left after nested-session removal, sorted by subject and start.
    pub sessions: Vec<Session>,
    /// Per-subject window totals, sorted by subject.
    pub totals: Vec<AggregatedTime>,
    /// Malformed events tolerated under [`FailurePolicy::IsolateSubject`].
    pub rejections: Vec<ParseError>,
}

/// Runs normalization, reconstruction, filtering and aggregation.
///
/// Under [`FailurePolicy::FailFast`] any malformed timestamp the computation
/// reads fails it as a whole and no partial totals are produced. A leave row
/// with nothing to close is never read past its position.
pub fn run(raw: &[RawActivityEvent], config: &PipelineConfig) -> Result<PipelineOutput, ParseError> {
    let scoped = raw
        .iter()
        .filter(|event| config.group_filter.is_none_or(|group| event.group_id == Some(group)));
    let batch = normalize_events(scoped, config.group_by, config.failure_policy)?;
    tracing::debug!(
        raw = raw.len(),
        normalized = batch.events.len(),
        rejected = batch.rejections.len(),
        "normalized events"
    );

    let mut events = batch.events;
    sort_events(&mut events, config.group_by);

    let rebuilt = reconstruct_sessions(&events, config.group_by, config.failure_policy)?;
    let sessions = remove_nested_sessions(rebuilt.sessions, config.group_by);
    let totals = WindowAggregator::new(config.date, config.window).aggregate(&sessions);

    let mut rejections = batch.rejections;
    rejections.extend(rebuilt.rejections);
    Ok(PipelineOutput {
        sessions,
        totals,
        rejections,
    })
}
