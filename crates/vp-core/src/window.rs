//! Fixed daily window aggregation.
//!
//! Each session starting on the target date contributes the part of it that
//! falls inside `[midnight + start, midnight + end)` (UTC). Contributions are
//! summed per subject.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::format::format_clock;
use crate::reconstruct::Session;
use crate::time::day_start;

/// Invalid aggregation parameters, rejected before any event is processed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid report date {value:?}, expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("invalid window bound {value:?}, expected HH:MM or HH:MM:SS")]
    InvalidClock { value: String },
    #[error("window bound {offset} lies outside the day")]
    OutsideDay { offset: String },
    #[error("window start {start} must be before window end {end}")]
    EmptyWindow { start: String, end: String },
}

/// A clock-time range applied to every day, as offsets from UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    start: Duration,
    end: Duration,
}

impl Default for DailyWindow {
    /// 03:00 to 05:00 UTC.
    fn default() -> Self {
        Self {
            start: Duration::hours(3),
            end: Duration::hours(5),
        }
    }
}

impl DailyWindow {
    /// Creates a window from offsets; requires `0 <= start < end <= 24h`.
    pub fn new(start: Duration, end: Duration) -> Result<Self, ConfigError> {
        let day = Duration::days(1);
        for offset in [start, end] {
            if offset < Duration::zero() || offset > day {
                return Err(ConfigError::OutsideDay {
                    offset: format_clock(offset),
                });
            }
        }
        if start >= end {
            return Err(ConfigError::EmptyWindow {
                start: format_clock(start),
                end: format_clock(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Creates a window from `HH:MM[:SS]` bounds. `24:00` denotes the end of
    /// the day.
    pub fn from_clock(start: &str, end: &str) -> Result<Self, ConfigError> {
        Self::new(parse_clock(start)?, parse_clock(end)?)
    }

    pub const fn start_offset(&self) -> Duration {
        self.start
    }

    pub const fn end_offset(&self) -> Duration {
        self.end
    }

    /// Returns the absolute `[start, end)` bounds of the window on `date`.
    pub fn bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let midnight = day_start(date);
        (midnight + self.start, midnight + self.end)
    }
}

fn parse_clock(value: &str) -> Result<Duration, ConfigError> {
    if matches!(value, "24:00" | "24:00:00") {
        return Ok(Duration::days(1));
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map(|time| time.signed_duration_since(NaiveTime::MIN))
        .map_err(|_| ConfigError::InvalidClock {
            value: value.to_string(),
        })
}

/// Two-field identity of an aggregated subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubjectId {
    pub display_name: String,
    pub user_id: String,
}

/// One subject's accumulated in-window presence on a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedTime {
    pub display_name: String,
    pub user_id: String,
    pub total: Duration,
    pub date: NaiveDate,
}

/// Sums per-subject session overlap with a [`DailyWindow`] on one date.
#[derive(Debug, Clone, Copy)]
pub struct WindowAggregator {
    date: NaiveDate,
    window: DailyWindow,
}

impl WindowAggregator {
    pub const fn new(date: NaiveDate, window: DailyWindow) -> Self {
        Self { date, window }
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the in-window part of `session`, if any.
    ///
    /// Only sessions whose start falls on the target UTC date count, even if
    /// one starting the day before runs into the window. A session opened by
    /// an event whose `update_time` precedes its `create_time` starts at the
    /// earlier of the two, which can move it onto the previous day.
    pub fn overlap(&self, session: &Session) -> Option<Duration> {
        if session.start_time.date_naive() != self.date {
            return None;
        }
        let (window_start, window_end) = self.window.bounds(self.date);
        let effective_start = session.start_time.max(window_start);
        let effective_end = session.end_time.min(window_end);
        (effective_start < effective_end).then(|| effective_end - effective_start)
    }

    /// Aggregates sessions into one record per subject with nonzero overlap,
    /// ordered by subject.
    pub fn aggregate(&self, sessions: &[Session]) -> Vec<AggregatedTime> {
        let mut totals: BTreeMap<SubjectId, Duration> = BTreeMap::new();
        for session in sessions {
            let Some(overlap) = self.overlap(session) else {
                continue;
            };
            let subject = SubjectId {
                display_name: session.display_name.clone(),
                user_id: session.user_id.clone(),
            };
            *totals.entry(subject).or_insert_with(Duration::zero) += overlap;
        }

        tracing::debug!(
            date = %self.date,
            sessions = sessions.len(),
            subjects = totals.len(),
            "aggregated window time"
        );

        totals
            .into_iter()
            .map(|(subject, total)| AggregatedTime {
                display_name: subject.display_name,
                user_id: subject.user_id,
                total,
                date: self.date,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 6).expect("valid test date")
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, day, hour, minute, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn session(name: &str, user: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
        Session {
            display_name: name.to_string(),
            user_id: user.to_string(),
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn default_window_is_three_to_five() {
        let window = DailyWindow::default();
        assert_eq!(window.start_offset(), Duration::hours(3));
        assert_eq!(window.end_offset(), Duration::hours(5));
        assert_eq!(window.bounds(date()), (at(6, 3, 0), at(6, 5, 0)));
    }

    #[test]
    fn from_clock_parses_bounds() {
        let window = DailyWindow::from_clock("10:00", "10:10:30").unwrap();
        assert_eq!(window.start_offset(), Duration::hours(10));
        assert_eq!(
            window.end_offset(),
            Duration::hours(10) + Duration::minutes(10) + Duration::seconds(30)
        );
        let whole_day = DailyWindow::from_clock("00:00", "24:00").unwrap();
        assert_eq!(whole_day.end_offset(), Duration::days(1));
    }

    #[test]
    fn rejects_invalid_windows() {
        assert_eq!(
            DailyWindow::from_clock("5am", "06:00"),
            Err(ConfigError::InvalidClock {
                value: "5am".to_string()
            })
        );
        assert_eq!(
            DailyWindow::from_clock("05:00", "03:00"),
            Err(ConfigError::EmptyWindow {
                start: "05:00:00".to_string(),
                end: "03:00:00".to_string(),
            })
        );
        assert!(matches!(
            DailyWindow::from_clock("04:00", "04:00"),
            Err(ConfigError::EmptyWindow { .. })
        ));
        assert_eq!(
            DailyWindow::new(Duration::hours(-1), Duration::hours(2)),
            Err(ConfigError::OutsideDay {
                offset: "-01:00:00".to_string()
            })
        );
        assert!(matches!(
            DailyWindow::new(Duration::hours(1), Duration::hours(25)),
            Err(ConfigError::OutsideDay { .. })
        ));
    }

    #[test]
    fn session_spanning_window_is_clipped_to_it() {
        let aggregator = WindowAggregator::new(date(), DailyWindow::default());
        let s = session("A", "1", at(6, 2, 0), at(6, 6, 0));
        assert_eq!(aggregator.overlap(&s), Some(Duration::hours(2)));
    }

    #[test]
    fn session_starting_previous_day_contributes_nothing() {
        let aggregator = WindowAggregator::new(date(), DailyWindow::default());
        let s = session("A", "1", at(5, 23, 30), at(6, 4, 0));
        assert_eq!(aggregator.overlap(&s), None);
        assert!(aggregator.aggregate(&[s]).is_empty());
    }

    #[test]
    fn session_outside_window_contributes_nothing() {
        let aggregator = WindowAggregator::new(date(), DailyWindow::default());
        let before = session("A", "1", at(6, 1, 0), at(6, 3, 0));
        let after = session("A", "1", at(6, 5, 0), at(6, 7, 0));
        assert_eq!(aggregator.overlap(&before), None);
        assert_eq!(aggregator.overlap(&after), None);
    }

    #[test]
    fn totals_are_summed_per_subject() {
        let aggregator = WindowAggregator::new(date(), DailyWindow::default());
        let sessions = vec![
            session("B", "2", at(6, 4, 0), at(6, 4, 10)),
            session("A", "1", at(6, 3, 0), at(6, 3, 20)),
            session("A", "1", at(6, 4, 30), at(6, 6, 0)),
        ];
        let totals = aggregator.aggregate(&sessions);
        assert_eq!(
            totals,
            vec![
                AggregatedTime {
                    display_name: "A".to_string(),
                    user_id: "1".to_string(),
                    total: Duration::minutes(50),
                    date: date(),
                },
                AggregatedTime {
                    display_name: "B".to_string(),
                    user_id: "2".to_string(),
                    total: Duration::minutes(10),
                    date: date(),
                },
            ]
        );
    }

    #[test]
    fn subject_key_does_not_collide_on_concatenation() {
        // "ab" + "c" and "a" + "bc" concatenate to the same string.
        let aggregator = WindowAggregator::new(date(), DailyWindow::default());
        let sessions = vec![
            session("ab", "c", at(6, 3, 0), at(6, 3, 10)),
            session("a", "bc", at(6, 3, 0), at(6, 3, 20)),
        ];
        let totals = aggregator.aggregate(&sessions);
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn same_name_different_user_yields_separate_records() {
        let aggregator = WindowAggregator::new(date(), DailyWindow::default());
        let sessions = vec![
            session("Sam", "1", at(6, 3, 0), at(6, 3, 10)),
            session("Sam", "2", at(6, 3, 0), at(6, 3, 10)),
        ];
        assert_eq!(aggregator.aggregate(&sessions).len(), 2);
    }
}
