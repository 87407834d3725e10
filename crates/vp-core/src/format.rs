//! Output formatting for aggregated presence time.
//!
//! Consumers receive either `HH:MM:SS` strings or whole minutes; the choice
//! is a [`DurationFormat`] rather than a separate record type.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::window::AggregatedTime;

/// How a total duration is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationFormat {
    /// `HH:MM:SS`, hours not wrapped at 24.
    #[default]
    Clock,
    /// Whole minutes, rounded half up.
    Minutes,
}

impl DurationFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Clock => "clock",
            Self::Minutes => "minutes",
        }
    }

    pub fn render(self, duration: Duration) -> TotalTime {
        match self {
            Self::Clock => TotalTime::Clock(format_clock(duration)),
            Self::Minutes => TotalTime::Minutes(rounded_minutes(duration)),
        }
    }
}

impl fmt::Display for DurationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clock" => Ok(Self::Clock),
            "minutes" => Ok(Self::Minutes),
            _ => Err(format!("invalid duration format: {s}")),
        }
    }
}

/// A rendered duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalTime {
    Minutes(i64),
    Clock(String),
}

impl fmt::Display for TotalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(minutes) => write!(f, "{minutes}m"),
            Self::Clock(clock) => f.write_str(clock),
        }
    }
}

/// Formats a duration as `HH:MM:SS`, dropping sub-second precision.
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.num_seconds();
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.unsigned_abs();
    format!(
        "{sign}{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

/// Rounds a duration to the nearest whole minute; negative input is 0.
pub fn rounded_minutes(duration: Duration) -> i64 {
    let ms = duration.num_milliseconds().max(0);
    (ms + 30_000) / 60_000
}

/// The per-subject record delivered to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub full_name: String,
    /// Always empty; the attendance API expects the key.
    #[serde(default)]
    pub email: String,
    pub google_id: String,
    pub total_time: TotalTime,
    pub date: NaiveDate,
}

impl ReportRecord {
    pub fn new(total: &AggregatedTime, format: DurationFormat) -> Self {
        Self {
            full_name: total.display_name.clone(),
            email: String::new(),
            google_id: total.user_id.clone(),
            total_time: format.render(total.total),
            date: total.date,
        }
    }
}

/// Renders aggregated totals under one format, preserving order.
pub fn render_records(totals: &[AggregatedTime], format: DurationFormat) -> Vec<ReportRecord> {
    totals
        .iter()
        .map(|total| ReportRecord::new(total, format))
        .collect()
}
