//! Core domain logic for voice channel presence tracking.
//!
//! This crate turns raw join/leave signals into per-user presence time:
//! - Normalization: parsing raw event timestamps under a failure policy
//! - Reconstruction: rebuilding presence sessions from state transitions
//! - Filtering: dropping sessions nested inside another session
//! - Aggregation: summing session overlap with a fixed daily window
//!
//! None of it performs I/O. Callers fetch events for one calendar day and
//! hand them to [`pipeline::run`].

pub mod event;
pub mod filter;
pub mod format;
pub mod pipeline;
pub mod reconstruct;
pub mod time;
pub mod window;

pub use event::{ActivityEvent, GroupBy, PresenceState, RawActivityEvent, sort_events};
pub use filter::remove_nested_sessions;
pub use format::{DurationFormat, ReportRecord, TotalTime, render_records};
pub use pipeline::{PipelineConfig, PipelineOutput, run};
pub use reconstruct::{Reconstruction, Session, reconstruct_sessions};
pub use time::{FailurePolicy, NormalizedBatch, ParseError, normalize_events};
pub use window::{AggregatedTime, ConfigError, DailyWindow, SubjectId, WindowAggregator};
