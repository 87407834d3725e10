//! Report command: presence totals for one UTC day.
//!
//! Loads the day's events from the store, runs the presence pipeline and
//! prints either a table or the JSON records `vp push` would deliver.

use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use vp_core::format::format_clock;
use vp_core::time::parse_target_date;
use vp_core::{DurationFormat, PipelineConfig, PipelineOutput, Session, render_records};
use vp_db::Database;

use crate::{Config, DayArgs};

/// Resolves `--date` / `--days-ago` against `today`; neither means today.
pub fn resolve_date(day: &DayArgs, today: NaiveDate) -> Result<NaiveDate> {
    if let Some(date) = &day.date {
        return Ok(parse_target_date(date)?);
    }
    let days = day.days_ago.unwrap_or(0);
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .with_context(|| format!("{days} days before {today} is out of range"))
}

/// Builds the pipeline parameters, rejecting invalid configuration before
/// any event is read.
pub fn pipeline_config(config: &Config, day: &DayArgs, today: NaiveDate) -> Result<PipelineConfig> {
    let date = resolve_date(day, today)?;
    let window = config
        .window()
        .context("invalid window in configuration")?;
    Ok(PipelineConfig {
        date,
        window,
        group_by: config.group_by,
        failure_policy: config.failure_policy,
        group_filter: day.clan.or(config.clan_id),
    })
}

/// Loads the configured day from `db` and runs the pipeline.
pub fn compute(db: &Database, pipeline: &PipelineConfig) -> Result<PipelineOutput> {
    let events = db.list_events_for_day(pipeline.date, pipeline.group_filter)?;
    let output = vp_core::run(&events, pipeline)
        .with_context(|| format!("failed to compute presence for {}", pipeline.date))?;
    for rejection in &output.rejections {
        eprintln!("warning: skipped {}: {rejection}", rejection.subject);
    }
    Ok(output)
}

/// Formats totals as an aligned table.
pub fn format_report(
    pipeline: &PipelineConfig,
    output: &PipelineOutput,
    format: DurationFormat,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Presence on {} ({}-{} UTC)",
        pipeline.date,
        format_clock(pipeline.window.start_offset()),
        format_clock(pipeline.window.end_offset()),
    );
    let _ = writeln!(out);

    if output.totals.is_empty() {
        let _ = writeln!(out, "No presence recorded in the window.");
        return out;
    }

    let name_width = output
        .totals
        .iter()
        .map(|t| t.display_name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    let id_width = output
        .totals
        .iter()
        .map(|t| t.user_id.chars().count())
        .max()
        .unwrap_or(0)
        .max("USER ID".len());

    let _ = writeln!(out, "{:<name_width$}  {:<id_width$}  TOTAL", "NAME", "USER ID");
    for total in &output.totals {
        let _ = writeln!(
            out,
            "{:<name_width$}  {:<id_width$}  {}",
            total.display_name,
            total.user_id,
            format.render(total.total),
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{} members", output.totals.len());
    out
}

/// Formats reconstructed sessions, one per line.
pub fn format_sessions(sessions: &[Session]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Sessions");
    for session in sessions {
        let _ = writeln!(
            out,
            "{} ({})  {} -> {}  {}",
            session.display_name,
            session.user_id,
            session.start_time.format("%Y-%m-%dT%H:%M:%SZ"),
            session.end_time.format("%Y-%m-%dT%H:%M:%SZ"),
            format_clock(session.duration()),
        );
    }
    out
}

/// Runs the report command.
pub fn run(db: &Database, config: &Config, day: &DayArgs, json: bool, sessions: bool) -> Result<()> {
    let pipeline = pipeline_config(config, day, Utc::now().date_naive())?;
    let output = compute(db, &pipeline)?;

    if json {
        let records = render_records(&output.totals, config.duration_format);
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if sessions {
        println!("{}", format_sessions(&output.sessions));
    }
    print!("{}", format_report(&pipeline, &output, config.duration_format));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use insta::assert_snapshot;
    use vp_core::{AggregatedTime, DailyWindow, RawActivityEvent};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 6).expect("valid test date")
    }

    fn day_args(date: Option<&str>, days_ago: Option<u32>) -> DayArgs {
        DayArgs {
            date: date.map(String::from),
            days_ago,
            clan: None,
        }
    }

    fn total(name: &str, user: &str, total: Duration) -> AggregatedTime {
        AggregatedTime {
            display_name: name.to_string(),
            user_id: user.to_string(),
            total,
            date: date(),
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 6, hour, minute, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn raw(id: i64, name: &str, clan: i64, time: &str, state: i16) -> RawActivityEvent {
        RawActivityEvent {
            id,
            user_id: format!("id-{name}"),
            group_id: Some(clan),
            channel_id: 1,
            display_name: name.to_string(),
            created_at: format!("2024-08-06T{time}:00Z"),
            updated_at: format!("2024-08-06T{time}:00Z"),
            state,
        }
    }

    // ========== Date Resolution Tests ==========

    #[test]
    fn test_resolve_explicit_date() {
        let day = day_args(Some("2024-08-06"), None);
        assert_eq!(resolve_date(&day, date() + Days::new(30)).unwrap(), date());
    }

    #[test]
    fn test_resolve_days_ago() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 12).unwrap();
        assert_eq!(resolve_date(&day_args(None, Some(6)), today).unwrap(), date());
        assert_eq!(resolve_date(&day_args(None, None), today).unwrap(), today);
    }

    #[test]
    fn test_resolve_rejects_malformed_date() {
        let err = resolve_date(&day_args(Some("08/06/2024"), None), date()).unwrap_err();
        assert!(err.to_string().contains("invalid report date"));
    }

    #[test]
    fn test_pipeline_config_prefers_cli_clan() {
        let config = Config {
            clan_id: Some(1),
            ..Config::default()
        };
        let mut day = day_args(Some("2024-08-06"), None);
        assert_eq!(
            pipeline_config(&config, &day, date()).unwrap().group_filter,
            Some(1)
        );
        day.clan = Some(2);
        assert_eq!(
            pipeline_config(&config, &day, date()).unwrap().group_filter,
            Some(2)
        );
    }

    #[test]
    fn test_pipeline_config_rejects_bad_window() {
        let config = Config {
            window_end: "noon".to_string(),
            ..Config::default()
        };
        let err = pipeline_config(&config, &day_args(None, None), date()).unwrap_err();
        assert!(err.to_string().contains("invalid window"));
    }

    // ========== Computation Tests ==========

    #[test]
    fn test_compute_reads_day_from_store() {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_events(&[
            raw(1, "Alice", 1, "02:00", 2),
            raw(2, "Alice", 1, "06:00", 0),
            raw(3, "Bob", 2, "04:50", 2),
            raw(4, "Bob", 2, "05:30", 0),
        ])
        .unwrap();

        let output = compute(&db, &PipelineConfig::new(date())).unwrap();
        assert_eq!(
            output.totals,
            vec![
                total("Alice", "id-Alice", Duration::hours(2)),
                total("Bob", "id-Bob", Duration::minutes(10)),
            ]
        );

        let clan_two = PipelineConfig {
            group_filter: Some(2),
            ..PipelineConfig::new(date())
        };
        assert_eq!(compute(&db, &clan_two).unwrap().totals.len(), 1);
    }

    #[test]
    fn test_compute_closes_session_with_placeholder_create_time() {
        let mut db = Database::open_in_memory().unwrap();
        let mut leave = raw(3, "Alice", 1, "03:10", 0);
        leave.created_at = "-".to_string();
        db.insert_events(&[
            raw(1, "Alice", 1, "03:00", 2),
            raw(2, "Alice", 1, "03:05", 2),
            leave,
        ])
        .unwrap();

        let output = compute(&db, &PipelineConfig::new(date())).unwrap();
        assert_eq!(output.sessions.len(), 1);
        assert_eq!(output.sessions[0].start_time, at(3, 0));
        assert_eq!(output.sessions[0].end_time, at(3, 10));
        assert_eq!(
            output.totals,
            vec![total("Alice", "id-Alice", Duration::minutes(10))]
        );
    }

    #[test]
    fn test_compute_fails_on_unparseable_create_time() {
        let mut db = Database::open_in_memory().unwrap();
        let mut spaced = raw(2, "Alice", 1, "03:10", 2);
        spaced.created_at = "2024-08-06 03:10:00".to_string();
        db.insert_events(&[raw(1, "Alice", 1, "03:00", 2), spaced])
            .unwrap();

        let err = compute(&db, &PipelineConfig::new(date())).unwrap_err();
        assert!(format!("{err:#}").contains("invalid create_time for event 2"));
    }

    #[test]
    fn test_compute_fails_on_malformed_timestamp() {
        let mut db = Database::open_in_memory().unwrap();
        let mut bad = raw(2, "Bob", 1, "03:00", 2);
        bad.updated_at = "soon".to_string();
        db.insert_events(&[raw(1, "Alice", 1, "03:00", 2), bad]).unwrap();

        let err = compute(&db, &PipelineConfig::new(date())).unwrap_err();
        assert!(format!("{err:#}").contains("invalid update_time for event 2"));
    }

    // ========== Formatting Tests ==========

    #[test]
    fn test_report_table() {
        let output = PipelineOutput {
            totals: vec![
                total("Alice", "1001", Duration::hours(2)),
                total("Bob", "1002", Duration::seconds(630)),
            ],
            ..PipelineOutput::default()
        };
        let report = format_report(&PipelineConfig::new(date()), &output, DurationFormat::Clock);
        assert_snapshot!(report, @r"
        Presence on 2024-08-06 (03:00:00-05:00:00 UTC)

        NAME   USER ID  TOTAL
        Alice  1001     02:00:00
        Bob    1002     00:10:30

        2 members
        ");
    }

    #[test]
    fn test_report_table_in_minutes() {
        let output = PipelineOutput {
            totals: vec![total("Alice", "1001", Duration::seconds(630))],
            ..PipelineOutput::default()
        };
        let pipeline = PipelineConfig {
            window: DailyWindow::from_clock("10:00", "12:00").unwrap(),
            ..PipelineConfig::new(date())
        };
        let report = format_report(&pipeline, &output, DurationFormat::Minutes);
        assert_snapshot!(report, @r"
        Presence on 2024-08-06 (10:00:00-12:00:00 UTC)

        NAME   USER ID  TOTAL
        Alice  1001     11m

        1 members
        ");
    }

    #[test]
    fn test_report_empty_day() {
        let report = format_report(
            &PipelineConfig::new(date()),
            &PipelineOutput::default(),
            DurationFormat::Clock,
        );
        assert_snapshot!(report, @r"
        Presence on 2024-08-06 (03:00:00-05:00:00 UTC)

        No presence recorded in the window.
        ");
    }

    #[test]
    fn test_sessions_listing() {
        let sessions = vec![Session {
            display_name: "Alice".to_string(),
            user_id: "1001".to_string(),
            start_time: at(2, 0),
            end_time: at(6, 0),
        }];
        assert_snapshot!(format_sessions(&sessions), @r"
        Sessions
        Alice (1001)  2024-08-06T02:00:00Z -> 2024-08-06T06:00:00Z  04:00:00
        ");
    }
}
