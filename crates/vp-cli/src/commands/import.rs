//! Import command for loading voice channel events into the local `SQLite` store.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use vp_core::RawActivityEvent;
use vp_db::Database;

/// Reads JSONL events from `file` (or stdin) and stores them.
///
/// Returns the number of newly inserted events.
pub fn run(db: &mut Database, file: Option<&Path>) -> Result<usize> {
    let events = match file {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            parse_events(BufReader::new(file))?
        }
        None => parse_events(io::stdin().lock())?,
    };

    let inserted = db.insert_events(&events)?;
    eprintln!(
        "Imported {inserted} new events ({} duplicates skipped)",
        events.len() - inserted
    );
    Ok(inserted)
}

fn parse_events<R: BufRead>(reader: R) -> Result<Vec<RawActivityEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: RawActivityEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid event on line {}", idx + 1))?;
        if event.display_name.trim().is_empty() {
            anyhow::bail!("invalid event on line {}: missing display_name", idx + 1);
        }
        events.push(event);
    }
    Ok(events)
}
