//! Push command: delivers a day's presence totals to the reporting API.

use anyhow::{Context, Result};
use chrono::Utc;
use vp_api::Client;
use vp_core::render_records;
use vp_db::Database;

use crate::commands::report;
use crate::{Config, DayArgs};

/// Builds the API client from configuration.
fn client(config: &Config) -> Result<Client> {
    let url = config
        .api_url
        .as_deref()
        .context("api_url is not configured (set it in config.toml or VP_API_URL)")?;
    let security_code = config
        .security_code
        .as_deref()
        .context("security_code is not configured (set it in config.toml or VP_SECURITY_CODE)")?;
    Ok(Client::new(url, security_code)?)
}

/// Computes the day's totals and submits them.
///
/// Returns the number of records delivered.
pub fn run(db: &Database, config: &Config, day: &DayArgs) -> Result<usize> {
    let client = client(config)?;
    let pipeline = report::pipeline_config(config, day, Utc::now().date_naive())?;
    let output = report::compute(db, &pipeline)?;
    let records = render_records(&output.totals, config.duration_format);

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    runtime
        .block_on(client.submit(&records))
        .with_context(|| format!("failed to submit presence totals for {}", pipeline.date))?;

    eprintln!("Submitted {} records for {}", records.len(), pipeline.date);
    Ok(records.len())
}
