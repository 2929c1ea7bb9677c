use std::fmt::{self, Write};

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use compute::batch::BatchReport;
use compute::default_job;
use tracing::info;

use crate::config::{connect, Settings};

/// Processes every due recurring expense once and prints the report.
pub async fn run_once(settings: &Settings, today: Option<NaiveDate>, json: bool) -> Result<()> {
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    info!("Running recurring expenses for {}", today);

    let db = connect(&settings.database_url).await?;
    let report = default_job(Some(settings.safety_limit))
        .process_due_templates(&db, today)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report)?);
    }

    if report.has_failures() {
        bail!("{} recurring expenses failed", report.failed.len());
    }
    Ok(())
}

pub fn render_report(report: &BatchReport) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "Recurring expenses as of {}: {} processed, {} failed, {} expenses generated",
        report.today,
        report.succeeded.len(),
        report.failed.len(),
        report.generated()
    )?;
    for outcome in &report.succeeded {
        let next = outcome
            .next_occurrence_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "  #{:<6} {:<10} generated {:>4}  next {}  {}",
            outcome.template_id,
            format!("{:?}", outcome.status).to_lowercase(),
            outcome.generated,
            next,
            if outcome.active { "active" } else { "inactive" }
        )?;
    }
    for failure in &report.failed {
        writeln!(out, "  #{:<6} failed     {}", failure.template_id, failure.error)?;
    }
    Ok(out)
}
