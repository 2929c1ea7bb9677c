use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime, NaiveTime};
use compute::batch::RecurringExpenseJob;
use compute::default_job;
use sea_orm::DatabaseConnection;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{connect, Settings};

/// Runs the recurring expense job once a day at `schedule.run_at` local time.
///
/// Stops on Ctrl-C. A failed run is logged and retried at the next slot.
#[instrument(skip(settings), fields(run_at = %settings.schedule.run_at))]
pub async fn schedule(settings: &Settings) -> Result<()> {
    let db = connect(&settings.database_url).await?;
    let job = default_job(Some(settings.safety_limit));
    info!("Recurring expense scheduler started");

    if settings.schedule.run_on_startup {
        run_job(&job, &db).await;
    }

    loop {
        let now = Local::now().naive_local();
        let next = next_run_after(now, settings.schedule.run_at)
            .ok_or_else(|| anyhow!("Cannot schedule a run after {}", now))?;
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next run at {}", next);
        debug!(seconds = wait.as_secs(), "Sleeping until next run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => run_job(&job, &db).await,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutting down recurring expense scheduler");
                break;
            }
        }
    }

    Ok(())
}

async fn run_job(job: &RecurringExpenseJob, db: &DatabaseConnection) {
    let today = Local::now().date_naive();
    match job.process_due_templates(db, today).await {
        Ok(report) if report.has_failures() => {
            warn!(
                failed = report.failed.len(),
                generated = report.generated(),
                "Scheduled run finished with failures"
            );
        }
        Ok(report) => {
            info!(generated = report.generated(), "Scheduled run finished");
        }
        Err(e) => error!("Scheduled run failed: {}", e),
    }
}

/// First moment strictly after `now` whose time of day is `run_at`.
fn next_run_after(now: NaiveDateTime, run_at: NaiveTime) -> Option<NaiveDateTime> {
    let today = now.date().and_time(run_at);
    if today > now {
        Some(today)
    } else {
        now.date().succ_opt().map(|tomorrow| tomorrow.and_time(run_at))
    }
}
