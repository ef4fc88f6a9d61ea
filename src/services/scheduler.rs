//! Daily scheduled runs plus an optional run shortly after start-up

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::ScheduleConfig;
use crate::domain::RunError;
use crate::services::run_coordinator::RunCoordinator;

/// Time left until the next `at` (UTC) strictly after `now`
pub fn until_next(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

fn start_run(coordinator: &Arc<RunCoordinator>, reason: &str) {
    match coordinator.trigger_all() {
        Ok(run) => tracing::info!(
            run_id = ?run.snapshot.overall.run_id,
            "Started {} scrape run",
            reason
        ),
        Err(RunError::Conflict(_)) => {
            tracing::warn!("Skipping {} scrape run: a run is already in progress", reason)
        }
        Err(e) => tracing::error!("Could not start {} scrape run: {}", reason, e),
    }
}

/// Spawns the scheduler task, or returns `None` when nothing is scheduled
pub fn spawn(coordinator: Arc<RunCoordinator>, schedule: ScheduleConfig) -> Option<JoinHandle<()>> {
    if !schedule.enabled && !schedule.run_on_startup {
        tracing::info!("Scheduled scraping disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        if schedule.run_on_startup {
            tokio::time::sleep(schedule.startup_delay).await;
            start_run(&coordinator, "startup");
        }
        if !schedule.enabled {
            return;
        }

        loop {
            let wait = until_next(Utc::now(), schedule.daily_at);
            tracing::info!(
                "Next scheduled scrape at {} UTC (in {}s)",
                schedule.daily_at,
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;
            start_run(&coordinator, "daily");
        }
    }))
}
