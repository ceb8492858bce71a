//! Daily run scheduler
//!
//! Sleeps until the configured local run time, triggers the day's batch and
//! repeats. The run time and time zone are re-read before every wait so a
//! configuration change applies from the next day on.

use crate::error::Result;
use crate::trigger::AnalysisService;
use chrono::{DateTime, Days, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use research_core::Run;
use std::time::Duration;
use tracing::{error, info, warn};

const ONE_DAY: Duration = Duration::from_secs(24 * 3600);

/// Triggers one daily run per local calendar day
pub struct DailyScheduler {
    service: AnalysisService,
}

impl DailyScheduler {
    pub fn new(service: AnalysisService) -> Self {
        Self { service }
    }

    /// Time from `now` until the next `run_time` in `tz`.
    ///
    /// A run time that falls into a daylight-saving gap moves one hour later;
    /// an ambiguous one resolves to its first occurrence.
    pub fn duration_until(now: DateTime<Utc>, run_time: NaiveTime, tz: Tz) -> Duration {
        let today = now.with_timezone(&tz).date_naive();

        for offset in 0..=2 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            match resolve_local(tz, date.and_time(run_time)) {
                Some(target) if target > now => {
                    return (target - now).to_std().unwrap_or(Duration::ZERO);
                },
                _ => {},
            }
        }

        ONE_DAY
    }

    /// Run forever, triggering the daily batch at the configured time
    pub async fn run(&self) -> Result<()> {
        info!("Daily scheduler started");

        loop {
            let config = self.service.database().load_or_create_config().await?;
            let wait = Self::duration_until(Utc::now(), config.run_time()?, config.tz()?);
            info!(
                run_time = %config.daily_run_time_local,
                time_zone = %config.time_zone,
                "Next daily run in {} hours {} minutes",
                wait.as_secs() / 3600,
                (wait.as_secs() % 3600) / 60
            );

            tokio::time::sleep(wait).await;

            if let Err(e) = self.fire().await {
                error!(error = %e, "Scheduled daily run could not be started");
            }
        }
    }

    /// Trigger today's run. An already active run for the day is logged and
    /// yields `None`.
    pub async fn fire(&self) -> Result<Option<Run>> {
        match self.service.trigger_daily_run_today().await {
            Ok((run, _handle)) => {
                info!(run_id = run.id, run_date = %run.run_date, "Scheduled daily run started");
                Ok(Some(run))
            },
            Err(e) if e.is_duplicate_run() => {
                warn!(error = %e, "Daily run already active, skipping");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }
}

fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(local + TimeDelta::hours(1)))
                .earliest()
        })
        .map(|t| t.with_timezone(&Utc))
}
