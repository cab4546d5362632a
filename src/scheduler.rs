//! Time-based triggers for the three scheduled flows.
//!
//! Three cron expressions (6-field, seconds first) are parsed and validated
//! at startup and evaluated in the configured IANA timezone, so prompts land
//! at the user's wall-clock evening across DST changes. The run loop sleeps
//! until the earliest upcoming fire, dispatches that flow, and re-plans from
//! the fire time. A failed flow is logged and never stops the loop.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::config::ScheduleConfig;
use crate::error::SchedulerError;
use crate::session::ConversationController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    DailyPrompt,
    WeeklyRecap,
    StretchCheck,
}

impl ScheduledJob {
    fn name(&self) -> &'static str {
        match self {
            ScheduledJob::DailyPrompt => "daily prompt",
            ScheduledJob::WeeklyRecap => "weekly recap",
            ScheduledJob::StretchCheck => "stretch check",
        }
    }
}

#[derive(Debug)]
pub struct Scheduler {
    timezone: Tz,
    triggers: Vec<(ScheduledJob, Schedule)>,
}

impl Scheduler {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, SchedulerError> {
        let parse = |name: &str, expr: &str| {
            Schedule::from_str(expr).map_err(|e| SchedulerError::InvalidCron {
                name: name.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            timezone: config.timezone,
            triggers: vec![
                (
                    ScheduledJob::DailyPrompt,
                    parse("daily prompt", &config.daily_cron)?,
                ),
                (
                    ScheduledJob::WeeklyRecap,
                    parse("weekly recap", &config.weekly_cron)?,
                ),
                (
                    ScheduledJob::StretchCheck,
                    parse("stretch check", &config.stretch_cron)?,
                ),
            ],
        })
    }

    /// Earliest upcoming fire strictly after `after`, in the configured
    /// timezone. Ties go to the trigger listed first.
    pub fn next_fire(&self, after: DateTime<Tz>) -> Option<(ScheduledJob, DateTime<Tz>)> {
        self.triggers
            .iter()
            .filter_map(|(job, schedule)| {
                schedule.after(&after).next().map(|when| (*job, when))
            })
            .min_by_key(|(_, when)| *when)
    }

    /// Sleep-and-dispatch forever. Flow failures are logged; only a schedule
    /// with no future fires ends the loop.
    pub async fn run(self, controller: Arc<ConversationController>) {
        let mut after = Utc::now().with_timezone(&self.timezone);

        loop {
            let Some((job, when)) = self.next_fire(after) else {
                tracing::warn!("no upcoming scheduled fires, scheduler stopping");
                return;
            };
            let wait = when
                .signed_duration_since(Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            tracing::info!(job = job.name(), fire_at = %when, "next scheduled fire");
            tokio::time::sleep(wait).await;

            let result = match job {
                ScheduledJob::DailyPrompt => controller.send_daily_prompt().await,
                ScheduledJob::WeeklyRecap => controller.send_weekly_recap().await,
                ScheduledJob::StretchCheck => controller.send_stretch_check(false).await,
            };
            if let Err(error) = result {
                tracing::error!(job = job.name(), %error, "scheduled flow failed");
            }

            after = when;
        }
    }
}
