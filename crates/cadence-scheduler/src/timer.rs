//! Timer trigger schedules.

use cadence_core::config::TimerConfig;
use cadence_core::{Error, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

/// A parsed timer trigger: the cron schedule plus the only-on-changes
/// suppression flag.
#[derive(Debug, Clone)]
pub struct TimerSchedule {
    schedule: Schedule,
    only_on_changes: bool,
}

impl TimerSchedule {
    pub fn parse(config: &TimerConfig) -> Result<Self> {
        let schedule = Schedule::from_str(&config.spec).map_err(|e| Error::InvalidTimerSpec {
            spec: config.spec.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            schedule,
            only_on_changes: config.only_on_changes,
        })
    }

    pub fn only_on_changes(&self) -> bool {
        self.only_on_changes
    }

    /// The next time the timer fires strictly after the given instant.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}
