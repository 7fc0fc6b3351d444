use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tracing::info;

use crate::config::ScheduleSection;

/// Next occurrence of `hour:minute` strictly after `now`, in local time.
/// Skips forward over nonexistent local times (DST gaps).
pub fn next_run_after<Tz: TimeZone>(
    now: DateTime<Tz>,
    hour: u32,
    minute: u32,
) -> DateTime<Tz> {
    let hour = hour.min(23);
    let minute = minute.min(59);
    let mut date = now.date_naive();
    loop {
        if let Some(naive) = date.and_hms_opt(hour, minute, 0) {
            if let Some(candidate) = now.timezone().from_local_datetime(&naive).earliest() {
                if candidate > now {
                    return candidate;
                }
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => return now,
        };
    }
}

/// Runs a job once per day at the configured local time, forever. The
/// process is expected to stay resident (service or background task).
#[derive(Debug, Clone)]
pub struct DailyScheduler {
    hour: u32,
    minute: u32,
}

impl DailyScheduler {
    pub fn new(schedule: &ScheduleSection) -> Self {
        Self {
            hour: schedule.hour,
            minute: schedule.minute,
        }
    }

    pub async fn run<F, Fut>(&self, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            let now = Local::now();
            let next = next_run_after(now, self.hour, self.minute);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next = %next.format("%Y-%m-%d %H:%M"), "scheduler sleeping until next run");
            tokio::time::sleep(wait).await;
            info!("daily scrape started");
            job().await;
            info!("daily scrape finished");
        }
    }
}
