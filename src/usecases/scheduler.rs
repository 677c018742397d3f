//! Digest scheduler (daemon): push the operator digest once a day.
//!
//! Fires at `weekday_time` Monday to Friday and at `weekend_time` on Saturday and Sunday,
//! local time. Uses tokio::time::sleep; a failed digest is logged and the loop goes on.

use crate::ports::NotifierPort;
use crate::usecases::digest_service::DigestService;
use chrono::{Datelike, Days, Local, NaiveDateTime, NaiveTime, Weekday};
use std::sync::Arc;
use tracing::{info, warn};

/// Firing time of a day.
fn fire_time(weekday: Weekday, weekday_time: NaiveTime, weekend_time: NaiveTime) -> NaiveTime {
    match weekday {
        Weekday::Sat | Weekday::Sun => weekend_time,
        _ => weekday_time,
    }
}

/// First firing moment strictly after `now`.
pub fn next_fire(now: NaiveDateTime, weekday_time: NaiveTime, weekend_time: NaiveTime) -> NaiveDateTime {
    let today = now.date();
    for offset in 0..=2u64 {
        let Some(day) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        let candidate = day.and_time(fire_time(day.weekday(), weekday_time, weekend_time));
        if candidate > now {
            return candidate;
        }
    }
    // Only reachable at the very end of the calendar.
    now
}

/// Sends the digest on schedule until the process exits.
pub struct DigestScheduler {
    digest: Arc<DigestService>,
    notifier: Arc<dyn NotifierPort>,
    weekday_time: NaiveTime,
    weekend_time: NaiveTime,
}

impl DigestScheduler {
    pub fn new(
        digest: Arc<DigestService>,
        notifier: Arc<dyn NotifierPort>,
        weekday_time: NaiveTime,
        weekend_time: NaiveTime,
    ) -> Self {
        Self {
            digest,
            notifier,
            weekday_time,
            weekend_time,
        }
    }

    pub async fn run_loop(&self) {
        info!(
            weekday = %self.weekday_time,
            weekend = %self.weekend_time,
            "digest scheduler started"
        );
        loop {
            let now = Local::now().naive_local();
            let fire_at = next_fire(now, self.weekday_time, self.weekend_time);
            let wait = (fire_at - now).to_std().unwrap_or_default();
            info!(fire_at = %fire_at, wait_secs = wait.as_secs(), "next digest scheduled");
            tokio::time::sleep(wait).await;

            let today = Local::now().date_naive();
            if let Err(e) = self.digest.send(self.notifier.as_ref(), today).await {
                warn!(error = %e, "scheduled digest not delivered");
            }
        }
    }
}
