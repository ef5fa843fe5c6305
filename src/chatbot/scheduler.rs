//! Daily timer for the reminder pass.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Runs a job once at start and then at every occurrence of a cron schedule.
///
/// The loop wakes every `poll` and runs the job if the next occurrence has
/// passed, so a trigger fires up to one poll late. Dropping the handle stops
/// the loop.
pub struct Scheduler {
    cancel: Arc<Notify>,
}

impl Scheduler {
    pub fn start<F, Fut>(schedule: Schedule, tz: Tz, poll: Duration, job: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = Arc::new(Notify::new());
        let cancel_clone = cancel.clone();

        tokio::spawn(async move {
            info!("✓ Running initial reminder check");
            run_job(job()).await;

            let mut next = next_occurrence(&schedule, &Utc::now().with_timezone(&tz));
            let mut interval = tokio::time::interval(poll);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel_clone.notified() => {
                        info!("🛑 Scheduler stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = Utc::now().with_timezone(&tz);
                        if let Some(at) = next
                            && now >= at
                        {
                            run_job(job()).await;
                            next = next_occurrence(&schedule, &now);
                        }
                    }
                }
            }
        });

        Self { cancel }
    }

    /// Stop the loop. Same as dropping the handle.
    pub fn stop(self) {}
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.notify_one();
    }
}

/// Run one job on its own task so a panic is logged instead of ending the loop.
async fn run_job<Fut>(job: Fut)
where
    Fut: Future<Output = ()> + Send + 'static,
{
    if let Err(e) = tokio::spawn(job).await {
        error!("Reminder job failed: {e}");
    }
}

fn next_occurrence(schedule: &Schedule, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let next = schedule.after(after).next();
    match next {
        Some(ref at) => info!("⏰ Next reminder check at {at}"),
        None => info!("No future reminder check in schedule"),
    }
    next
}
