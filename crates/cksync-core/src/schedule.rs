//! Recurring job loops
//!
//! Two timing primitives, each an infinite, single-responsibility loop:
//! a fixed-interval repeat (optionally deferring the first run by one
//! interval) and a daily run at a fixed clock time in a fixed UTC offset.
//!
//! Loops are immortal by construction: every job invocation is wrapped so
//! that a failing job is logged and the loop keeps going, and a failure in
//! the scheduling computation itself falls back to a short sleep instead of
//! terminating. One job's failure never affects another loop.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Sleep applied when the daily scheduling computation itself fails
const FALLBACK_SLEEP: Duration = Duration::from_secs(60);

/// Whether an interval loop runs its job immediately or one interval in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRun {
    /// Run the job right away, then every interval
    Immediate,
    /// Sleep one interval before the first run
    Deferred,
}

/// Run `job` forever on a fixed interval.
///
/// The future never resolves; spawn it. Job errors are logged and do not
/// stop the loop.
pub async fn run_every<F, Fut>(name: &str, every: Duration, first_run: FirstRun, job: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = crate::Result<()>>,
{
    if first_run == FirstRun::Deferred {
        info!("{name}: first run in {}s", every.as_secs());
        tokio::time::sleep(every).await;
    }

    loop {
        run_job(name, &job).await;
        tokio::time::sleep(every).await;
    }
}

/// Run `job` forever, once a day at `hour:minute` in the given UTC offset.
///
/// A target time already past today rolls to the same time tomorrow. The
/// future never resolves; spawn it.
pub async fn run_daily_at<F, Fut>(name: &str, hour: u32, minute: u32, offset: FixedOffset, job: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = crate::Result<()>>,
{
    loop {
        let now = Utc::now().with_timezone(&offset);
        let Some(next) = next_daily_run(now, hour, minute) else {
            error!("{name}: cannot schedule at {hour:02}:{minute:02}, retrying in 60s");
            tokio::time::sleep(FALLBACK_SLEEP).await;
            continue;
        };

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(
            "{name}: next run at {} ({}s from now)",
            next.format("%Y-%m-%d %H:%M:%S"),
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;

        run_job(name, &job).await;
    }
}

/// Compute the next occurrence of `hour:minute` strictly after `now` or at
/// `now` itself; a time already past rolls to the following day. Returns
/// `None` for an out-of-range clock time.
pub fn next_daily_run(
    now: DateTime<FixedOffset>,
    hour: u32,
    minute: u32,
) -> Option<DateTime<FixedOffset>> {
    let today = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)?
        .and_local_timezone(*now.offset())
        .single()?;

    if today < now {
        Some(today + ChronoDuration::days(1))
    } else {
        Some(today)
    }
}

/// Run one job invocation, capturing its failure at the call site.
async fn run_job<F, Fut>(name: &str, job: &F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = crate::Result<()>>,
{
    if let Err(e) = job().await {
        warn!("{name} failed: {e}");
    }
}
