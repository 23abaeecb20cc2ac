//! Run a job now, then on a fixed period.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Run `job` immediately and then every `period`, forever.
///
/// Runs never overlap: a run that outlasts the period delays the next tick
/// instead of queueing a burst. A failed run is logged and the schedule
/// continues.
pub async fn run_every<F, Fut>(period: Duration, job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    run_ticks(period, job, None).await
}

async fn run_ticks<F, Fut>(period: Duration, mut job: F, max_runs: Option<usize>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut runs = 0usize;
    loop {
        // The first tick completes immediately.
        ticker.tick().await;

        if let Err(e) = job().await {
            error!(error = format!("{:#}", e), "run failed");
        }
        runs += 1;
        if max_runs.is_some_and(|max| runs >= max) {
            return;
        }

        if let Ok(period) = chrono::Duration::from_std(period) {
            info!(next_run = %(Utc::now() + period).to_rfc3339(), "next run scheduled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_first_run_is_immediate() {
        let start = Instant::now();
        let starts = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = starts.clone();
        run_ticks(
            Duration::from_secs(3600),
            move || {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().unwrap().push(Instant::now() - start);
                    Ok(())
                }
            },
            Some(3),
        )
        .await;

        let starts = starts.lock().unwrap();
        assert_eq!(
            *starts,
            vec![
                Duration::ZERO,
                Duration::from_secs(3600),
                Duration::from_secs(7200)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_keeps_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        run_ticks(
            Duration::from_secs(60),
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        bail!("provider unreachable");
                    }
                    Ok(())
                }
            },
            Some(2),
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_delays_next_run() {
        let start = Instant::now();
        let starts = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = starts.clone();
        run_ticks(
            Duration::from_secs(10),
            move || {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().unwrap().push(Instant::now() - start);
                    tokio::time::sleep(Duration::from_secs(25)).await;
                    Ok(())
                }
            },
            Some(3),
        )
        .await;

        let starts = starts.lock().unwrap();
        // No overlap: each run starts only after the previous one ended.
        assert_eq!(
            *starts,
            vec![
                Duration::ZERO,
                Duration::from_secs(25),
                Duration::from_secs(50)
            ]
        );
    }
}
