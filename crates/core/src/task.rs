//! Scheduled-task plumbing shared by the polling loops.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A named fixed-interval polling loop with explicit start/stop.
///
/// One active timer per service: the task is spawned on construction, ticks run
/// sequentially (a slow tick delays the next one instead of overlapping it), and
/// `stop` cancels the timer without force-cancelling I/O already in flight.
pub struct ScheduledTask {
    name: &'static str,
    period: Duration,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
}

impl ScheduledTask {
    /// Spawn the loop. The first tick fires immediately.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, tick: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = running.clone();

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => tick().await,
                    _ = shutdown_rx.changed() => break,
                }
            }

            running_flag.store(false, Ordering::SeqCst);
            debug!(task = name, "Polling loop exited");
        });

        info!(task = name, period_ms = period.as_millis() as u64, "Polling loop started");

        Self {
            name,
            period,
            shutdown,
            handle: Mutex::new(Some(handle)),
            running,
        }
    }

    /// Cancel the timer and wait for the loop to drain.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
        info!(task = self.name, "Polling loop stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Run `f` for every item, catching and logging each failure.
///
/// One item's error never aborts the batch. Returns `(ok, failed)` counts.
pub async fn for_each_isolated<'a, T, F, Fut, E>(label: &str, items: &'a [T], f: F) -> (usize, usize)
where
    T: std::fmt::Display,
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<(), E>> + 'a,
    E: std::fmt::Display,
{
    let mut ok = 0;
    let mut failed = 0;

    for item in items {
        match f(item).await {
            Ok(()) => ok += 1,
            Err(e) => {
                warn!(batch = label, item = %item, error = %e, "Item failed, continuing batch");
                failed += 1;
            }
        }
    }

    (ok, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn loop_ticks_and_stops() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = ScheduledTask::spawn("test", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        assert!(task.is_running());
        task.stop().await;
        assert!(!task.is_running());

        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 2, "expected at least 2 ticks, got {}", ticks);

        // No further ticks after stop.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test]
    async fn isolation_counts_failures() {
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let (ok, failed) = for_each_isolated("test", &items, |item| {
            let fail = item == "b";
            async move {
                if fail {
                    Err("boom")
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(ok, 2);
        assert_eq!(failed, 1);
    }
}
