use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a running refresh loop. Dropping it also stops the loop.
pub struct RefreshHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop scheduling refreshes. A refresh already running finishes.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Cancel and wait for the loop to exit
    pub async fn stop(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "refresh loop ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Run `refresh` immediately and then every `period` until cancelled.
///
/// Refreshes never overlap: a slow refresh delays the next tick instead of
/// running concurrently with it.
pub fn spawn_refresh_loop<F, Fut>(period: Duration, mut refresh: F) -> RefreshHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (cancel, mut cancelled) = watch::channel(false);
    let period = period.max(MIN_PERIOD);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = cancelled.changed() => {
                    // Sender dropped or cancel requested
                    if changed.is_err() || *cancelled.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if *cancelled.borrow() {
                break;
            }

            // Outside the select so cancellation never interrupts it
            refresh().await;
        }
        debug!("refresh loop stopped");
    });

    RefreshHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_on_every_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = spawn_refresh_loop(Duration::from_secs(10), counting(&count));

        tokio::time::sleep(Duration::from_secs(25)).await;
        // t = 0, 10, 20
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_refreshes() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = spawn_refresh_loop(Duration::from_secs(10), counting(&count));

        tokio::time::sleep(Duration::from_secs(15)).await;
        handle.stop().await;
        let seen = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_refresh_completes() {
        let started = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let (s, c) = (Arc::clone(&started), Arc::clone(&completed));

        let handle = spawn_refresh_loop(Duration::from_secs(10), move || {
            let (s, c) = (Arc::clone(&s), Arc::clone(&c));
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(completed.load(Ordering::SeqCst), 0);

        handle.stop().await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_ends_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = spawn_refresh_loop(Duration::from_secs(1), counting(&count));
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
