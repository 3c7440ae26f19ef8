use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A panel's auto-refresh timer. The job runs once immediately and then every
/// `period`; dropping the handle stops it.
#[derive(Debug)]
pub struct RefreshHandle {
    name: &'static str,
    period: Duration,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Option<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            tracing::debug!(panel = name, "auto-refresh disabled");
            return None;
        }

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // A slow job delays the next run instead of queueing a burst.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tracing::trace!(panel = name, "auto-refresh tick");
                job().await;
            }
        });
        tracing::debug!(panel = name, period_secs = period.as_secs(), "auto-refresh scheduled");

        Some(Self { name, period, task })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {}
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(panel = self.name, "auto-refresh cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_mount_and_then_every_period() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = RefreshHandle::spawn("news", Duration::from_secs(60), counting(&runs)).unwrap();

        sleep(Duration::from_millis(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert_eq!(handle.name(), "news");
        assert_eq!(handle.period(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_stops_future_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = RefreshHandle::spawn("indices", Duration::from_secs(600), counting(&runs)).unwrap();
        sleep(Duration::from_millis(1)).await;

        handle.cancel();
        sleep(Duration::from_secs(3_600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_task() {
        let runs = Arc::new(AtomicUsize::new(0));
        {
            let _handle =
                RefreshHandle::spawn("portfolio", Duration::from_secs(30), counting(&runs)).unwrap();
            sleep(Duration::from_millis(1)).await;
        }
        sleep(Duration::from_secs(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_period_disables_the_timer() {
        let runs = Arc::new(AtomicUsize::new(0));
        assert!(RefreshHandle::spawn("sentiment", Duration::ZERO, counting(&runs)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_jobs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let handle = {
            let (active, peak, runs) = (active.clone(), peak.clone(), runs.clone());
            RefreshHandle::spawn("news", Duration::from_secs(30), move || {
                let (active, peak, runs) = (active.clone(), peak.clone(), runs.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_secs(75)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap()
        };

        sleep(Duration::from_secs(400)).await;
        drop(handle);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }
}
