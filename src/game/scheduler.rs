//! Fixed-rate tick task owned by a match

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Cancellation capability for a running tick task.
///
/// Dropping the handle cancels the task as well; `cancel` consumes it, so a
/// task can only be cancelled once.
pub struct TickHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TickHandle {
    /// Stop the task. No tick callback starts after this returns.
    pub fn cancel(self) {
        drop(self);
    }

    /// True once the task has exited or been aborted
    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.task.abort();
    }
}

/// Spawn a task that calls `on_tick` once per `period` until it returns
/// `ControlFlow::Break` or the returned handle is cancelled.
///
/// The first call happens one full period after spawning. Late firings are
/// skipped rather than replayed in a burst.
pub fn spawn_ticker<F>(period: Duration, mut on_tick: F) -> TickHandle
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval() completes its first tick immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if flag.load(Ordering::Acquire) {
                break;
            }

            if on_tick().is_break() {
                break;
            }
        }
    });

    TickHandle { cancelled, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    const PERIOD: Duration = Duration::from_millis(10);

    fn counting_ticker() -> (TickHandle, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        let handle = spawn_ticker(PERIOD, move || {
            seen.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        });
        (handle, count)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_period() {
        let (handle, count) = counting_ticker();

        tokio::time::sleep(PERIOD * 5 + PERIOD / 2).await;

        assert_eq!(count.load(Ordering::SeqCst), 5);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn no_firing_after_cancel() {
        let (handle, count) = counting_ticker();

        tokio::time::sleep(PERIOD * 3 + PERIOD / 2).await;
        handle.cancel();
        let at_cancel = count.load(Ordering::SeqCst);

        tokio::time::sleep(PERIOD * 20).await;

        assert_eq!(at_cancel, 3);
        assert_eq!(count.load(Ordering::SeqCst), at_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn break_ends_the_task() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        let handle = spawn_ticker(PERIOD, move || {
            if seen.fetch_add(1, Ordering::SeqCst) == 1 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(PERIOD * 10).await;
        tokio::task::yield_now().await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let (handle, count) = counting_ticker();
        drop(handle);

        tokio::time::sleep(PERIOD * 10).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
