//! Inactivity timer service.
//!
//! A session owns one timer. Every render disarms it before arming a new
//! one, so at most one callback is pending per session. A callback that
//! was already due when it got cancelled still checks its cancel flag, and
//! the session additionally ignores firings from stale generations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

pub trait TimerService: Send {
    /// Schedule `callback` after `after`, replacing any pending one.
    fn arm(&mut self, after: Duration, callback: TimerCallback);
    /// Cancel the pending callback, if any.
    fn disarm(&mut self);
}

/// Timer that never fires. For hosts without an inactivity prompt.
#[derive(Debug, Default)]
pub struct NoTimer;

impl TimerService for NoTimer {
    fn arm(&mut self, _after: Duration, _callback: TimerCallback) {}
    fn disarm(&mut self) {}
}

/// Timer backed by a tokio task per arming.
pub struct TokioTimer {
    runtime: Handle,
    pending: Option<(JoinHandle<()>, Arc<AtomicBool>)>,
}

impl TokioTimer {
    pub fn new(runtime: Handle) -> Self {
        TokioTimer {
            runtime,
            pending: None,
        }
    }

    /// Timer on the runtime of the calling context, if there is one.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|(task, _)| !task.is_finished())
    }
}

impl TimerService for TokioTimer {
    fn arm(&mut self, after: Duration, callback: TimerCallback) {
        self.disarm();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }
            // the callback blocks on the session lock
            if let Err(e) = tokio::task::spawn_blocking(callback).await {
                tracing::error!(error = %e, "timer callback panicked");
            }
        });
        self.pending = Some((task, cancelled));
    }

    fn disarm(&mut self) {
        if let Some((task, cancelled)) = self.pending.take() {
            cancelled.store(true, Ordering::SeqCst);
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, TimerCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        (
            hits,
            Box::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[tokio::test]
    async fn fires_once_after_delay() {
        let mut timer = TokioTimer::current().unwrap();
        let (hits, cb) = counter();
        timer.arm(Duration::from_millis(10), cb);
        assert!(timer.is_armed());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test]
    async fn rearming_replaces_pending_callback() {
        let mut timer = TokioTimer::current().unwrap();
        let (first, cb1) = counter();
        let (second, cb2) = counter();
        timer.arm(Duration::from_millis(30), cb1);
        timer.arm(Duration::from_millis(30), cb2);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disarm_cancels() {
        let mut timer = TokioTimer::current().unwrap();
        let (hits, cb) = counter();
        timer.arm(Duration::from_millis(30), cb);
        timer.disarm();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!timer.is_armed());
    }
}
