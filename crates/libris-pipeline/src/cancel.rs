//! Cooperative cancellation signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A clonable cancellation flag.
///
/// The engine observes it between steps, between retries, and races it
/// against in-flight step futures. Firing is sticky: once cancelled, always
/// cancelled.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. All current and future waiters resolve.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the signal fires. Registration happens before the flag
    /// re-check, so a concurrent `cancel` is never missed.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn starts_unfired() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
    }

    #[tokio::test]
    async fn fires_for_waiters() {
        let signal = CancelSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter resolved")
            .unwrap();
    }

    #[tokio::test]
    async fn resolves_immediately_when_already_fired() {
        let signal = CancelSignal::new();
        signal.cancel();
        tokio::time::timeout(Duration::from_millis(50), signal.cancelled())
            .await
            .expect("already-fired signal resolves at once");
        assert!(signal.is_cancelled());
    }
}
