//! Tracking of exchanges running on their own tasks.
//!
//! Exchanges are detached from the client connection, so the server's
//! graceful shutdown does not see them once their client has gone. The
//! tracker lets shutdown wait for their records before the sink closes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Counts live exchanges. Each one holds an [`ExchangeGuard`] until its
/// record has been emitted or its error returned.
#[derive(Debug, Clone)]
pub struct ExchangeTracker {
    tx: Arc<watch::Sender<()>>,
}

/// Marks one exchange as in flight until dropped.
#[derive(Debug)]
pub struct ExchangeGuard {
    _rx: watch::Receiver<()>,
}

impl ExchangeTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(());
        Self { tx: Arc::new(tx) }
    }

    pub fn track(&self) -> ExchangeGuard {
        ExchangeGuard {
            _rx: self.tx.subscribe(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait until no guard is alive. Returns `false` if `timeout` elapsed first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.tx.closed()).await.is_ok()
    }
}

impl Default for ExchangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_idle_tracker_returns_immediately() {
        let tracker = ExchangeTracker::new();
        assert_eq!(tracker.active_count(), 0);
        assert!(tracker.wait_idle(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_waits_for_guards_to_drop() {
        let tracker = ExchangeTracker::new();
        let guard = tracker.track();
        let other = tracker.clone().track();
        assert_eq!(tracker.active_count(), 2);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
            drop(other);
        });

        assert!(tracker.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_gives_up_after_timeout() {
        let tracker = ExchangeTracker::new();
        let _guard = tracker.track();
        assert!(!tracker.wait_idle(Duration::from_millis(20)).await);
    }
}
