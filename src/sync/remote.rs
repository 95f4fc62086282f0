//! Seams to the authoritative record store and the host's connectivity signal.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::cache::Record;
use crate::error::Result;

/// The authoritative record store, reachable only while online.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the records of `table` whose keys are in `ids`.
    async fn fetch_by_ids(&self, table: &str, ids: &[String]) -> Result<Vec<Record>>;

    /// Fetches up to `limit` records of `table`.
    async fn fetch_first_n(&self, table: &str, limit: usize) -> Result<Vec<Record>>;
}

/// Online/offline signal supplied by the host.
pub trait Connectivity: Send + Sync {
    /// Current connectivity.
    fn is_online(&self) -> bool;

    /// Receiver that observes every transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity flag the host flips as the network comes and goes.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Publishes the current state. Unchanged values do not notify.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl Connectivity for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_reports_state() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(!monitor.is_online());

        monitor.set_online(true);
        assert!(monitor.is_online());
    }

    #[test]
    fn test_monitor_notifies_on_change_only() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        {
            let mut changed = tokio_test::task::spawn(rx.changed());
            monitor.set_online(false);
            tokio_test::assert_pending!(changed.poll());

            monitor.set_online(true);
            assert!(changed.is_woken());
            tokio_test::assert_ready_ok!(changed.poll());
        }
        assert!(*rx.borrow_and_update());
    }
}
