//! Connectivity supervisor — replays the cache when the host comes back online.
//!
//! The host reports every connectivity change it sees on a bounded
//! [`tokio::sync::mpsc`] channel. [`RetrySupervisor`] consumes the reports in
//! order and dispatches exactly one `RETRY_ALL` per offline → online
//! transition, including transitions that are undone before the supervisor
//! gets scheduled. What the replayed actions do downstream (re-issue a
//! request, show a toast) is up to the application reducer and middleware.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::action::creators;
use crate::store::SharedStore;

/// Host connectivity as reported by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Online,
    Offline,
}

/// Dispatches `RETRY_ALL` whenever connectivity is restored.
///
/// # Examples
///
/// ```rust,no_run
/// use retrace::{Config, SharedStore, Store};
/// use retrace::supervisor::{Connectivity, RetrySupervisor};
/// use tokio::sync::mpsc;
///
/// # async fn demo() {
/// let store = SharedStore::new(Store::<()>::builder(Config::new().cacheable("FETCH")).build());
/// let (tx, rx) = mpsc::channel(16);
/// let handle = tokio::spawn(RetrySupervisor::new(store.clone(), Connectivity::Offline, rx).run());
///
/// tx.send(Connectivity::Online).await.unwrap(); // cached actions are replayed
/// drop(tx);
/// let retries = handle.await.unwrap();
/// # }
/// ```
pub struct RetrySupervisor<S> {
    store: SharedStore<S>,
    reports: mpsc::Receiver<Connectivity>,
    last: Connectivity,
}

impl<S> RetrySupervisor<S>
where
    S: Default + 'static,
{
    /// Creates a supervisor over `store`.
    ///
    /// # Arguments
    ///
    /// - `store` — the store to dispatch `RETRY_ALL` into.
    /// - `initial` — connectivity at the time of construction. A first report
    ///   of `Online` retries only if this is `Offline`.
    /// - `reports` — every connectivity change, in the order observed.
    pub fn new(store: SharedStore<S>, initial: Connectivity, reports: mpsc::Receiver<Connectivity>) -> Self {
        Self {
            store,
            reports,
            last: initial,
        }
    }

    /// Consumes connectivity reports until every sender is dropped.
    ///
    /// Repeated reports of the same state are ignored.
    ///
    /// # Returns
    ///
    /// The number of `RETRY_ALL` actions dispatched.
    pub async fn run(mut self) -> usize {
        let mut last = self.last;
        let mut retries = 0;

        while let Some(current) = self.reports.recv().await {
            if current == last {
                continue;
            }
            info!(from = ?last, to = ?current, "connectivity changed");

            if last == Connectivity::Offline && current == Connectivity::Online {
                let pending = self.store.pending().await;
                debug!(pending, "retrying cached actions");
                self.store.dispatch(creators::retry_all()).await;
                retries += 1;
            }
            last = current;
        }

        debug!(retries, "connectivity channel closed, supervisor stopping");
        retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, RETRY_ALL};
    use crate::config::Config;
    use crate::store::Store;
    use std::sync::{Arc, Mutex};

    fn recording_store() -> (SharedStore<()>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let spy = Arc::clone(&seen);
        let store = Store::builder(Config::new().cacheable("FETCH"))
            .reducer(move |state: (), action: &Action| {
                spy.lock().unwrap().push(action.kind().to_owned());
                state
            })
            .build();
        (SharedStore::new(store), seen)
    }

    async fn supervise(store: SharedStore<()>, initial: Connectivity, reports: &[Connectivity]) -> usize {
        let (tx, rx) = mpsc::channel(8);
        for report in reports {
            tx.send(*report).await.unwrap();
        }
        drop(tx);
        RetrySupervisor::new(store, initial, rx).run().await
    }

    #[tokio::test]
    async fn retries_once_per_reconnect() {
        let (store, seen) = recording_store();
        store.dispatch(Action::new("FETCH").with_retry_id("a")).await;
        seen.lock().unwrap().clear();

        let retries = supervise(store.clone(), Connectivity::Offline, &[Connectivity::Online]).await;

        assert_eq!(retries, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["FETCH".to_owned(), RETRY_ALL.to_owned()]);
        assert_eq!(store.pending().await, 1);
    }

    #[tokio::test]
    async fn brief_reconnect_still_retries() {
        let (store, seen) = recording_store();
        store.dispatch(Action::new("FETCH").with_retry_id("a")).await;
        seen.lock().unwrap().clear();

        // online and back offline before the supervisor runs at all
        let retries = supervise(
            store,
            Connectivity::Offline,
            &[Connectivity::Online, Connectivity::Offline],
        )
        .await;

        assert_eq!(retries, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["FETCH".to_owned(), RETRY_ALL.to_owned()]);
    }

    #[tokio::test]
    async fn every_flap_retries() {
        use Connectivity::{Offline, Online};
        let (store, _seen) = recording_store();
        let retries = supervise(store, Online, &[Offline, Online, Offline, Offline, Online, Online]).await;
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn going_offline_does_not_retry() {
        let (store, seen) = recording_store();
        let retries = supervise(store, Connectivity::Online, &[Connectivity::Offline]).await;
        assert_eq!(retries, 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn staying_online_never_retries() {
        let (store, seen) = recording_store();
        let retries = supervise(store, Connectivity::Online, &[Connectivity::Online]).await;
        assert_eq!(retries, 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_reports_are_handled_while_running() {
        let (store, seen) = recording_store();
        store.dispatch(Action::new("FETCH").with_retry_id("a")).await;
        seen.lock().unwrap().clear();

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(RetrySupervisor::new(store.clone(), Connectivity::Offline, rx).run());

        tx.send(Connectivity::Online).await.unwrap();
        while seen.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        drop(tx);

        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(store.pending().await, 1);
    }
}
