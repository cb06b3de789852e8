mod http;
mod snapshot;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};

pub use http::{DeviceSettings, HttpDataSource};
pub use snapshot::{DeviceData, Snapshot};

/// Shared owner of a device's fetched data, observed by the entities of that device.
pub trait Coordinator: Send + Sync {
    fn data(&self) -> Arc<Snapshot>;

    /// Refresh unless one is already running, in which case its outcome is adopted.
    fn request_refresh(&self) -> impl Future<Output = ()> + Send;

    fn refresh(&self) -> impl Future<Output = ()> + Send;

    fn last_update_success(&self) -> bool;
}

pub trait DataSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = anyhow::Result<DeviceData>> + Send;
}

pub struct DataUpdateCoordinator<S> {
    name: String,
    source: S,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    last_update_success: AtomicBool,
    refresh_lock: Mutex<()>,
}

impl<S: DataSource> DataUpdateCoordinator<S> {
    pub fn new(name: impl Into<String>, source: S) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::default()));

        Self {
            name: name.into(),
            source,
            snapshot_tx,
            last_update_success: AtomicBool::new(true),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    async fn fetch_and_publish(&self) {
        match self.source.fetch().await {
            Ok(data) => {
                let mut version = 0;
                self.snapshot_tx.send_modify(|current| {
                    let next = current.next(data);
                    version = next.version();
                    *current = Arc::new(next);
                });
                self.last_update_success.store(true, Ordering::SeqCst);
                tracing::debug!(coordinator = %self.name, version, "Device data refreshed");
            }
            Err(e) => {
                self.last_update_success.store(false, Ordering::SeqCst);
                tracing::warn!(coordinator = %self.name, "Error refreshing device data: {:?}", e);
            }
        }
    }
}

impl<S: DataSource> Coordinator for DataUpdateCoordinator<S> {
    fn data(&self) -> Arc<Snapshot> {
        self.snapshot_tx.borrow().clone()
    }

    async fn request_refresh(&self) {
        match self.refresh_lock.try_lock() {
            Ok(_guard) => self.fetch_and_publish().await,
            Err(_) => {
                tracing::trace!(coordinator = %self.name, "Refresh in flight, waiting for it");
                let _guard = self.refresh_lock.lock().await;
            }
        }
    }

    async fn refresh(&self) {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_publish().await;
    }

    fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
pub mod test {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    pub fn boost_data(ww1boost: f64) -> DeviceData {
        DeviceData::default()
            .with_section("setup", json!({ "ww1boost": ww1boost }))
            .with_section("info", json!({ "sn": "1601002104230001", "device": "AC ELWA-E" }))
    }

    /// Coordinator whose refresh outcomes are scripted. Each refresh pops the next outcome;
    /// `Some(data)` publishes a new snapshot, `None` fails. When the script runs dry refreshes succeed
    /// without new data.
    pub struct FakeCoordinator {
        snapshot: Mutex<Arc<Snapshot>>,
        outcomes: Mutex<VecDeque<Option<DeviceData>>>,
        success: AtomicBool,
        refreshes: Mutex<u32>,
    }

    impl FakeCoordinator {
        pub fn new(data: DeviceData) -> Self {
            Self {
                snapshot: Mutex::new(Arc::new(Snapshot::new(1, data))),
                outcomes: Mutex::new(VecDeque::new()),
                success: AtomicBool::new(true),
                refreshes: Mutex::new(0),
            }
        }

        pub fn push_success(&self, data: DeviceData) {
            self.outcomes.lock().unwrap().push_back(Some(data));
        }

        pub fn push_failure(&self) {
            self.outcomes.lock().unwrap().push_back(None);
        }

        pub fn refreshes(&self) -> u32 {
            *self.refreshes.lock().unwrap()
        }

        fn apply_next_outcome(&self) {
            *self.refreshes.lock().unwrap() += 1;
            let outcome = self.outcomes.lock().unwrap().pop_front();
            match outcome {
                Some(Some(data)) => {
                    let mut snapshot = self.snapshot.lock().unwrap();
                    *snapshot = Arc::new(snapshot.next(data));
                    self.success.store(true, Ordering::SeqCst);
                }
                Some(None) => self.success.store(false, Ordering::SeqCst),
                None => self.success.store(true, Ordering::SeqCst),
            }
        }
    }

    impl Coordinator for FakeCoordinator {
        fn data(&self) -> Arc<Snapshot> {
            self.snapshot.lock().unwrap().clone()
        }

        async fn request_refresh(&self) {
            self.apply_next_outcome();
        }

        async fn refresh(&self) {
            self.apply_next_outcome();
        }

        fn last_update_success(&self) -> bool {
            self.success.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use tokio::sync::Notify;

    use super::test::boost_data;
    use super::*;

    #[derive(Default)]
    struct ScriptedSource {
        results: StdMutex<VecDeque<anyhow::Result<DeviceData>>>,
    }

    impl ScriptedSource {
        fn with(results: Vec<anyhow::Result<DeviceData>>) -> Self {
            Self {
                results: StdMutex::new(results.into()),
            }
        }
    }

    impl DataSource for ScriptedSource {
        async fn fetch(&self) -> anyhow::Result<DeviceData> {
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no more results")))
        }
    }

    #[derive(Default)]
    struct GatedSource {
        started: Notify,
        gate: Notify,
        calls: StdMutex<u32>,
    }

    impl DataSource for Arc<GatedSource> {
        async fn fetch(&self) -> anyhow::Result<DeviceData> {
            *self.calls.lock().unwrap() += 1;
            self.started.notify_one();
            self.gate.notified().await;
            Ok(boost_data(600.0))
        }
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_empty() {
        let coordinator = DataUpdateCoordinator::new("elwa", ScriptedSource::default());

        assert_eq!(coordinator.name(), "elwa");

        assert_eq!(coordinator.data().version(), 0);
        assert_eq!(coordinator.data().data(), &DeviceData::default());
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn test_successful_refresh_publishes_next_version() {
        let coordinator = DataUpdateCoordinator::new(
            "elwa",
            ScriptedSource::with(vec![Ok(boost_data(550.0)), Ok(boost_data(600.0))]),
        );

        coordinator.refresh().await;
        assert_eq!(coordinator.data().version(), 1);
        assert_eq!(coordinator.data().data().get_f64("setup", "ww1boost"), Some(550.0));

        coordinator.refresh().await;
        assert_eq!(coordinator.data().version(), 2);
        assert_eq!(coordinator.data().data().get_f64("setup", "ww1boost"), Some(600.0));
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let coordinator = DataUpdateCoordinator::new(
            "elwa",
            ScriptedSource::with(vec![Ok(boost_data(550.0)), Err(anyhow::anyhow!("connection refused"))]),
        );

        coordinator.refresh().await;
        let before = coordinator.data();

        coordinator.refresh().await;

        assert!(!coordinator.last_update_success());
        assert_eq!(coordinator.data().version(), before.version());
        assert_eq!(coordinator.data().data(), before.data());
    }

    #[tokio::test]
    async fn test_readers_keep_the_snapshot_they_read() {
        let coordinator = DataUpdateCoordinator::new(
            "elwa",
            ScriptedSource::with(vec![Ok(boost_data(550.0)), Ok(boost_data(600.0))]),
        );

        coordinator.refresh().await;
        let held = coordinator.data();
        coordinator.refresh().await;

        assert_eq!(held.version(), 1);
        assert_eq!(held.data().get_f64("setup", "ww1boost"), Some(550.0));
    }

    #[tokio::test]
    async fn test_subscribers_see_new_snapshots() {
        let coordinator = DataUpdateCoordinator::new("elwa", ScriptedSource::with(vec![Ok(boost_data(550.0))]));
        let mut rx = coordinator.subscribe();

        coordinator.request_refresh().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().version(), 1);
    }

    #[tokio::test]
    async fn test_request_refresh_joins_in_flight_fetch() {
        let source = Arc::new(GatedSource::default());
        let coordinator = Arc::new(DataUpdateCoordinator::new("elwa", source.clone()));

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.refresh().await }
        });
        source.started.notified().await;

        let second = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request_refresh().await }
        });
        tokio::task::yield_now().await;

        source.gate.notify_one();
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(*source.calls.lock().unwrap(), 1);
        assert_eq!(coordinator.data().version(), 1);
        assert!(coordinator.last_update_success());
    }
}
