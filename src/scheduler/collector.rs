//! Background historical collector
//!
//! After a startup delay the collector values every basket once per interval
//! and appends one snapshot per basket, all stamped with the pass start time.
//! A pass that fails outright is retried after a short backoff without
//! touching the regular interval. Stopping is signalled over a watch channel;
//! an in-flight pass finishes its current basket first.

use crate::baskets::Basket;
use crate::db::models::HistoricalSnapshot;
use crate::db::HistoryStore;
use crate::error::Result;
use crate::scheduler::status::{CollectorStatus, StatusTracker};
use crate::services::IndexService;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Status row identity of the collector
pub const DEFAULT_QUERIER_NAME: &str = "main_historical_querier";

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub name: String,
    pub interval: Duration,
    pub startup_delay: Duration,
    pub error_backoff: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_QUERIER_NAME.to_string(),
            interval: Duration::from_secs(15 * 60),
            startup_delay: Duration::from_secs(30),
            error_backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorState {
    Idle,
    Starting,
    Collecting,
    Sleeping,
    Backoff,
    Stopping,
    Stopped,
}

/// Outcome of one collection pass
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub timestamp: DateTime<Utc>,
    pub successful_count: usize,
    pub failed_count: usize,
    pub duration_seconds: f64,
    pub errors: Vec<String>,
}

impl PassSummary {
    /// At least one basket was valued
    pub fn succeeded(&self) -> bool {
        self.successful_count > 0
    }
}

/// Result of an out-of-schedule pass
#[derive(Debug, Clone, Serialize)]
pub struct ForcedRunResult {
    pub success: bool,
    pub message: String,
    pub duration_seconds: f64,
    pub successful_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
}

struct Shared {
    index: Arc<IndexService>,
    store: Arc<dyn HistoryStore>,
    config: CollectorConfig,
    state: RwLock<CollectorState>,
    next_wake: RwLock<Option<Instant>>,
    /// Serializes scheduled and forced passes
    pass_lock: AsyncMutex<()>,
}

impl Shared {
    fn set_state(&self, state: CollectorState) {
        *self.state.write() = state;
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self
            .pause(self.config.startup_delay, CollectorState::Starting, &mut shutdown)
            .await
        {
            return;
        }

        loop {
            self.set_state(CollectorState::Collecting);

            let (delay, state) = match self.collect(Some(&shutdown)).await {
                Ok(_) => (self.config.interval, CollectorState::Sleeping),
                Err(e) => {
                    error!("Error in collection loop: {}", e);
                    (self.config.error_backoff, CollectorState::Backoff)
                }
            };

            if !self.pause(delay, state, &mut shutdown).await {
                break;
            }
        }
        debug!("Collection loop exited");
    }

    /// Sleep for `delay` in `state`; false if a stop was requested
    async fn pause(
        &self,
        delay: Duration,
        state: CollectorState,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        if *shutdown.borrow() {
            return false;
        }

        let deadline = Instant::now() + delay;
        *self.next_wake.write() = Some(deadline);
        self.set_state(state);

        let woke = tokio::select! {
            _ = sleep_until(deadline) => true,
            _ = shutdown.changed() => false,
        };

        *self.next_wake.write() = None;
        woke
    }

    async fn collect(&self, shutdown: Option<&watch::Receiver<bool>>) -> Result<PassSummary> {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();
        let timestamp = self.index.clock().now();

        let baskets = match self.index.list_baskets().await {
            Ok(baskets) => baskets,
            Err(e) => {
                error!("Critical error in data collection: {}", e);
                self.record_run(false, Some(e.to_string()));
                return Err(e);
            }
        };

        let mut summary = PassSummary {
            timestamp,
            successful_count: 0,
            failed_count: 0,
            duration_seconds: 0.0,
            errors: Vec::new(),
        };

        if baskets.is_empty() {
            warn!("No baskets configured");
            summary.errors.push("No baskets configured".to_string());
        }

        for basket in &baskets {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                info!("Stop requested, ending collection pass early");
                break;
            }

            match self.collect_basket(basket, timestamp).await {
                Ok(price) => {
                    summary.successful_count += 1;
                    debug!("Collected data for {}: {:.4}", basket.id, price);
                }
                Err(e) => {
                    summary.failed_count += 1;
                    error!("Failed to collect data for {}: {}", basket.id, e);
                    summary.errors.push(format!("Index {}: {}", basket.id, e));
                }
            }
        }

        let error = (!summary.succeeded()).then(|| {
            summary
                .errors
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join("; ")
        });
        self.record_run(summary.succeeded(), error);

        let purged = self.index.purge_expired();
        if purged > 0 {
            debug!("Evicted {} expired cache entries", purged);
        }

        summary.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            "Data collection completed: {} successful, {} failed in {:.2}s",
            summary.successful_count, summary.failed_count, summary.duration_seconds
        );
        Ok(summary)
    }

    /// Value one basket and persist the outcome, returning the price
    async fn collect_basket(&self, basket: &Basket, timestamp: DateTime<Utc>) -> Result<f64> {
        match self.index.valuation_for(basket, timestamp).await {
            Ok(valuation) => {
                let snapshot = HistoricalSnapshot::success(&valuation, basket.kind);
                self.store.append_snapshot(&snapshot)?;
                Ok(valuation.price)
            }
            Err(e) => {
                let snapshot =
                    HistoricalSnapshot::failure(&basket.id, timestamp, basket.kind, e.to_string());
                if let Err(store_err) = self.store.append_snapshot(&snapshot) {
                    error!(
                        "Failed to store failed snapshot for {}: {}",
                        basket.id, store_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Best-effort status update; errors are logged and dropped
    fn record_run(&self, success: bool, error: Option<String>) {
        let name = &self.config.name;
        let result = self.store.read_status(name).and_then(|existing| {
            let status = StatusTracker::apply_run(existing, name, success, error, self.index.clock().now());
            self.store.upsert_status(&status)
        });

        if let Err(e) = result {
            error!("Failed to update querier status: {}", e);
        }
    }
}

/// Periodic snapshot collector with start/stop and forced runs
pub struct HistoricalCollector {
    shared: Arc<Shared>,
    task: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl HistoricalCollector {
    pub fn new(
        index: Arc<IndexService>,
        store: Arc<dyn HistoryStore>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                index,
                store,
                config,
                state: RwLock::new(CollectorState::Idle),
                next_wake: RwLock::new(None),
                pass_lock: AsyncMutex::new(()),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.shared.config
    }

    pub fn state(&self) -> CollectorState {
        *self.shared.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Spawn the collection loop. Does nothing if it is already running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|(_, handle)| !handle.is_finished()) {
            warn!("Historical collector is already running");
            return;
        }

        info!(
            "Starting historical collector with {} minute intervals",
            self.shared.config.interval.as_secs() / 60
        );
        self.shared.set_state(CollectorState::Starting);

        let (tx, rx) = watch::channel(false);
        let shared = self.shared.clone();
        let handle = tokio::spawn(shared.run(rx));
        *task = Some((tx, handle));
    }

    /// Signal the loop to stop and wait for it. Safe to call repeatedly.
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        let Some((tx, handle)) = task else {
            return;
        };

        info!("Stopping historical collector...");
        self.shared.set_state(CollectorState::Stopping);
        let _ = tx.send(true);

        if let Err(e) = handle.await {
            error!("Collector task ended abnormally: {}", e);
        }

        *self.shared.next_wake.write() = None;
        self.shared.set_state(CollectorState::Stopped);
        info!("Historical collector stopped");
    }

    /// Run one pass now, outside the schedule
    pub async fn force_collection(&self) -> ForcedRunResult {
        info!("Starting forced data collection...");
        let started = Instant::now();

        match self.shared.collect(None).await {
            Ok(summary) => ForcedRunResult {
                success: true,
                message: format!("Collected data for {} indexes", summary.successful_count),
                duration_seconds: summary.duration_seconds,
                successful_count: summary.successful_count,
                failed_count: summary.failed_count,
                errors: summary.errors,
            },
            Err(e) => {
                error!("Forced collection failed: {}", e);
                ForcedRunResult {
                    success: false,
                    message: "Data collection failed".to_string(),
                    duration_seconds: started.elapsed().as_secs_f64(),
                    successful_count: 0,
                    failed_count: 0,
                    errors: vec![e.to_string()],
                }
            }
        }
    }

    pub fn get_status(&self) -> Result<Option<CollectorStatus>> {
        Ok(self
            .shared
            .store
            .read_status(&self.shared.config.name)?
            .map(CollectorStatus::from))
    }

    /// Deadline of the current sleep, if the loop is sleeping
    pub fn next_wake(&self) -> Option<Instant> {
        *self.shared.next_wake.read()
    }

    /// Wall-clock estimate of the next scheduled pass
    pub fn next_run_at(&self) -> Option<DateTime<Utc>> {
        let remaining = self.next_wake()?.saturating_duration_since(Instant::now());
        chrono::Duration::from_std(remaining)
            .ok()
            .map(|remaining| self.shared.index.clock().now() + remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::QuerierStatusRecord;
    use crate::db::SqliteDb;
    use crate::quotes::testing::StaticQuoteSource;
    use crate::services::index_service::testing::{static_basket, StaticBasketSource};
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts writes on top of an in-memory database; writes can be made to fail
    struct CountingStore {
        inner: SqliteDb,
        appends: AtomicUsize,
        upserts: AtomicUsize,
        fail_appends: AtomicBool,
        fail_upserts: AtomicBool,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: SqliteDb::new_in_memory().unwrap(),
                appends: AtomicUsize::new(0),
                upserts: AtomicUsize::new(0),
                fail_appends: AtomicBool::new(false),
                fail_upserts: AtomicBool::new(false),
            }
        }
    }

    impl HistoryStore for CountingStore {
        fn append_snapshot(&self, snapshot: &HistoricalSnapshot) -> Result<i64> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(AppError::Internal("disk full".to_string()));
            }
            self.inner.append_snapshot(snapshot)
        }

        fn query_snapshots(
            &self,
            basket_id: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<HistoricalSnapshot>> {
            self.inner.query_snapshots(basket_id, start, end)
        }

        fn list_snapshots(&self, basket_id: &str) -> Result<Vec<HistoricalSnapshot>> {
            self.inner.list_snapshots(basket_id)
        }

        fn upsert_status(&self, status: &QuerierStatusRecord) -> Result<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(AppError::Internal("database is locked".to_string()));
            }
            self.inner.upsert_status(status)
        }

        fn read_status(&self, name: &str) -> Result<Option<QuerierStatusRecord>> {
            self.inner.read_status(name)
        }
    }

    struct Fixture {
        collector: HistoricalCollector,
        store: Arc<CountingStore>,
        baskets: Arc<StaticBasketSource>,
    }

    /// Baskets one and three are priced; basket two has no quotes
    fn fixture(startup_delay: Duration) -> Fixture {
        let quotes = Arc::new(
            StaticQuoteSource::default()
                .with_quote("policy_A", 2.0, 100.0)
                .with_quote("policy_C", 5.0, 100.0),
        );
        let baskets = Arc::new(StaticBasketSource::new(vec![
            static_basket("one", &[("A", 1.0)]),
            static_basket("two", &[("B", 1.0)]),
            static_basket("three", &[("A", 0.5), ("C", 0.5)]),
        ]));
        let index = Arc::new(IndexService::new(baskets.clone(), quotes, 300));
        let store = Arc::new(CountingStore::new());
        let config = CollectorConfig {
            startup_delay,
            ..CollectorConfig::default()
        };

        Fixture {
            collector: HistoricalCollector::new(index, store.clone(), config),
            store,
            baskets,
        }
    }

    async fn wait_for_state(collector: &HistoricalCollector, state: CollectorState) {
        for _ in 0..1_000 {
            if collector.state() == state {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("collector never reached {:?}, is {:?}", state, collector.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_basket_does_not_abort_pass() {
        let f = fixture(Duration::ZERO);

        let result = f.collector.force_collection().await;
        assert!(result.success);
        assert_eq!(result.successful_count, 2);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.errors.len(), 1);

        assert_eq!(f.store.appends.load(Ordering::SeqCst), 3);
        assert_eq!(f.store.upserts.load(Ordering::SeqCst), 1);

        let failed = f.store.list_snapshots("two").unwrap();
        assert_eq!(failed.len(), 1);
        assert!(!failed[0].success);
        assert!(failed[0].error_message.is_some());

        let one = f.store.list_snapshots("one").unwrap();
        let three = f.store.list_snapshots("three").unwrap();
        assert!(one[0].success && three[0].success);
        assert_eq!(one[0].timestamp, failed[0].timestamp);
        assert_eq!(three[0].timestamp, failed[0].timestamp);

        let status = f.collector.get_status().unwrap().unwrap();
        assert_eq!(status.record.total_runs, 1);
        assert_eq!(status.record.successful_runs, 1);
        assert_eq!(status.success_rate, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_does_not_move_schedule() {
        let f = fixture(Duration::ZERO);

        f.collector.start();
        wait_for_state(&f.collector, CollectorState::Sleeping).await;
        let scheduled = f.collector.next_wake().unwrap();

        f.collector.force_collection().await;

        assert_eq!(f.collector.next_wake(), Some(scheduled));
        assert_eq!(f.collector.state(), CollectorState::Sleeping);

        f.collector.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_on_interval() {
        let f = fixture(Duration::from_secs(30));

        f.collector.start();
        assert!(f.collector.is_running());
        wait_for_state(&f.collector, CollectorState::Starting).await;
        assert!(f.collector.get_status().unwrap().is_none());

        tokio::time::sleep(Duration::from_secs(31)).await;
        wait_for_state(&f.collector, CollectorState::Sleeping).await;
        assert_eq!(f.collector.get_status().unwrap().unwrap().record.total_runs, 1);

        tokio::time::sleep(Duration::from_secs(15 * 60)).await;
        wait_for_state(&f.collector, CollectorState::Sleeping).await;
        assert_eq!(f.collector.get_status().unwrap().unwrap().record.total_runs, 2);
        assert_eq!(f.store.list_snapshots("one").unwrap().len(), 2);

        f.collector.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_error_records_failure_and_backs_off() {
        let f = fixture(Duration::ZERO);
        *f.baskets.fail_with.lock() = Some("config unreadable".to_string());

        let result = f.collector.force_collection().await;
        assert!(!result.success);

        let status = f.collector.get_status().unwrap().unwrap();
        assert_eq!(status.record.failed_runs, 1);
        assert!(status
            .record
            .last_error_message
            .unwrap()
            .contains("config unreadable"));

        f.collector.start();
        wait_for_state(&f.collector, CollectorState::Backoff).await;
        let remaining = f.collector.next_wake().unwrap() - Instant::now();
        assert_eq!(remaining, Duration::from_secs(60));

        f.collector.stop().await;
        assert_eq!(f.collector.get_status().unwrap().unwrap().record.total_runs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let f = fixture(Duration::from_secs(30));

        f.collector.stop().await;
        assert_eq!(f.collector.state(), CollectorState::Idle);

        f.collector.start();
        f.collector.start();
        f.collector.stop().await;
        f.collector.stop().await;

        assert_eq!(f.collector.state(), CollectorState::Stopped);
        assert!(!f.collector.is_running());
        assert!(f.collector.next_wake().is_none());
        assert_eq!(f.store.appends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_catalog_is_a_failed_run() {
        let f = fixture(Duration::ZERO);
        f.baskets.baskets.lock().clear();

        let result = f.collector.force_collection().await;
        assert!(result.success);
        assert_eq!(result.successful_count, 0);

        let status = f.collector.get_status().unwrap().unwrap();
        assert_eq!(status.record.failed_runs, 1);
        assert_eq!(
            status.record.last_error_message.as_deref(),
            Some("No baskets configured")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failures_do_not_stop_collection() {
        let f = fixture(Duration::ZERO);

        // Status write fails: the pass still completes and reports its counts
        f.store.fail_upserts.store(true, Ordering::SeqCst);
        let result = f.collector.force_collection().await;
        assert!(result.success);
        assert_eq!(result.successful_count, 2);
        assert_eq!(result.failed_count, 1);
        assert_eq!(f.store.upserts.load(Ordering::SeqCst), 1);
        assert!(f.collector.get_status().unwrap().is_none());

        // Snapshot writes fail: every basket counts as failed
        f.store.fail_upserts.store(false, Ordering::SeqCst);
        f.store.fail_appends.store(true, Ordering::SeqCst);
        let result = f.collector.force_collection().await;
        assert!(result.success);
        assert_eq!(result.successful_count, 0);
        assert_eq!(result.failed_count, 3);

        let status = f.collector.get_status().unwrap().unwrap();
        assert_eq!(status.record.failed_runs, 1);
        assert!(status
            .record
            .last_error_message
            .unwrap()
            .contains("disk full"));

        // Both failing at once: the loop keeps its regular schedule
        f.store.fail_upserts.store(true, Ordering::SeqCst);
        f.collector.start();
        wait_for_state(&f.collector, CollectorState::Sleeping).await;
        let remaining = f.collector.next_wake().unwrap() - Instant::now();
        assert_eq!(remaining, Duration::from_secs(15 * 60));
        assert!(f.collector.is_running());

        f.collector.stop().await;
        assert_eq!(f.collector.state(), CollectorState::Stopped);
    }
}
