//! Shared wiring for the end-to-end tests: a temporary SQLite file, a
//! temporary marker directory and the production adapters on top of them.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenantq_core::application::{
    shutdown_channel, CompletionBus, CompletionListener, ContextMarkerListener, DispatchRequest,
    DispatchService, HandlerRegistry, RetryPolicy, ShutdownSender, Worker, WorkerConfig,
    WorkerExit,
};
use tenantq_core::domain::{CompletionEvent, JobState, Tenant, DEFAULT_QUEUE};
use tenantq_core::error::{AppError, Result};
use tenantq_core::port::id_provider::UuidProvider;
use tenantq_core::port::time_provider::SystemTimeProvider;
use tenantq_core::port::{JobQueue, StaticTenancy, TenantDirectory, TimeProvider};
use tenantq_infra_sqlite::{
    create_pool, file_url, run_migrations, SqliteJobQueue, SqliteRestartSignal,
    SqliteTenantDirectory, SqliteUserStore,
};
use tenantq_infra_system::FsMarkerWriter;
use tokio::task::JoinHandle;

/// Listener keeping every completion event it sees
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<CompletionEvent>>,
}

impl EventRecorder {
    pub fn events(&self) -> Vec<CompletionEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionListener for EventRecorder {
    fn name(&self) -> &str {
        "event_recorder"
    }

    async fn on_completed(&self, event: &CompletionEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Wraps a listener and counts the errors it returns
pub struct FailureCounting<L> {
    inner: L,
    failures: AtomicUsize,
}

impl<L> FailureCounting<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(0),
        }
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<L: CompletionListener> CompletionListener for FailureCounting<L> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn on_completed(&self, event: &CompletionEvent) -> Result<()> {
        let result = self.inner.on_completed(event).await;
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

pub struct TestEnv {
    pub db_path: PathBuf,
    pub queue: Arc<SqliteJobQueue>,
    pub tenants: Arc<SqliteTenantDirectory>,
    pub users: Arc<SqliteUserStore>,
    pub markers: Arc<FsMarkerWriter>,
    pub restart: Arc<SqliteRestartSignal>,
    pub events: Arc<EventRecorder>,
    pub context_marker: Arc<FailureCounting<ContextMarkerListener>>,
    pub dispatcher: DispatchService,
    pub worker: Worker,
}

impl TestEnv {
    pub async fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        let db_path = std::env::temp_dir().join(format!("tenantq-it-{}.db", id));
        let marker_dir = std::env::temp_dir().join(format!("tenantq-it-{}-storage", id));

        let pool = create_pool(&file_url(&db_path.to_string_lossy()))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        // no backoff so retries are observable without waiting
        let policy = Arc::new(RetryPolicy::new(time.clone(), 0));
        let queue = Arc::new(SqliteJobQueue::new(pool.clone(), time.clone(), policy));
        let tenants = Arc::new(SqliteTenantDirectory::new(pool.clone()));
        let users = Arc::new(SqliteUserStore::new(pool.clone(), time.clone()));
        let markers = Arc::new(FsMarkerWriter::new(marker_dir));
        let restart = Arc::new(SqliteRestartSignal::new(pool));
        let events = Arc::new(EventRecorder::default());

        let context_marker = Arc::new(FailureCounting::new(ContextMarkerListener::new(
            markers.clone(),
        )));

        let bus = CompletionBus::new();
        bus.subscribe(context_marker.clone());
        bus.subscribe(events.clone());

        let dispatcher = DispatchService::new(
            queue.clone(),
            Arc::new(StaticTenancy::central()),
            Arc::new(UuidProvider),
            time.clone(),
        );

        let worker = Worker::builder()
            .config(WorkerConfig {
                idle_sleep: Duration::from_millis(10),
                ..WorkerConfig::for_queue(DEFAULT_QUEUE)
            })
            .queue(queue.clone())
            .tenants(tenants.clone())
            .handlers(HandlerRegistry::with_defaults(users.clone(), markers.clone()))
            .bus(bus)
            .restart_signal(restart.clone())
            .time_provider(time)
            .build()
            .unwrap();

        Self {
            db_path,
            queue,
            tenants,
            users,
            markers,
            restart,
            events,
            context_marker,
            dispatcher,
            worker,
        }
    }

    pub async fn add_tenant(&self, tenant: Tenant) {
        self.tenants.create(&tenant).await.unwrap();
    }

    /// Dispatch from inside `tenant`, or from the central context when `None`
    pub async fn dispatch(&self, tenant: Option<&str>, req: DispatchRequest) -> String {
        self.dispatcher
            .for_tenancy(Arc::new(StaticTenancy::new(tenant.map(str::to_string))))
            .dispatch(req)
            .await
            .unwrap()
    }

    /// Process jobs on the calling task until the queue is empty
    pub async fn drain(&self) {
        loop {
            let run = self.worker.process_next_job().await.unwrap();
            if run == tenantq_core::application::JobRun::Idle {
                break;
            }
        }
    }

    pub fn spawn_workers(&self, count: usize) -> (ShutdownSender, Vec<JoinHandle<Result<WorkerExit>>>) {
        let (tx, token) = shutdown_channel();
        let handles = (1..=count)
            .map(|n| {
                let worker = self.worker.named(format!("it-worker-{}", n));
                let token = token.clone();
                tokio::spawn(async move { worker.run(token).await })
            })
            .collect();
        (tx, handles)
    }

    /// Wait until nothing is pending or running
    pub async fn wait_until_settled(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let pending = self.count(JobState::Queued).await + self.count(JobState::Running).await;
            if pending == 0 {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "{} jobs still pending after {:?}",
                pending,
                timeout
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn count(&self, state: JobState) -> i64 {
        self.queue
            .count_by_state(DEFAULT_QUEUE, state)
            .await
            .unwrap()
    }

    pub async fn marker(&self, path: &str) -> Option<String> {
        self.markers.read_marker(path).await.unwrap()
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_dir_all(self.markers.base_dir());
    }
}

/// Join worker tasks, failing the test on a crash
pub async fn join_workers(handles: Vec<JoinHandle<Result<WorkerExit>>>) -> Vec<WorkerExit> {
    let mut exits = Vec::new();
    for handle in handles {
        let exit: std::result::Result<WorkerExit, AppError> =
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("worker did not stop in time")
                .expect("worker task panicked");
        exits.push(exit.unwrap());
    }
    exits
}
