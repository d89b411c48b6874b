// Worker - Job execution loop

pub mod builder;
pub mod config;
pub mod constants;
mod panic_guard;
mod shutdown;

pub use builder::WorkerBuilder;
pub use config::WorkerConfig;
pub use panic_guard::{execute_guarded, panic_message, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::events::CompletionBus;
use crate::application::jobs::HandlerRegistry;
use crate::application::tenant_resolver::TenantResolver;
use crate::domain::{CompletionEvent, DomainError, FailOutcome, Job, JobId};
use crate::error::Result;
use crate::port::{JobError, JobQueue, RestartSignal, TimeProvider};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};

/// What a single `process_next_job` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRun {
    /// Nothing was available
    Idle,
    Completed(JobId),
    /// Attempt failed, job is pending again
    Retrying(JobId),
    /// Job landed in the dead set
    Dead(JobId),
    /// Shutdown interrupted the job; it was released back to the queue
    Cancelled(JobId),
}

/// Why `run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Shutdown,
    Restart,
}

/// Worker processes jobs from one queue
///
/// Cloning is cheap: all collaborators are shared. Pools are built by
/// cloning one configured worker under different names.
#[derive(Clone)]
pub struct Worker {
    name: String,
    config: WorkerConfig,
    queue: Arc<dyn JobQueue>,
    resolver: Arc<TenantResolver>,
    handlers: Arc<HandlerRegistry>,
    bus: CompletionBus,
    restart_signal: Option<Arc<dyn RestartSignal>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Copy of this worker under another name
    pub fn named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Run worker loop until shutdown or a restart broadcast
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<WorkerExit> {
        info!(worker = %self.name, queue = %self.config.queue, "Worker started");
        let mut restart_baseline = self.last_restart().await;

        let exit = loop {
            // Check for shutdown signal
            if shutdown.is_shutdown() {
                info!(worker = %self.name, "Worker shutting down");
                break WorkerExit::Shutdown;
            }

            if let Some(current) = self.last_restart().await {
                match restart_baseline {
                    None => restart_baseline = Some(current),
                    Some(seen) if seen != current => {
                        info!(worker = %self.name, "Restart signal received");
                        break WorkerExit::Restart;
                    }
                    Some(_) => {}
                }
            }

            match self.process_next_job_until(&mut shutdown).await {
                Ok(JobRun::Idle) => {
                    // No job available, sleep briefly (or wait for shutdown)
                    tokio::select! {
                        _ = sleep(self.config.idle_sleep) => {},
                        _ = shutdown.wait() => {
                            info!(worker = %self.name, "Worker interrupted during idle");
                            break WorkerExit::Shutdown;
                        }
                    }
                }
                Ok(JobRun::Cancelled(_)) => break WorkerExit::Shutdown,
                Ok(_) => {}
                Err(e) => {
                    error!(worker = %self.name, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(self.config.error_sleep) => {},
                        _ = shutdown.wait() => {
                            info!(worker = %self.name, "Worker interrupted during error recovery");
                            break WorkerExit::Shutdown;
                        }
                    }
                }
            }
        };

        info!(worker = %self.name, exit = ?exit, "Worker stopped");
        Ok(exit)
    }

    /// Process next job from the queue without a shutdown hook
    pub async fn process_next_job(&self) -> Result<JobRun> {
        self.process_next_job_until(&mut ShutdownToken::never())
            .await
    }

    /// Process next job; a shutdown signal cancels the job in flight
    pub async fn process_next_job_until(&self, shutdown: &mut ShutdownToken) -> Result<JobRun> {
        // Claim is atomic in the store: the job is already RUNNING
        let job = match self.queue.dequeue(&self.config.queue).await? {
            Some(j) => j,
            None => return Ok(JobRun::Idle),
        };

        let span = info_span!(
            "job",
            worker = %self.name,
            job_id = %job.id,
            kind = %job.kind,
            attempt = job.attempts
        );
        self.run_claimed(job, shutdown).instrument(span).await
    }

    async fn run_claimed(&self, job: Job, shutdown: &mut ShutdownToken) -> Result<JobRun> {
        let ctx = match self.resolver.bind(&job).await {
            Ok(ctx) => ctx,
            Err(e) => return self.handle_failure(&job, e).await,
        };

        info!(tenant = %ctx.tenant, "Processing job");

        // Execute in its own task: a panicking handler must not take the worker down
        let handlers = Arc::clone(&self.handlers);
        let exec_ctx = ctx.clone();
        let kind = job.kind;
        let payload = job.payload.clone();
        let mut handle = tokio::spawn(
            async move { handlers.execute(kind, &exec_ctx, &payload).await }.in_current_span(),
        );

        let execution = tokio::select! {
            biased;
            result = &mut handle => result,
            _ = shutdown.wait() => {
                handle.abort();
                match handle.await {
                    Err(join_err) if join_err.is_cancelled() => {
                        warn!("Shutdown requested, cancelling in-flight job");
                        self.queue.release(&job.id).await?;
                        return Ok(JobRun::Cancelled(job.id));
                    }
                    // handler finished before the abort landed; settle it normally
                    finished => finished,
                }
            }
        };

        match execution {
            Ok(Ok(())) => {
                // Only the ack that actually transitioned the job publishes
                if self.queue.ack(&job.id).await? {
                    let event =
                        CompletionEvent::new(&job, ctx.tenant, self.time_provider.now_millis());
                    let listener_failures = self.bus.publish(&event).await;
                    info!(listener_failures = listener_failures, "Job completed");
                } else {
                    warn!("Job was already acknowledged, no completion event");
                }
                Ok(JobRun::Completed(job.id))
            }
            Ok(Err(e)) => self.handle_failure(&job, e).await,
            Err(join_err) => {
                // Task panicked or was cancelled (non-retryable)
                let reason = if join_err.is_panic() {
                    format!("Handler panicked: {}", panic_message(join_err.into_panic().as_ref()))
                } else {
                    "Handler task cancelled".to_string()
                };
                error!(reason = %reason, "Job handler crashed, moving to dead set");
                self.queue.bury(&job.id, &reason).await?;
                Ok(JobRun::Dead(job.id))
            }
        }
    }

    async fn handle_failure(&self, job: &Job, err: JobError) -> Result<JobRun> {
        let reason = err.to_string();

        if !err.is_retryable() {
            self.queue.bury(&job.id, &reason).await?;
            error!(error = %reason, "Job failed permanently, moved to dead set");
            return Ok(JobRun::Dead(job.id.clone()));
        }

        match self.queue.fail(&job.id, &reason).await? {
            FailOutcome::Retrying {
                attempt,
                available_at,
            } => {
                warn!(
                    attempt = attempt,
                    available_at = available_at,
                    error = %reason,
                    "Job attempt failed, retrying"
                );
                Ok(JobRun::Retrying(job.id.clone()))
            }
            FailOutcome::Dead { attempts } => {
                let exhausted = DomainError::ExhaustedRetries {
                    job_id: job.id.clone(),
                    attempts,
                };
                error!(error = %reason, "{}", exhausted);
                Ok(JobRun::Dead(job.id.clone()))
            }
        }
    }

    /// Current restart marker; `None` when no signal store is wired or it is unreadable
    async fn last_restart(&self) -> Option<Option<i64>> {
        let signal = self.restart_signal.as_ref()?;
        match signal.last_restart().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(worker = %self.name, error = %e, "Could not read restart signal");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::CompletionListener;
    use crate::application::retry::RetryPolicy;
    use crate::domain::{JobKind, JobPayload, JobState, Tenant, TenantContext};
    use crate::port::job_handler::mocks::{MockBehavior, MockJobHandler};
    use crate::port::job_queue::mocks::InMemoryJobQueue;
    use crate::port::restart_signal::mocks::InMemoryRestartSignal;
    use crate::port::tenancy::mocks::InMemoryTenantDirectory;
    use crate::port::time_provider::SystemTimeProvider;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<CompletionEvent>>,
    }

    #[async_trait]
    impl CompletionListener for EventLog {
        fn name(&self) -> &str {
            "event_log"
        }

        async fn on_completed(&self, event: &CompletionEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Harness {
        queue: Arc<InMemoryJobQueue>,
        handler: Arc<MockJobHandler>,
        events: Arc<EventLog>,
        restart: Arc<InMemoryRestartSignal>,
        worker: Worker,
    }

    fn harness(behavior: MockBehavior) -> Harness {
        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let queue = Arc::new(InMemoryJobQueue::new(
            Arc::new(RetryPolicy::new(Arc::clone(&time), 0)),
            Arc::clone(&time),
        ));
        let handler = Arc::new(MockJobHandler::new(JobKind::CreateUser, behavior));
        let mut handlers = HandlerRegistry::new();
        handlers.register(handler.clone());

        let events = Arc::new(EventLog::default());
        let bus = CompletionBus::new();
        bus.subscribe(events.clone());

        let restart = Arc::new(InMemoryRestartSignal::default());
        let directory = InMemoryTenantDirectory::with_tenants([Tenant::new("acme", 0)]);

        let worker = Worker::builder()
            .name("test-worker")
            .config(WorkerConfig {
                idle_sleep: Duration::from_millis(5),
                ..WorkerConfig::default()
            })
            .queue(queue.clone())
            .tenants(Arc::new(directory))
            .handlers(handlers)
            .bus(bus)
            .restart_signal(restart.clone())
            .time_provider(time)
            .build()
            .unwrap();

        Harness {
            queue,
            handler,
            events,
            restart,
            worker,
        }
    }

    async fn enqueue(queue: &InMemoryJobQueue, tenant: TenantContext, max_attempts: i32) -> Job {
        let job = Job::new_test("default", JobKind::CreateUser, JobPayload::empty())
            .with_tenant(&tenant)
            .with_max_attempts(max_attempts);
        queue.enqueue(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_idle_when_queue_empty() {
        let h = harness(MockBehavior::Success);
        assert_eq!(h.worker.process_next_job().await.unwrap(), JobRun::Idle);
    }

    #[tokio::test]
    async fn test_success_acks_and_publishes_once() {
        let h = harness(MockBehavior::Success);
        let job = enqueue(&h.queue, TenantContext::tenant("acme"), 3).await;

        let run = h.worker.process_next_job().await.unwrap();
        assert_eq!(run, JobRun::Completed(job.id.clone()));

        let stored = h.queue.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Done);

        let events = h.events.events.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].job_id, job.id);
        assert_eq!(events[0].tenant, TenantContext::tenant("acme"));

        // handler saw the same tenant the event reports
        assert_eq!(h.handler.calls()[0].tenant, TenantContext::tenant("acme"));
    }

    #[tokio::test]
    async fn test_always_failing_job_hits_retry_bound() {
        let h = harness(MockBehavior::Fail("db down".to_string()));
        let job = enqueue(&h.queue, TenantContext::Central, 3).await;

        assert_eq!(h.worker.process_next_job().await.unwrap(), JobRun::Retrying(job.id.clone()));
        assert_eq!(h.worker.process_next_job().await.unwrap(), JobRun::Retrying(job.id.clone()));
        assert_eq!(h.worker.process_next_job().await.unwrap(), JobRun::Dead(job.id.clone()));
        assert_eq!(h.worker.process_next_job().await.unwrap(), JobRun::Idle);

        assert_eq!(h.handler.call_count(), 3);
        let stored = h.queue.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.attempts, 3);
        assert!(h.events.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_retryable_failure_buried_immediately() {
        let h = harness(MockBehavior::Reject("bad payload".to_string()));
        let job = enqueue(&h.queue, TenantContext::Central, 3).await;

        assert_eq!(h.worker.process_next_job().await.unwrap(), JobRun::Dead(job.id.clone()));
        assert_eq!(h.handler.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tenant_goes_to_dead_set_without_running() {
        let h = harness(MockBehavior::Success);
        let job = enqueue(&h.queue, TenantContext::tenant("ghost"), 3).await;

        assert_eq!(h.worker.process_next_job().await.unwrap(), JobRun::Dead(job.id.clone()));
        assert_eq!(h.handler.call_count(), 0);
        let stored = h.queue.find_by_id(&job.id).await.unwrap().unwrap();
        assert!(stored.last_error.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let h = harness(MockBehavior::Panic("handler exploded".to_string()));
        let job = enqueue(&h.queue, TenantContext::Central, 3).await;

        assert_eq!(h.worker.process_next_job().await.unwrap(), JobRun::Dead(job.id.clone()));
        let stored = h.queue.find_by_id(&job.id).await.unwrap().unwrap();
        assert!(stored.last_error.unwrap().contains("handler exploded"));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_job() {
        let h = harness(MockBehavior::Sleep(Duration::from_secs(30)));
        let job = enqueue(&h.queue, TenantContext::Central, 3).await;

        let (tx, token) = shutdown_channel();
        let worker = h.worker.clone();
        let handle = tokio::spawn(async move { worker.run(token).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.shutdown();

        let exit = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop promptly")
            .unwrap()
            .unwrap();
        assert_eq!(exit, WorkerExit::Shutdown);

        let stored = h.queue.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Queued);
        assert_eq!(stored.attempts, 0);
        assert!(h.events.events.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_never_releases_a_finished_job() {
        let h = harness(MockBehavior::Success);
        let (tx, mut token) = shutdown_channel();
        tx.shutdown();

        let mut completed = 0;
        for round in 0..300 {
            // a released job is claimed again in the next round
            if h.queue.count_by_state("default", JobState::Queued).await.unwrap() == 0 {
                enqueue(&h.queue, TenantContext::Central, 3).await;
            }
            let calls_before = h.handler.call_count();

            let run = h.worker.process_next_job_until(&mut token).await.unwrap();
            let ran = h.handler.call_count() > calls_before;

            match run {
                JobRun::Cancelled(id) => {
                    assert!(!ran, "round {}: handler ran but job was released", round);
                    let stored = h.queue.find_by_id(&id).await.unwrap().unwrap();
                    assert_eq!(stored.state, JobState::Queued);
                }
                JobRun::Completed(id) => {
                    assert!(ran);
                    let stored = h.queue.find_by_id(&id).await.unwrap().unwrap();
                    assert_eq!(stored.state, JobState::Done);
                    completed += 1;
                }
                other => panic!("round {}: unexpected {:?}", round, other),
            }
        }

        // one event per job that actually ran
        assert_eq!(h.events.events.lock().unwrap().len(), completed);
        assert_eq!(h.handler.call_count(), completed);
    }

    #[tokio::test]
    async fn test_restart_broadcast_stops_worker() {
        let h = harness(MockBehavior::Success);
        let (_tx, token) = shutdown_channel();
        let worker = h.worker.clone();
        let handle = tokio::spawn(async move { worker.run(token).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        h.restart.broadcast(42).await.unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should notice the restart")
            .unwrap()
            .unwrap();
        assert_eq!(exit, WorkerExit::Restart);
    }
}
