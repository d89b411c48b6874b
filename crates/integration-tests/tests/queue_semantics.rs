//! Queue semantics against the SQLite store
//!
//! - Every job settles exactly once under concurrent workers
//! - FIFO claim order
//! - ack is idempotent and publishes one event
//! - Retry bound and the dead set

mod common;

use common::{join_workers, TestEnv};
use std::collections::HashSet;
use std::time::Duration;
use tenantq_core::application::{DispatchRequest, JobRun};
use tenantq_core::domain::{JobState, TenantContext, DEFAULT_QUEUE};
use tenantq_core::port::{JobQueue, UserStore};

/// 100 jobs, 4 workers: each id shows up in exactly one completion or dead record
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hundred_jobs_four_workers_settle_once() {
    let env = TestEnv::new().await;

    let mut ids = HashSet::new();
    for n in 0..100 {
        // every tenth job writes outside the storage root and can never succeed
        let req = if n % 10 == 0 {
            DispatchRequest::log_value("abc", "../escape").with_max_attempts(2)
        } else {
            DispatchRequest::create_user()
        };
        ids.insert(env.dispatch(None, req).await);
    }
    assert_eq!(ids.len(), 100);

    let (shutdown, handles) = env.spawn_workers(4);
    env.wait_until_settled(Duration::from_secs(30)).await;
    shutdown.shutdown();
    join_workers(handles).await;

    let completed: Vec<String> = env.events.events().into_iter().map(|e| e.job_id).collect();
    let dead: Vec<String> = env
        .queue
        .find_by_state(JobState::Failed)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();

    assert_eq!(completed.len(), 90);
    assert_eq!(dead.len(), 10);

    let mut seen = HashSet::new();
    for id in completed.iter().chain(dead.iter()) {
        assert!(seen.insert(id.clone()), "job {} settled twice", id);
    }
    assert_eq!(seen, ids);

    assert_eq!(
        env.users.count_users(&TenantContext::Central).await.unwrap(),
        90
    );
}

#[tokio::test]
async fn test_claims_follow_enqueue_order() {
    let env = TestEnv::new().await;
    let mut enqueued = Vec::new();
    for _ in 0..5 {
        enqueued.push(env.dispatch(None, DispatchRequest::create_user()).await);
    }

    let mut claimed = Vec::new();
    while let Some(job) = env.queue.dequeue(DEFAULT_QUEUE).await.unwrap() {
        claimed.push(job.id);
    }
    assert_eq!(claimed, enqueued);
}

#[tokio::test]
async fn test_second_ack_publishes_nothing() {
    let env = TestEnv::new().await;
    let id = env.dispatch(None, DispatchRequest::create_user()).await;

    let run = env.worker.process_next_job().await.unwrap();
    assert_eq!(run, JobRun::Completed(id.clone()));
    assert_eq!(env.events.events().len(), 1);

    // a late duplicate ack from a confused caller changes nothing
    assert!(!env.queue.ack(&id).await.unwrap());
    assert_eq!(env.count(JobState::Done).await, 1);
    assert_eq!(env.events.events().len(), 1);
}

#[tokio::test]
async fn test_always_failing_job_stops_at_max_attempts() {
    let env = TestEnv::new().await;
    let id = env
        .dispatch(
            None,
            DispatchRequest::log_value("abc", "/absolute/path").with_max_attempts(3),
        )
        .await;

    assert_eq!(env.worker.process_next_job().await.unwrap(), JobRun::Retrying(id.clone()));
    assert_eq!(env.worker.process_next_job().await.unwrap(), JobRun::Retrying(id.clone()));
    assert_eq!(env.worker.process_next_job().await.unwrap(), JobRun::Dead(id.clone()));
    assert_eq!(env.worker.process_next_job().await.unwrap(), JobRun::Idle);

    let job = env.queue.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.last_error.is_some());
    assert!(env.events.events().is_empty());
}

#[tokio::test]
async fn test_operator_retry_revives_dead_job() {
    let env = TestEnv::new().await;
    let id = env
        .dispatch(None, DispatchRequest::log_value("abc", "../nope").with_max_attempts(1))
        .await;
    env.drain().await;
    assert_eq!(env.count(JobState::Failed).await, 1);

    env.queue.retry_dead(&id).await.unwrap();
    let job = env.queue.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.attempts, 0);
}
