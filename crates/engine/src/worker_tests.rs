// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use sj_core::test_support::new_job;
use sj_core::{FakeClock, JobStatus};
use sj_storage::{stuck_message, MemoryStore};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct HandlerState {
    results: VecDeque<Result<JobCounters, HandlerError>>,
    handled: Vec<JobId>,
    progress_seen: Vec<Option<String>>,
}

/// Returns scripted results (default: one item) and can fire side effects
/// while a job is in flight.
#[derive(Clone)]
struct ScriptedHandler {
    store: MemoryStore<FakeClock>,
    clock: FakeClock,
    state: Arc<Mutex<HandlerState>>,
    cancel_during: Option<CancellationToken>,
    reap_during: Option<Duration>,
}

impl ScriptedHandler {
    fn new(store: &MemoryStore<FakeClock>, clock: &FakeClock) -> Self {
        Self {
            store: store.clone(),
            clock: clock.clone(),
            state: Arc::default(),
            cancel_during: None,
            reap_during: None,
        }
    }

    fn push(&self, result: Result<JobCounters, HandlerError>) {
        self.state.lock().results.push_back(result);
    }

    fn handled(&self) -> Vec<JobId> {
        self.state.lock().handled.clone()
    }
}

#[async_trait]
impl JobHandler for ScriptedHandler {
    async fn handle(&self, job: &Job, progress: &dyn ProgressSink) -> Result<JobCounters, HandlerError> {
        progress.report("halfway").await;
        let seen = self.store.get(&job.id).await.ok().flatten().and_then(|j| j.progress_message);
        if let Some(token) = &self.cancel_during {
            token.cancel();
        }
        if let Some(threshold) = self.reap_during {
            self.clock.advance(threshold * 2);
            let _ = self.store.reap_stuck(threshold).await;
        }
        self.clock.advance(Duration::from_millis(1500));

        let mut state = self.state.lock();
        state.handled.push(job.id.clone());
        state.progress_seen.push(seen);
        state
            .results
            .pop_front()
            .unwrap_or(Ok(JobCounters { items_produced: 1, units_processed: 1 }))
    }
}

struct Setup {
    clock: FakeClock,
    store: MemoryStore<FakeClock>,
    handler: ScriptedHandler,
}

fn setup() -> Setup {
    let clock = FakeClock::new();
    let store = MemoryStore::new(clock.clone());
    let handler = ScriptedHandler::new(&store, &clock);
    Setup { clock, store, handler }
}

fn worker(s: &Setup, kinds: Vec<JobKind>) -> WorkerLoop<MemoryStore<FakeClock>, ScriptedHandler, FakeClock> {
    WorkerLoop::new(s.store.clone(), s.handler.clone(), s.clock.clone(), WorkerId::new("node-1:100"), kinds)
        .poll_interval(Duration::from_millis(1))
        .idle_timeout(Duration::ZERO)
        .retry(RetryPolicy::none())
}

async fn enqueue(s: &Setup, kind: JobKind) -> JobId {
    let job = s.store.enqueue(new_job(kind, "https://reports.example.com/a.pdf")).await.unwrap();
    s.clock.advance(Duration::from_secs(1));
    job.id
}

#[tokio::test]
async fn drains_oldest_first_then_exits_idle() {
    let s = setup();
    let a = enqueue(&s, JobKind::DocumentReport).await;
    let b = enqueue(&s, JobKind::Ingestion).await;
    let c = enqueue(&s, JobKind::DocumentOther).await;

    let exit = worker(&s, JobKind::ALL.to_vec()).run(CancellationToken::new()).await.unwrap();

    assert_eq!(exit, WorkerExit::Idle);
    assert_eq!(s.handler.handled(), vec![a, b, c]);
    for job in s.store.jobs() {
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.claimed_by, Some(WorkerId::new("node-1:100")));
        assert_eq!(job.duration_ms, Some(1500));
        assert_eq!(job.counters.items_produced, 1);
    }
}

#[tokio::test]
async fn handler_error_fails_the_job_with_its_message() {
    let s = setup();
    let id = enqueue(&s, JobKind::DocumentReport).await;
    s.handler.push(Err(HandlerError::EmptyDocument { pages: 2 }));

    let outcome = worker(&s, JobKind::ALL.to_vec()).run_once().await.unwrap();

    let message = "extraction failed: no text in 2 page(s)".to_string();
    assert_eq!(outcome, Some(JobOutcome::Failed(id.clone(), message.clone())));
    let job = s.store.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message, Some(message));
    assert!(job.completed_at_ms.is_some());
    assert_eq!(s.store.history(&id), vec![JobStatus::Pending, JobStatus::Processing, JobStatus::Failed]);
}

#[tokio::test]
async fn failed_jobs_are_not_retried() {
    let s = setup();
    let id = enqueue(&s, JobKind::DocumentReport).await;
    s.handler.push(Err(HandlerError::EmptyDocument { pages: 1 }));

    worker(&s, JobKind::ALL.to_vec()).run(CancellationToken::new()).await.unwrap();

    assert_eq!(s.handler.handled(), vec![id]);
}

#[tokio::test]
async fn progress_is_written_to_the_held_job() {
    let s = setup();
    enqueue(&s, JobKind::Ingestion).await;

    worker(&s, JobKind::ALL.to_vec()).run_once().await.unwrap();

    assert_eq!(s.handler.state.lock().progress_seen, vec![Some("halfway".to_string())]);
}

#[tokio::test]
async fn ineligible_kinds_stay_pending() {
    let s = setup();
    let id = enqueue(&s, JobKind::DocumentReport).await;

    let exit = worker(&s, vec![JobKind::Ingestion]).run(CancellationToken::new()).await.unwrap();

    assert_eq!(exit, WorkerExit::Idle);
    assert!(s.handler.handled().is_empty());
    assert_eq!(s.store.get(&id).await.unwrap().unwrap().status, JobStatus::Pending);
}

#[tokio::test]
async fn idle_timer_waits_for_the_timeout() {
    let s = setup();
    let w = worker(&s, JobKind::ALL.to_vec()).idle_timeout(Duration::from_secs(60));
    let token = CancellationToken::new();
    let clock = s.clock.clone();

    let ticker = tokio::spawn(async move {
        for _ in 0..1000 {
            tokio::time::sleep(Duration::from_millis(2)).await;
            clock.advance(Duration::from_secs(1));
        }
    });
    let started = s.clock.epoch_ms();
    let exit = w.run(token).await.unwrap();
    ticker.abort();

    assert_eq!(exit, WorkerExit::Idle);
    assert!(s.clock.epoch_ms() - started >= 60_000);
}

#[tokio::test]
async fn cancelled_before_start_claims_nothing() {
    let s = setup();
    let id = enqueue(&s, JobKind::DocumentReport).await;
    let token = CancellationToken::new();
    token.cancel();

    let exit = worker(&s, JobKind::ALL.to_vec()).run(token).await.unwrap();

    assert_eq!(exit, WorkerExit::Shutdown);
    assert_eq!(s.store.get(&id).await.unwrap().unwrap().status, JobStatus::Pending);
}

#[tokio::test]
async fn shutdown_finishes_in_flight_job_and_takes_no_more() {
    let mut s = setup();
    let first = enqueue(&s, JobKind::DocumentReport).await;
    let second = enqueue(&s, JobKind::DocumentReport).await;
    let token = CancellationToken::new();
    s.handler.cancel_during = Some(token.clone());

    let exit = worker(&s, JobKind::ALL.to_vec()).run(token).await.unwrap();

    assert_eq!(exit, WorkerExit::Shutdown);
    assert_eq!(s.store.get(&first).await.unwrap().unwrap().status, JobStatus::Completed);
    assert_eq!(s.store.get(&second).await.unwrap().unwrap().status, JobStatus::Pending);
}

#[tokio::test]
async fn result_of_a_reaped_job_is_discarded() {
    let mut s = setup();
    let id = enqueue(&s, JobKind::DocumentReport).await;
    let threshold = Duration::from_secs(30 * 60);
    s.handler.reap_during = Some(threshold);

    let outcome = worker(&s, JobKind::ALL.to_vec()).run_once().await.unwrap();

    assert_eq!(outcome, Some(JobOutcome::Lost(id.clone())));
    let job = s.store.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message, Some(stuck_message(threshold)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workers_never_share_a_job() {
    let s = setup();
    let mut ids = Vec::new();
    for _ in 0..12 {
        ids.push(enqueue(&s, JobKind::DocumentReport).await);
    }

    let mut tasks = Vec::new();
    for n in 0..4 {
        let w = WorkerLoop::new(
            s.store.clone(),
            s.handler.clone(),
            s.clock.clone(),
            WorkerId::new(format!("node-1:{n}")),
            JobKind::ALL.to_vec(),
        )
        .poll_interval(Duration::from_millis(1))
        .idle_timeout(Duration::ZERO)
        .retry(RetryPolicy::none());
        tasks.push(tokio::spawn(async move { w.run(CancellationToken::new()).await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), WorkerExit::Idle);
    }

    let mut handled = s.handler.handled();
    handled.sort();
    ids.sort();
    assert_eq!(handled, ids);
    assert!(s.store.jobs().iter().all(|j| j.status == JobStatus::Completed));
}
