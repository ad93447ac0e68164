//! Worker pool front door: priority admission under a concurrency ceiling.
//!
//! A [`Dispatcher`] owns one scheduler thread. That thread is the only place
//! the wait queue and the active-job count live; callers talk to it through
//! an `mpsc` command channel, and workers report back on the same channel
//! when a job finishes. Admission is a loop that runs after every command:
//! while there are free slots and waiting jobs, the head of the queue is
//! started on the worker pool.
//!
//! ```text
//! submit ──► Submit ─┐
//! limit  ──► SetLimit├──► scheduler ──► rayon pool ──► run_job
//! status ──► Status ─┘     │    ▲                         │
//!                          │    └──── Finished(result) ◄──┘
//!                          ▼
//!                        ticket
//! ```
//!
//! Workers run on a dedicated rayon pool sized to [`MAX_CONCURRENCY`]; the
//! ceiling is enforced by the scheduler's count, not by the pool size. A
//! worker hands its result back to the scheduler, which frees the slot and
//! only then completes the [`JobTicket`]. A caller woken by its ticket
//! therefore never sees its own job in `active_jobs`.
//!
//! Failures (including panics) inside a pipeline are reported through the
//! ticket and never reach the scheduler.
//!
//! ## Nested parallelism
//!
//! A job encodes its sizes with `rayon::join`/`par_iter` on the same pool it
//! runs on. While a worker waits inside that join, rayon may start another
//! admitted job on the waiting worker's stack, and the outer job cannot
//! return until the inner one does. The ceiling still holds (admission is
//! counted by the scheduler, not by threads), but one job's completion can
//! be delayed by an unrelated job admitted after it.

use crate::config::PipelineConfig;
use crate::imaging::ImageBackend;
use crate::pipeline::{Job, JobError, ProcessConfig, run_job};
use crate::queue::{PriorityQueue, QueueFull};
use crate::types::{JobId, JobOptions, Priority, ProcessedImage, SourceMetadata};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 5;

/// Clamp a requested concurrency ceiling into the supported range.
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to spawn scheduler thread: {0}")]
    Thread(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Queue is full ({0} jobs waiting)")]
    QueueFull(usize),
    #[error("Dispatcher is shut down")]
    ShutDown,
}

/// Dispatcher settings resolved from [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub concurrency: usize,
    pub max_queue_depth: usize,
    pub process: ProcessConfig,
}

impl DispatcherConfig {
    pub fn from_pipeline_config(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.pool.concurrency,
            max_queue_depth: config.pool.max_queue_depth,
            process: ProcessConfig::from_pipeline_config(config),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_pipeline_config(&PipelineConfig::default())
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub queue_length: usize,
    pub active_jobs: usize,
    pub concurrency_limit: usize,
}

/// Scheduler transitions, for progress reporting.
///
/// Counts are taken right after the transition they describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Queued {
        id: JobId,
        priority: Priority,
        queue_length: usize,
        active_jobs: usize,
    },
    Admitted {
        id: JobId,
        queue_length: usize,
        active_jobs: usize,
    },
    Finished {
        id: JobId,
        succeeded: bool,
        queue_length: usize,
        active_jobs: usize,
    },
}

impl DispatchEvent {
    pub fn id(&self) -> JobId {
        match self {
            DispatchEvent::Queued { id, .. }
            | DispatchEvent::Admitted { id, .. }
            | DispatchEvent::Finished { id, .. } => *id,
        }
    }

    pub fn queue_length(&self) -> usize {
        match self {
            DispatchEvent::Queued { queue_length, .. }
            | DispatchEvent::Admitted { queue_length, .. }
            | DispatchEvent::Finished { queue_length, .. } => *queue_length,
        }
    }

    pub fn active_jobs(&self) -> usize {
        match self {
            DispatchEvent::Queued { active_jobs, .. }
            | DispatchEvent::Admitted { active_jobs, .. }
            | DispatchEvent::Finished { active_jobs, .. } => *active_jobs,
        }
    }
}

type JobOutcome = Result<ProcessedImage, JobError>;

/// Write end of a job's one-shot result channel.
///
/// `complete` takes `self`, so a sink fires at most once.
struct CompletionSink(SyncSender<JobOutcome>);

impl CompletionSink {
    fn complete(self, id: JobId, outcome: JobOutcome) {
        if self.0.send(outcome).is_err() {
            tracing::debug!("{}: ticket dropped, result discarded", id);
        }
    }
}

/// Read end of a job's result channel, returned by [`Dispatcher::submit`].
///
/// Dropping the ticket does not cancel the job; its result is discarded.
#[derive(Debug)]
pub struct JobTicket {
    id: JobId,
    receiver: Receiver<JobOutcome>,
}

fn completion_channel(id: JobId) -> (CompletionSink, JobTicket) {
    let (tx, rx) = mpsc::sync_channel(1);
    (CompletionSink(tx), JobTicket { id, receiver: rx })
}

impl JobTicket {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Block until the job completes.
    pub fn wait(self) -> JobOutcome {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(JobError::Abandoned))
    }

    /// Wait up to `timeout`. `None` means the job is still pending.
    ///
    /// Once a result has been returned, later calls report
    /// [`JobError::Abandoned`].
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobOutcome> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(JobError::Abandoned)),
        }
    }

    /// Non-blocking poll.
    pub fn try_result(&self) -> Option<JobOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(JobError::Abandoned)),
        }
    }
}

enum Command {
    Submit {
        job: Job,
        sink: CompletionSink,
        reply: Sender<Result<(), SubmitError>>,
    },
    Finished {
        id: JobId,
        outcome: JobOutcome,
        sink: CompletionSink,
    },
    SetLimit(usize),
    Status(Sender<PoolStatus>),
    Shutdown,
}

/// Handle to a running worker pool.
///
/// `Dispatcher` is `Sync`; share it behind an `Arc` to submit from several
/// threads. Dropping it performs [`Dispatcher::shutdown`].
pub struct Dispatcher {
    commands: Sender<Command>,
    next_id: AtomicU64,
    limit: AtomicUsize,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start the scheduler thread and worker pool.
    pub fn start<B: ImageBackend + 'static>(
        backend: B,
        config: DispatcherConfig,
        events: Option<Sender<DispatchEvent>>,
    ) -> Result<Self, StartError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(MAX_CONCURRENCY)
            .thread_name(|i| format!("variant-worker-{i}"))
            .build()?;

        let limit = clamp_concurrency(config.concurrency);
        let (tx, rx) = mpsc::channel();
        let scheduler = Scheduler {
            backend: Arc::new(backend),
            process: Arc::new(config.process),
            pool,
            queue: PriorityQueue::new(config.max_queue_depth),
            active: 0,
            limit,
            accepting: true,
            commands: tx.clone(),
            events,
        };
        let handle = std::thread::Builder::new()
            .name("variant-dispatch".into())
            .spawn(move || scheduler.run(rx))?;

        tracing::info!(
            "Dispatcher started (concurrency {}, queue depth {})",
            limit,
            config.max_queue_depth
        );

        Ok(Self {
            commands: tx,
            next_id: AtomicU64::new(1),
            limit: AtomicUsize::new(limit),
            scheduler: Mutex::new(Some(handle)),
        })
    }

    /// Queue an image for processing.
    ///
    /// Returns once the job is queued (or admitted); never waits for it to
    /// run. A full queue is rejected immediately.
    pub fn submit(
        &self,
        bytes: Vec<u8>,
        metadata: SourceMetadata,
        options: JobOptions,
    ) -> Result<JobTicket, SubmitError> {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sink, ticket) = completion_channel(id);
        let (reply, accepted) = mpsc::channel();
        let job = Job {
            id,
            bytes,
            metadata,
            options,
        };

        self.commands
            .send(Command::Submit { job, sink, reply })
            .map_err(|_| SubmitError::ShutDown)?;
        accepted.recv().map_err(|_| SubmitError::ShutDown)??;
        Ok(ticket)
    }

    /// Change the ceiling for future admissions. Running jobs are unaffected.
    ///
    /// Returns the effective (clamped) limit.
    pub fn set_concurrency_limit(&self, requested: usize) -> usize {
        let limit = clamp_concurrency(requested);
        self.limit.store(limit, Ordering::Relaxed);
        if self.commands.send(Command::SetLimit(limit)).is_err() {
            tracing::debug!("Concurrency change ignored: dispatcher is shut down");
        }
        limit
    }

    pub fn status(&self) -> PoolStatus {
        let (tx, rx) = mpsc::channel();
        if self.commands.send(Command::Status(tx)).is_ok() {
            if let Ok(status) = rx.recv() {
                return status;
            }
        }
        PoolStatus {
            queue_length: 0,
            active_jobs: 0,
            concurrency_limit: self.limit.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting jobs, finish everything already queued, and join the
    /// scheduler thread. Idempotent.
    pub fn shutdown(&self) {
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };
        // The scheduler holds its own sender, so it is always listening here.
        let _ = self.commands.send(Command::Shutdown);
        if handle.join().is_err() {
            tracing::error!("Dispatcher thread panicked during shutdown");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Scheduler<B> {
    backend: Arc<B>,
    process: Arc<ProcessConfig>,
    pool: rayon::ThreadPool,
    queue: PriorityQueue<(Job, CompletionSink)>,
    active: usize,
    limit: usize,
    accepting: bool,
    /// Cloned into every worker so it can report `Finished`.
    commands: Sender<Command>,
    events: Option<Sender<DispatchEvent>>,
}

impl<B: ImageBackend + 'static> Scheduler<B> {
    fn run(mut self, commands: Receiver<Command>) {
        while let Ok(command) = commands.recv() {
            self.handle(command);
            self.admit();
            if !self.accepting && self.active == 0 && self.queue.is_empty() {
                break;
            }
        }
        tracing::info!("Dispatcher stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Submit { job, sink, reply } => {
                let _ = reply.send(self.enqueue(job, sink));
            }
            Command::Finished { id, outcome, sink } => {
                let succeeded = outcome.is_ok();
                self.active -= 1;
                tracing::debug!(
                    "{} finished ({} active, {} queued)",
                    id,
                    self.active,
                    self.queue.len()
                );
                self.emit(DispatchEvent::Finished {
                    id,
                    succeeded,
                    queue_length: self.queue.len(),
                    active_jobs: self.active,
                });
                sink.complete(id, outcome);
            }
            Command::SetLimit(limit) => {
                if limit != self.limit {
                    tracing::info!("Concurrency limit {} -> {}", self.limit, limit);
                }
                self.limit = limit;
            }
            Command::Status(reply) => {
                let _ = reply.send(PoolStatus {
                    queue_length: self.queue.len(),
                    active_jobs: self.active,
                    concurrency_limit: self.limit,
                });
            }
            Command::Shutdown => {
                tracing::info!(
                    "Dispatcher shutting down, draining {} queued and {} active",
                    self.queue.len(),
                    self.active
                );
                self.accepting = false;
            }
        }
    }

    fn enqueue(&mut self, job: Job, sink: CompletionSink) -> Result<(), SubmitError> {
        if !self.accepting {
            return Err(SubmitError::ShutDown);
        }
        let id = job.id;
        let priority = job.options.priority;
        if let Err(QueueFull(_rejected)) = self.queue.enqueue(priority, (job, sink)) {
            tracing::warn!("{} rejected: queue full", id);
            return Err(SubmitError::QueueFull(self.queue.max_depth()));
        }
        self.emit(DispatchEvent::Queued {
            id,
            priority,
            queue_length: self.queue.len(),
            active_jobs: self.active,
        });
        Ok(())
    }

    fn admit(&mut self) {
        while self.active < self.limit {
            let Some((job, sink)) = self.queue.dequeue_next() else {
                break;
            };
            self.active += 1;
            tracing::debug!(
                "{} admitted ({} active, {} queued)",
                job.id,
                self.active,
                self.queue.len()
            );
            self.emit(DispatchEvent::Admitted {
                id: job.id,
                queue_length: self.queue.len(),
                active_jobs: self.active,
            });
            self.spawn(job, sink);
        }
    }

    fn spawn(&self, job: Job, sink: CompletionSink) {
        let backend = Arc::clone(&self.backend);
        let process = Arc::clone(&self.process);
        let commands = self.commands.clone();

        self.pool.spawn(move || {
            let id = job.id;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                run_job(backend.as_ref(), &process, job)
            }))
            .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(payload.as_ref()))));

            if let Err(e) = &outcome {
                tracing::error!("{} failed: {}", id, e);
            }
            // The scheduler outlives every admitted job, so this cannot fail.
            let _ = commands.send(Command::Finished { id, outcome, sink });
        });
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::BoundingBox;
    use crate::imaging::backend::tests::{GATED, Gate, MockBackend, PANICS, UNDECODABLE};
    use crate::test_helpers::{admission_order, collect_events, peak_active};
    use crate::types::SizeLabel;

    fn config_with(concurrency: usize) -> DispatcherConfig {
        DispatcherConfig {
            concurrency,
            ..DispatcherConfig::default()
        }
    }

    fn submit(dispatcher: &Dispatcher, bytes: &[u8], options: JobOptions) -> JobTicket {
        dispatcher
            .submit(bytes.to_vec(), SourceMetadata::default(), options)
            .unwrap()
    }

    // =========================================================================
    // Concurrency ceiling
    // =========================================================================

    #[test]
    fn clamp_concurrency_bounds() {
        assert_eq!(clamp_concurrency(0), 1);
        assert_eq!(clamp_concurrency(3), 3);
        assert_eq!(clamp_concurrency(9), 5);
    }

    #[test]
    fn start_clamps_configured_concurrency() {
        let dispatcher = Dispatcher::start(MockBackend::new(), config_with(12), None).unwrap();
        assert_eq!(dispatcher.status().concurrency_limit, MAX_CONCURRENCY);
    }

    #[test]
    fn set_concurrency_limit_clamps() {
        let dispatcher = Dispatcher::start(MockBackend::new(), config_with(2), None).unwrap();

        assert_eq!(dispatcher.set_concurrency_limit(0), 1);
        assert_eq!(dispatcher.status().concurrency_limit, 1);
        assert_eq!(dispatcher.set_concurrency_limit(9), 5);
        assert_eq!(dispatcher.status().concurrency_limit, 5);
    }

    #[test]
    fn ceiling_of_one_runs_strictly_in_order() {
        let gate = Gate::new();
        let (tx, rx) = mpsc::channel();
        let dispatcher =
            Dispatcher::start(MockBackend::gated(gate.clone()), config_with(1), Some(tx)).unwrap();

        let tickets: Vec<_> = (0..3)
            .map(|_| submit(&dispatcher, GATED, JobOptions::default()))
            .collect();
        gate.open();
        for ticket in tickets {
            assert!(ticket.wait().is_ok());
        }
        dispatcher.shutdown();

        let events = collect_events(&rx);
        assert_eq!(admission_order(&events), vec![1, 2, 3]);
        assert_eq!(peak_active(&events), 1);
    }

    #[test]
    fn ceiling_of_two_with_five_jobs() {
        let gate = Gate::new();
        let (tx, rx) = mpsc::channel();
        let dispatcher =
            Dispatcher::start(MockBackend::gated(gate.clone()), config_with(2), Some(tx)).unwrap();

        let tickets: Vec<_> = (0..5)
            .map(|_| submit(&dispatcher, GATED, JobOptions::default()))
            .collect();
        assert_eq!(
            dispatcher.status(),
            PoolStatus {
                queue_length: 3,
                active_jobs: 2,
                concurrency_limit: 2,
            }
        );
        gate.open();
        for ticket in tickets {
            assert!(ticket.wait().is_ok());
        }
        dispatcher.shutdown();

        let events = collect_events(&rx);
        assert!(peak_active(&events) <= 2);

        let last_queued = events
            .iter()
            .rposition(|e| matches!(e, DispatchEvent::Queued { .. }))
            .unwrap();
        let lengths: Vec<_> = events[last_queued..]
            .iter()
            .map(DispatchEvent::queue_length)
            .collect();
        assert!(lengths.windows(2).all(|w| w[1] <= w[0]), "{lengths:?}");
        assert_eq!(events.last().map(DispatchEvent::queue_length), Some(0));
        assert_eq!(events.last().map(DispatchEvent::active_jobs), Some(0));
    }

    #[test]
    fn raising_the_limit_admits_waiting_jobs() {
        let gate = Gate::new();
        let dispatcher =
            Dispatcher::start(MockBackend::gated(gate.clone()), config_with(1), None).unwrap();

        let tickets: Vec<_> = (0..3)
            .map(|_| submit(&dispatcher, GATED, JobOptions::default()))
            .collect();
        assert_eq!(dispatcher.status().active_jobs, 1);

        dispatcher.set_concurrency_limit(3);
        let status = dispatcher.status();
        assert_eq!(status.active_jobs, 3);
        assert_eq!(status.queue_length, 0);

        gate.open();
        for ticket in tickets {
            assert!(ticket.wait().is_ok());
        }
    }

    #[test]
    fn lowering_the_limit_lets_running_jobs_finish() {
        let gate = Gate::new();
        let (tx, rx) = mpsc::channel();
        let dispatcher =
            Dispatcher::start(MockBackend::gated(gate.clone()), config_with(3), Some(tx)).unwrap();

        let tickets: Vec<_> = (0..4)
            .map(|_| submit(&dispatcher, GATED, JobOptions::default()))
            .collect();
        assert_eq!(dispatcher.set_concurrency_limit(1), 1);
        assert_eq!(
            dispatcher.status(),
            PoolStatus {
                queue_length: 1,
                active_jobs: 3,
                concurrency_limit: 1,
            }
        );

        gate.open();
        for ticket in tickets {
            assert!(ticket.wait().is_ok());
        }
        dispatcher.shutdown();

        let events = collect_events(&rx);
        let last_admitted = events
            .iter()
            .position(|e| matches!(e, DispatchEvent::Admitted { id: JobId(4), .. }))
            .unwrap();
        // Job 4 waits until every earlier job has released its slot.
        assert!(matches!(
            events[last_admitted - 1],
            DispatchEvent::Finished { active_jobs: 0, .. }
        ));
        assert_eq!(peak_active(&events[last_admitted..]), 1);
        let finished = events
            .iter()
            .filter(|e| matches!(e, DispatchEvent::Finished { succeeded: true, .. }))
            .count();
        assert_eq!(finished, 4);
    }

    #[test]
    fn status_after_wait_never_counts_the_finished_job() {
        let dispatcher = Dispatcher::start(MockBackend::new(), config_with(1), None).unwrap();

        for round in 0..500 {
            let ticket = submit(&dispatcher, b"photo", JobOptions::default());
            assert!(ticket.wait().is_ok());
            assert_eq!(
                dispatcher.status().active_jobs,
                0,
                "stale active count in round {round}"
            );
        }
    }

    // =========================================================================
    // Priority
    // =========================================================================

    #[test]
    fn high_priority_admitted_before_earlier_normal() {
        let gate = Gate::new();
        let (tx, rx) = mpsc::channel();
        let dispatcher =
            Dispatcher::start(MockBackend::gated(gate.clone()), config_with(1), Some(tx)).unwrap();

        let blocker = submit(&dispatcher, GATED, JobOptions::default());
        let normal = submit(&dispatcher, b"normal", JobOptions::default());
        let high = submit(
            &dispatcher,
            b"high",
            JobOptions::default().with_priority(Priority::High),
        );
        gate.open();
        for ticket in [blocker, normal, high] {
            assert!(ticket.wait().is_ok());
        }
        dispatcher.shutdown();

        assert_eq!(admission_order(&collect_events(&rx)), vec![1, 3, 2]);
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn decode_failure_reported_once_and_pool_continues() {
        let (tx, rx) = mpsc::channel();
        let dispatcher = Dispatcher::start(MockBackend::new(), config_with(1), Some(tx)).unwrap();

        let bad = submit(&dispatcher, UNDECODABLE, JobOptions::default());
        let bad_id = bad.id();
        assert!(matches!(bad.wait(), Err(JobError::Decode(_))));

        let good = submit(&dispatcher, b"photo", JobOptions::default());
        assert_eq!(good.wait().unwrap().variants.len(), 3);
        dispatcher.shutdown();

        let failures: Vec<_> = collect_events(&rx)
            .into_iter()
            .filter(|e| matches!(e, DispatchEvent::Finished { succeeded: false, .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id(), bad_id);
    }

    #[test]
    fn partial_request_with_failing_size_still_succeeds() {
        let backend = MockBackend::failing_at(vec![BoundingBox::square(1200)]);
        let dispatcher = Dispatcher::start(backend, config_with(2), None).unwrap();

        let ticket = submit(
            &dispatcher,
            b"photo",
            JobOptions::default().with_sizes([SizeLabel::Small, SizeLabel::Large]),
        );
        let result = ticket.wait().unwrap();

        assert_eq!(
            result.variants.keys().copied().collect::<Vec<_>>(),
            vec![SizeLabel::Small]
        );
    }

    #[test]
    fn panic_in_pipeline_is_contained() {
        let dispatcher = Dispatcher::start(MockBackend::new(), config_with(1), None).unwrap();

        let ticket = submit(&dispatcher, PANICS, JobOptions::default());
        match ticket.wait() {
            Err(JobError::Panicked(message)) => assert!(message.contains("mock decoder")),
            other => panic!("expected panic error, got {other:?}"),
        }

        let next = submit(&dispatcher, b"photo", JobOptions::default());
        assert!(next.wait().is_ok());
        assert_eq!(dispatcher.status().active_jobs, 0);
    }

    // =========================================================================
    // Queue depth and lifecycle
    // =========================================================================

    #[test]
    fn full_queue_rejects_synchronously() {
        let gate = Gate::new();
        let config = DispatcherConfig {
            concurrency: 1,
            max_queue_depth: 1,
            ..DispatcherConfig::default()
        };
        let dispatcher = Dispatcher::start(MockBackend::gated(gate.clone()), config, None).unwrap();

        let running = submit(&dispatcher, GATED, JobOptions::default());
        let waiting = submit(&dispatcher, GATED, JobOptions::default());
        let rejected = dispatcher.submit(
            GATED.to_vec(),
            SourceMetadata::default(),
            JobOptions::default(),
        );
        assert_eq!(rejected.unwrap_err(), SubmitError::QueueFull(1));

        gate.open();
        assert!(running.wait().is_ok());
        assert!(waiting.wait().is_ok());
    }

    #[test]
    fn shutdown_drains_queued_jobs() {
        let gate = Gate::new();
        let dispatcher =
            Dispatcher::start(MockBackend::gated(gate.clone()), config_with(1), None).unwrap();

        let tickets: Vec<_> = (0..3)
            .map(|_| submit(&dispatcher, GATED, JobOptions::default()))
            .collect();
        gate.open();
        dispatcher.shutdown();

        for ticket in tickets {
            assert!(ticket.try_result().unwrap().is_ok());
        }
    }

    #[test]
    fn submit_after_shutdown_is_rejected() {
        let dispatcher = Dispatcher::start(MockBackend::new(), config_with(1), None).unwrap();
        dispatcher.shutdown();
        dispatcher.shutdown();

        let result = dispatcher.submit(
            b"photo".to_vec(),
            SourceMetadata::default(),
            JobOptions::default(),
        );
        assert_eq!(result.unwrap_err(), SubmitError::ShutDown);
    }

    #[test]
    fn dropping_the_dispatcher_completes_outstanding_work() {
        let dispatcher = Dispatcher::start(MockBackend::new(), config_with(1), None).unwrap();
        let ticket = submit(&dispatcher, b"photo", JobOptions::default());
        drop(dispatcher);

        assert!(ticket.wait().is_ok());
    }

    #[test]
    fn dropped_ticket_does_not_stall_the_pool() {
        let dispatcher = Dispatcher::start(MockBackend::new(), config_with(1), None).unwrap();
        drop(submit(&dispatcher, b"first", JobOptions::default()));

        let second = submit(&dispatcher, b"second", JobOptions::default());
        assert!(second.wait().is_ok());
    }

    #[test]
    fn wait_timeout_reports_pending_job() {
        let gate = Gate::new();
        let dispatcher =
            Dispatcher::start(MockBackend::gated(gate.clone()), config_with(1), None).unwrap();

        let ticket = submit(&dispatcher, GATED, JobOptions::default());
        assert!(ticket.wait_timeout(Duration::from_millis(20)).is_none());

        gate.open();
        let outcome = ticket.wait_timeout(Duration::from_secs(10)).unwrap();
        assert!(outcome.is_ok());
    }

    #[test]
    fn status_serializes() {
        let status = PoolStatus {
            queue_length: 1,
            active_jobs: 2,
            concurrency_limit: 3,
        };
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"queue_length":1,"active_jobs":2,"concurrency_limit":3}"#
        );
    }
}
