//! # Job Scheduler
//!
//! This module runs terrain generation and meshing off the main thread. The main loop never
//! blocks on a job: it enqueues work, keeps the returned handle and polls
//! [`Scheduler::try_take_finished`] once per tick until the result shows up.
//!
//! ## Architecture Overview
//!
//! - `Scheduler`: owns the pending queue, the retained results and the worker pool
//! - [`Job`]: a unit of work that carries its own output back to the caller
//! - `WorkerChannel`: the link between the dispatch loop and one worker thread
//! - [`CancellationToken`]: the flag a running job polls to exit early
//!
//! A dedicated dispatch thread waits on a condition variable, with a bounded timeout, for
//! pending jobs. In [`ThreadingMode::Single`] it runs each job inline, one after another.
//! In [`ThreadingMode::Multi`] it hands jobs to the worker channels round-robin, one job in
//! flight per channel. The mode can be switched at any time; a job that was already
//! dispatched finishes where it was sent.
//!
//! ## Retention
//!
//! Finished jobs are kept by identity until they are taken, until they are older than
//! `retention_ms`, or until more than `max_retained_jobs` results pile up, whichever comes
//! first. A caller that does not poll in time silently loses the result and has to
//! re-request the work.
//!
//! ## Faults
//!
//! A panicking job is caught at the worker boundary, logged with its identity and name and
//! discarded. Its status becomes [`JobStatus::Faulted`]; the worker keeps running.
//!
//! ## Example Usage
//! ```
//! use voxel_forge::core::config::{ThreadingConfig, ThreadingMode};
//! use voxel_forge::engine_state::task_management::task::{CancellationToken, Job};
//! use voxel_forge::engine_state::task_management::Scheduler;
//!
//! struct Square(u64, Option<u64>);
//!
//! impl Job for Square {
//!     fn process(&mut self, _cancel: &CancellationToken) {
//!         self.1 = Some(self.0 * self.0);
//!     }
//!     fn name(&self) -> &'static str {
//!         "square"
//!     }
//! }
//!
//! let mut scheduler = Scheduler::new(ThreadingConfig {
//!     mode: ThreadingMode::Single,
//!     ..Default::default()
//! });
//! scheduler.start();
//! let handle = scheduler.enqueue(Square(7, None)).unwrap();
//! let finished = loop {
//!     if let Some(finished) = scheduler.try_take_finished(&handle) {
//!         break finished;
//!     }
//!     std::thread::yield_now();
//! };
//! assert_eq!(finished.job.1, Some(49));
//! scheduler.shutdown();
//! ```

pub mod governor;
pub mod task;

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use lru::LruCache;
use thiserror::Error;
use web_time::Instant;

use crate::core::config::{ThreadingConfig, ThreadingMode};
use task::{CancellationToken, FinishedJob, Job, JobHandle, JobId, JobKind, JobStatus};

/// Maximum number of jobs in flight per worker channel.
pub const MAX_JOBS_IN_FLIGHT: usize = 1;

/// Why a job could not be queued.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The scheduler was never started or has shut down.
    #[error("scheduler is not running")]
    NotRunning,
}

struct QueuedJob {
    id: JobId,
    kind: JobKind,
    job: Box<dyn Job>,
    token: CancellationToken,
}

struct CompletedJob {
    job: Box<dyn Job>,
    elapsed: Duration,
    completed_at: Instant,
}

struct SchedulerState {
    mode: ThreadingMode,
    pending: VecDeque<QueuedJob>,
    running: HashMap<JobId, CancellationToken>,
    finished: LruCache<JobId, CompletedJob>,
    /// Cancelled and faulted identities, so `status` can still report them.
    outcomes: LruCache<JobId, JobStatus>,
}

impl SchedulerState {
    fn purge_expired(&mut self, retention: Duration) {
        let expired: Vec<JobId> = self
            .finished
            .iter()
            .filter(|(_, completed)| completed.completed_at.elapsed() > retention)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.finished.pop(&id);
            debug!("Evicted unclaimed result of job {id}");
        }
    }

    /// Picks the next job the current mode can run given `free` of `total` worker channels.
    fn take_dispatchable(&mut self, free: usize, total: usize) -> Option<QueuedJob> {
        match self.mode {
            ThreadingMode::Single => self.pending.pop_front(),
            ThreadingMode::Multi => {
                if free == 0 {
                    return None;
                }
                let index = if total > 1 && free == 1 {
                    self.pending
                        .iter()
                        .position(|queued| queued.kind == JobKind::Short)?
                } else {
                    0
                };
                self.pending.remove(index)
            }
        }
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    available: Condvar,
    shutdown: Arc<AtomicBool>,
    retention: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        // Job bodies run outside the lock, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Link between the dispatch loop and one worker thread.
struct WorkerChannel {
    job_sender: Sender<QueuedJob>,
    jobs_in_flight: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

/// Queue, worker pool and result table for background jobs.
pub struct Scheduler {
    config: ThreadingConfig,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    worker_count: usize,
    dispatcher: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Creates a stopped scheduler. Nothing runs until [`Scheduler::start`].
    pub fn new(config: ThreadingConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_retained_jobs).unwrap_or(NonZeroUsize::MIN);
        let shared = Shared {
            state: Mutex::new(SchedulerState {
                mode: config.mode,
                pending: VecDeque::new(),
                running: HashMap::new(),
                finished: LruCache::new(capacity),
                outcomes: LruCache::new(capacity),
            }),
            available: Condvar::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            retention: config.retention(),
        };
        Scheduler {
            config,
            shared: Arc::new(shared),
            next_id: AtomicU64::new(1),
            worker_count: 0,
            dispatcher: None,
        }
    }

    /// Spawns the worker pool and the dispatch thread. Calling it twice is a no-op, and a
    /// scheduler that was shut down stays down.
    pub fn start(&mut self) {
        if self.dispatcher.is_some() || self.shared.shutdown.load(Ordering::Acquire) {
            return;
        }

        let worker_count = self.config.worker_count();
        let mut channels = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (job_tx, job_rx) = channel::<QueuedJob>();
            let jobs_in_flight = Arc::new(AtomicUsize::new(0));
            let shared = Arc::clone(&self.shared);
            let in_flight = Arc::clone(&jobs_in_flight);

            let worker = thread::spawn(move || {
                while let Ok(queued) = job_rx.recv() {
                    execute(&shared, queued, Some(&in_flight));
                }
            });

            channels.push(WorkerChannel {
                job_sender: job_tx,
                jobs_in_flight,
                worker,
            });
        }
        self.worker_count = worker_count;

        let shared = Arc::clone(&self.shared);
        let dequeue_wait = self.config.dequeue_wait();
        self.dispatcher = Some(thread::spawn(move || {
            dispatch_loop(shared, channels, dequeue_wait);
        }));

        info!(
            "Scheduler started with {} workers in {:?} mode (available parallelism: {:?})",
            worker_count,
            self.mode(),
            thread::available_parallelism()
        );
    }

    /// Whether the scheduler has started and not yet shut down.
    pub fn is_running(&self) -> bool {
        self.dispatcher.is_some() && !self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Queues `job` and returns immediately with its handle.
    pub fn enqueue<J: Job>(&self, job: J) -> Result<JobHandle<J>, ScheduleError> {
        if !self.is_running() {
            return Err(ScheduleError::NotRunning);
        }
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let queued = QueuedJob {
            id,
            kind: job.kind(),
            job: Box::new(job),
            token: CancellationToken::child_of(&self.shared.shutdown),
        };
        self.shared.lock().pending.push_back(queued);
        self.shared.available.notify_one();
        Ok(JobHandle::new(id))
    }

    /// Removes and returns the job behind `handle` if it has finished.
    pub fn try_take_finished<J: Job>(&self, handle: &JobHandle<J>) -> Option<FinishedJob<J>> {
        let completed = self.shared.lock().finished.pop(&handle.id())?;
        if completed.completed_at.elapsed() > self.shared.retention {
            debug!("Evicted unclaimed result of job {}", handle.id());
            return None;
        }
        match completed.job.into_any().downcast::<J>() {
            Ok(job) => Some(FinishedJob {
                job: *job,
                elapsed: completed.elapsed,
            }),
            Err(_) => {
                warn!("Job {} finished with an unexpected type", handle.id());
                None
            }
        }
    }

    /// Cancels a queued or running job. Returns `false` if the identity is not pending.
    pub fn cancel(&self, id: JobId) -> bool {
        let mut state = self.shared.lock();
        if let Some(index) = state.pending.iter().position(|queued| queued.id == id) {
            state.pending.remove(index);
            state.outcomes.push(id, JobStatus::Cancelled);
            return true;
        }
        match state.running.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Where the job with `id` is in its lifecycle.
    pub fn status(&self, id: JobId) -> JobStatus {
        let state = self.shared.lock();
        if state.pending.iter().any(|queued| queued.id == id) {
            JobStatus::Queued
        } else if state.running.contains_key(&id) {
            JobStatus::Running
        } else if state.finished.contains(&id) {
            JobStatus::Done
        } else {
            state.outcomes.peek(&id).copied().unwrap_or(JobStatus::Unknown)
        }
    }

    /// The mode new jobs are dispatched in.
    pub fn mode(&self) -> ThreadingMode {
        self.shared.lock().mode
    }

    /// Changes how subsequently dequeued jobs run.
    pub fn set_mode(&self, mode: ThreadingMode) {
        let mut state = self.shared.lock();
        if state.mode != mode {
            info!("Scheduler switching from {:?} to {:?}", state.mode, mode);
            state.mode = mode;
            self.shared.available.notify_all();
        }
    }

    /// Jobs waiting to be dispatched.
    pub fn queued_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Jobs dispatched and not yet finished.
    pub fn in_flight_count(&self) -> usize {
        self.shared.lock().running.len()
    }

    /// Threads currently executing jobs: one in single mode, the pool size in multi mode.
    pub fn worker_count(&self) -> usize {
        match self.mode() {
            ThreadingMode::Single if self.worker_count > 0 => 1,
            _ => self.worker_count,
        }
    }

    /// Stops dispatching, trips every cancellation token and joins all threads.
    ///
    /// Pending jobs are dropped as cancelled. Jobs already running are waited for; they are
    /// expected to notice the token and return early.
    pub fn shutdown(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        {
            let mut state = self.shared.lock();
            while let Some(queued) = state.pending.pop_front() {
                state.outcomes.push(queued.id, JobStatus::Cancelled);
            }
        }
        self.shared.available.notify_all();

        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                error!("Scheduler dispatch thread panicked");
            }
            info!("Scheduler stopped");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Finds a worker channel with room for another job, round-robin from `start`.
fn find_available_channel(channels: &[WorkerChannel], start: usize) -> Option<usize> {
    (0..channels.len())
        .map(|offset| (start + offset) % channels.len())
        .find(|&index| channels[index].jobs_in_flight.load(Ordering::Acquire) < MAX_JOBS_IN_FLIGHT)
}

fn free_channels(channels: &[WorkerChannel]) -> usize {
    channels
        .iter()
        .filter(|channel| channel.jobs_in_flight.load(Ordering::Acquire) < MAX_JOBS_IN_FLIGHT)
        .count()
}

fn dispatch_loop(shared: Arc<Shared>, channels: Vec<WorkerChannel>, dequeue_wait: Duration) {
    let mut current_channel = 0;

    loop {
        let (queued, mode) = {
            let mut state = shared.lock();
            let next = loop {
                state.purge_expired(shared.retention);
                if shared.shutdown.load(Ordering::Acquire) {
                    break None;
                }
                if let Some(queued) = state.take_dispatchable(free_channels(&channels), channels.len()) {
                    break Some(queued);
                }
                state = shared
                    .available
                    .wait_timeout(state, dequeue_wait)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            };
            let Some(queued) = next else { break };
            state.running.insert(queued.id, queued.token.clone());
            (queued, state.mode)
        };

        if mode == ThreadingMode::Single || channels.is_empty() {
            execute(&shared, queued, None);
            continue;
        }

        let Some(index) = find_available_channel(&channels, current_channel) else {
            execute(&shared, queued, None);
            continue;
        };
        let channel = &channels[index];
        channel.jobs_in_flight.fetch_add(1, Ordering::AcqRel);
        if let Err(returned) = channel.job_sender.send(queued) {
            channel.jobs_in_flight.fetch_sub(1, Ordering::AcqRel);
            error!("Worker {index} disconnected; running job {} inline", returned.0.id);
            execute(&shared, returned.0, None);
        }
        current_channel = (index + 1) % channels.len();
    }

    for (index, channel) in channels.into_iter().enumerate() {
        drop(channel.job_sender);
        if channel.worker.join().is_err() {
            error!("Worker {index} panicked outside a job");
        }
    }
}

/// Runs one job, contains any panic and files the outcome.
fn execute(shared: &Shared, mut queued: QueuedJob, in_flight: Option<&AtomicUsize>) {
    let name = queued.job.name();
    let started = Instant::now();
    let outcome = {
        let job = &mut queued.job;
        let token = &queued.token;
        panic::catch_unwind(AssertUnwindSafe(|| job.process(token)))
    };
    let elapsed = started.elapsed();

    if let Some(in_flight) = in_flight {
        in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    let mut state = shared.lock();
    state.running.remove(&queued.id);
    match outcome {
        Ok(()) if queued.token.is_job_cancelled() => {
            state.outcomes.push(queued.id, JobStatus::Cancelled);
        }
        Ok(()) => {
            let completed = CompletedJob {
                job: queued.job,
                elapsed,
                completed_at: Instant::now(),
            };
            if let Some((evicted, _)) = state.finished.push(queued.id, completed) {
                if evicted != queued.id {
                    debug!("Evicted unclaimed result of job {evicted} (retention cap)");
                }
            }
        }
        Err(payload) => {
            error!(
                "Job {} ({}) panicked: {}",
                queued.id,
                name,
                panic_message(payload.as_ref())
            );
            state.outcomes.push(queued.id, JobStatus::Faulted);
        }
    }
    drop(state);
    shared.available.notify_all();
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
