//! # Job System Core Types
//!
//! This module defines the building blocks of the scheduler: the [`Job`] trait every unit
//! of background work implements, the identity handed back at enqueue time and the
//! cancellation token jobs poll while they run.
//!
//! ## Job Lifecycle
//! 1. A job is created on the main thread and handed to `Scheduler::enqueue()`, which
//!    assigns it a [`JobId`] and returns a typed [`JobHandle`]
//! 2. The dispatch loop runs `process()` on a worker (or inline in single mode)
//! 3. The finished job, carrying its own output, is retained by identity
//! 4. The main thread polls `Scheduler::try_take_finished()` with the handle and installs
//!    the output
//!
//! ## Thread Safety
//! - A `Job` must be `Send + 'static` to cross to the worker threads
//! - A job owns (or holds shared read handles to) everything it touches; it never reaches
//!   into the chunk map
//! - Results flow back by value, so nothing is written into shared state from a worker

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Opaque identity of an enqueued job. Never reused within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Generation-class work that may occupy a worker for a long time. It is never given
    /// the last free worker, so short jobs keep flowing.
    LongRunning,
    /// Meshing-class work.
    Short,
}

/// Observable state of a job identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Waiting to be dispatched.
    Queued,
    /// Executing on a scheduler thread.
    Running,
    /// Finished and waiting to be taken.
    Done,
    /// Cancelled before it finished.
    Cancelled,
    /// The job panicked and was discarded.
    Faulted,
    /// Never enqueued, already taken, or evicted.
    Unknown,
}

/// Shared flag a running job polls to exit early.
///
/// A token trips when its own job is cancelled or when the scheduler that owns it shuts
/// down.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    job: Arc<AtomicBool>,
    scheduler: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A standalone token, for running a job body outside a scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn child_of(scheduler: &Arc<AtomicBool>) -> Self {
        CancellationToken {
            job: Arc::new(AtomicBool::new(false)),
            scheduler: Arc::clone(scheduler),
        }
    }

    /// Trips the token for this job only.
    pub fn cancel(&self) {
        self.job.store(true, Ordering::Release);
    }

    /// Whether this job or the whole scheduler has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.job.load(Ordering::Acquire) || self.scheduler.load(Ordering::Acquire)
    }

    /// Whether this specific job was cancelled, as opposed to the whole scheduler stopping.
    pub(crate) fn is_job_cancelled(&self) -> bool {
        self.job.load(Ordering::Acquire)
    }
}

/// Upcasts a boxed job so the scheduler can hand back its concrete type.
pub trait IntoAny {
    /// Converts the finished job back for downcasting to its concrete type.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Send> IntoAny for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// A unit of work executed off the main thread.
///
/// `process()` stores its output inside `self`; the caller gets the whole job back through
/// `Scheduler::try_take_finished()`. Long loops should check `cancel` every slice or so and
/// return early once it trips. A returned job whose token was cancelled is discarded.
pub trait Job: IntoAny + Send + 'static {
    /// Does the work. Long jobs should check `cancel` and return early once it trips.
    fn process(&mut self, cancel: &CancellationToken);

    /// Scheduling class. Defaults to [`JobKind::Short`].
    fn kind(&self) -> JobKind {
        JobKind::Short
    }

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Typed identity returned by `Scheduler::enqueue()`.
pub struct JobHandle<J> {
    id: JobId,
    _job: PhantomData<fn() -> J>,
}

impl<J> JobHandle<J> {
    pub(crate) fn new(id: JobId) -> Self {
        JobHandle {
            id,
            _job: PhantomData,
        }
    }

    /// The identity the scheduler assigned.
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl<J> Clone for JobHandle<J> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<J> Copy for JobHandle<J> {}

impl<J> fmt::Debug for JobHandle<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JobHandle").field(&self.id).finish()
    }
}

impl<J> PartialEq for JobHandle<J> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<J> Eq for JobHandle<J> {}

/// A job taken back from the scheduler together with how long `process()` ran.
#[derive(Debug)]
pub struct FinishedJob<J> {
    /// The job, holding whatever result it stored.
    pub job: J,
    /// Time spent in `process`.
    pub elapsed: Duration,
}
