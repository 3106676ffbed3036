//! Worker pool owned by one execution session.
//!
//! Tasks run on a tokio runtime. The pool tracks every task it spawned so
//! that a session can wait for the pool to drain, and keeps abort handles so
//! that a forced shutdown can stop in-flight work.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strata_core::error::{Result, StrataError};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, Id, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// A pool of tasks with orderly and forced shutdown.
///
/// Shutdown follows a two-step protocol:
/// - [`WorkerPool::shutdown`] stops accepting tasks and lets running ones finish.
/// - [`WorkerPool::shutdown_now`] additionally aborts running tasks and
///   signals the cancellation token handed to units.
///
/// Aborting a task only takes effect at its next `.await`; a unit blocking
/// its thread keeps the pool from draining until it returns.
pub struct WorkerPool {
    handle: Handle,
    tracker: TaskTracker,
    cancellation: CancellationToken,
    aborts: Mutex<Vec<AbortHandle>>,
    limiter: Option<Arc<Semaphore>>,
}

impl WorkerPool {
    /// Create a pool spawning onto `handle`.
    ///
    /// `max_concurrent` bounds the number of tasks running at once.
    pub fn new(handle: Handle, max_concurrent: Option<usize>) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
            cancellation: CancellationToken::new(),
            aborts: Mutex::new(Vec::new()),
            limiter: max_concurrent.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Create a pool on the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn current(max_concurrent: Option<usize>) -> Self {
        Self::new(Handle::current(), max_concurrent)
    }

    /// Submit a task into `set`.
    ///
    /// The caller owns the [`JoinSet`] and awaits results through it; the
    /// pool keeps tracking the task until it actually finishes. Returns the
    /// task ID reported by [`JoinSet::join_next_with_id`].
    pub fn submit<T, F>(&self, set: &mut JoinSet<T>, task: F) -> Result<Id>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_open()?;
        let task = self
            .tracker
            .track_future(limited(self.limiter.clone(), task));
        let abort = set.spawn_on(task, &self.handle);
        let id = abort.id();
        self.remember(abort);
        Ok(id)
    }

    /// Spawn a detached task.
    ///
    /// Detached tasks do not count against the concurrency bound, so they
    /// may themselves submit units without starving the pool.
    pub fn spawn<T, F>(&self, task: F) -> Result<JoinHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_open()?;
        let join = self.tracker.spawn_on(task, &self.handle);
        self.remember(join.abort_handle());
        Ok(join)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.tracker.is_closed() {
            return Err(StrataError::PoolShutdown);
        }
        Ok(())
    }

    fn remember(&self, abort: AbortHandle) {
        let mut aborts = self.aborts.lock();
        aborts.retain(|handle| !handle.is_finished());
        aborts.push(abort);
    }

    /// Token cancelled by [`WorkerPool::shutdown_now`].
    ///
    /// Units receive child tokens of it through their context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The runtime tasks are spawned onto.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Stop accepting tasks. Running tasks continue.
    pub fn shutdown(&self) {
        if self.tracker.close() {
            tracing::debug!(pending = self.tracker.len(), "Worker pool closed");
        }
    }

    /// Stop accepting tasks, abort running ones and cancel units.
    ///
    /// Returns the number of tasks that were still running.
    pub fn shutdown_now(&self) -> usize {
        self.tracker.close();
        self.cancellation.cancel();

        let aborts = std::mem::take(&mut *self.aborts.lock());
        let running = aborts.iter().filter(|h| !h.is_finished()).count();
        for handle in aborts {
            handle.abort();
        }
        tracing::debug!(aborted = running, "Worker pool forced shutdown");
        running
    }

    /// Whether the pool stopped accepting tasks.
    pub fn is_shutdown(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Whether the pool is shut down and every task has finished.
    pub fn is_terminated(&self) -> bool {
        self.tracker.is_closed() && self.tracker.is_empty()
    }

    /// Number of tasks still tracked.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until the pool is shut down and drained.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Wait up to `timeout` for the pool to drain.
    ///
    /// Returns `true` if the pool terminated in time.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }
}

fn limited<T, F>(limiter: Option<Arc<Semaphore>>, task: F) -> impl Future<Output = T> + Send + 'static
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    async move {
        // The semaphore is never closed, so acquisition cannot fail.
        let _permit = match limiter {
            Some(semaphore) => semaphore.acquire_owned().await.ok(),
            None => None,
        };
        task.await
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("pending", &self.tracker.len())
            .field("closed", &self.tracker.is_closed())
            .field("cancelled", &self.cancellation.is_cancelled())
            .field(
                "available_permits",
                &self.limiter.as_ref().map(|s| s.available_permits()),
            )
            .finish()
    }
}
