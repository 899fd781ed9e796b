//! Fixed worker pool executing dependency-ordered jobs.
//!
//! Workers pull ready jobs from a shared queue. A job becomes ready once every job it depends on has completed.
//! Each scheduled [`JobGraph`] is tracked by a barrier; the thread waiting on that barrier executes ready jobs
//! itself instead of idling, so a pool with zero workers still makes progress on the calling thread.
//!
//! Job and barrier slots are allocated once at construction. Scheduling beyond them is reported as a
//! [`SchedulerError`] and never blocks.

use super::job::{JobGraph, JobWork};
use super::pop_task_result::PopTaskResult;

use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors reported by the job system. None of them leave the scheduler in an inconsistent state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// More jobs were submitted than there are free job slots.
    #[error("job capacity exceeded: {requested} jobs requested, {available} of {capacity} slots free")]
    JobCapacityExceeded {
        capacity: usize,
        available: usize,
        requested: usize,
    },
    /// Every barrier slot is in use by graphs that have not been waited on.
    #[error("barrier capacity of {capacity} exceeded")]
    BarrierCapacityExceeded { capacity: usize },
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Tracks completion of one scheduled [`JobGraph`]. Consumed by [`JobSystem::wait_for`].
#[derive(Debug)]
#[must_use = "a barrier must be waited on to release its slot"]
pub struct BarrierHandle {
    index: usize,
    job_count: usize,
}

impl BarrierHandle {
    /// Number of jobs the barrier waits for.
    #[inline]
    pub fn job_count(&self) -> usize {
        self.job_count
    }
}

struct JobSlot {
    name: &'static str,
    work: Option<JobWork>,
    pending_dependencies: usize,
    dependents: Vec<usize>,
    barrier: usize,
}

struct BarrierSlot {
    remaining: usize,
    panic: Option<Box<dyn Any + Send>>,
}

struct ReadyJob {
    slot: usize,
    name: &'static str,
    work: JobWork,
}

struct SchedulerState {
    jobs: Vec<Option<JobSlot>>,
    free_jobs: Vec<usize>,
    ready: VecDeque<usize>,
    barriers: Vec<Option<BarrierSlot>>,
    free_barriers: Vec<usize>,
}

struct Shared {
    state: Mutex<SchedulerState>,
    /// Signalled when jobs become ready or the pool stops.
    work_available: Condvar,
    /// Signalled whenever a job completes.
    job_completed: Condvar,
    stop: CachePadded<AtomicBool>,
    /// One counter per worker plus a trailing one shared by waiting threads.
    executed: Vec<CachePadded<AtomicU64>>,
    max_jobs: usize,
    max_barriers: usize,
}

impl Shared {
    fn try_pop(&self, state: &mut SchedulerState) -> (PopTaskResult, Option<ReadyJob>) {
        while let Some(slot) = state.ready.pop_front() {
            if let Some(job) = state.jobs[slot].as_mut() {
                if let Some(work) = job.work.take() {
                    return (
                        PopTaskResult::Success,
                        Some(ReadyJob {
                            slot,
                            name: job.name,
                            work,
                        }),
                    );
                }
            }
        }
        if self.stop.load(Ordering::Acquire) {
            (PopTaskResult::Stop, None)
        } else {
            (PopTaskResult::Empty, None)
        }
    }

    fn execute(&self, job: ReadyJob, executor_index: usize) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(job.work));
        self.executed[executor_index].fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        let finished = state.jobs[job.slot].take();
        let mut newly_ready = 0usize;
        if let Some(finished) = finished {
            for dependent in finished.dependents {
                if let Some(waiting) = state.jobs[dependent].as_mut() {
                    waiting.pending_dependencies -= 1;
                    if waiting.pending_dependencies == 0 {
                        state.ready.push_back(dependent);
                        newly_ready += 1;
                    }
                }
            }
            if let Some(barrier) = state.barriers[finished.barrier].as_mut() {
                barrier.remaining -= 1;
                if let Err(payload) = outcome {
                    tracing::warn!(job = job.name, "job panicked; re-raising on the waiting thread");
                    if barrier.panic.is_none() {
                        barrier.panic = Some(payload);
                    }
                }
            }
        }
        state.free_jobs.push(job.slot);
        drop(state);

        if newly_ready > 0 {
            self.work_available.notify_all();
        }
        self.job_completed.notify_all();
    }
}

/// A fixed pool of worker threads executing [`JobGraph`]s.
pub struct JobSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Starts `worker_count` workers with room for `max_jobs` outstanding jobs and `max_barriers` outstanding graphs.
    ///
    /// A worker count of zero is valid: all jobs then run on the thread waiting for them.
    pub fn new(worker_count: usize, max_jobs: usize, max_barriers: usize) -> Result<Self, SchedulerError> {
        let mut system = Self::idle(worker_count, max_jobs, max_barriers);
        for worker_index in 0..worker_count {
            let shared = Arc::clone(&system.shared);
            let handle = thread::Builder::new()
                .name(format!("physics-worker-{worker_index}"))
                .spawn(move || worker_main(shared, worker_index))
                .map_err(|e| SchedulerError::WorkerSpawn(e.to_string()))?;
            system.workers.push(handle);
        }
        tracing::debug!(worker_count, max_jobs, max_barriers, "job system started");
        Ok(system)
    }

    /// A job system without worker threads; every job runs on the waiting thread.
    pub fn single_threaded(max_jobs: usize, max_barriers: usize) -> Self {
        Self::idle(0, max_jobs, max_barriers)
    }

    fn idle(worker_count: usize, max_jobs: usize, max_barriers: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState {
                    jobs: (0..max_jobs).map(|_| None).collect(),
                    free_jobs: (0..max_jobs).rev().collect(),
                    ready: VecDeque::with_capacity(max_jobs),
                    barriers: (0..max_barriers).map(|_| None).collect(),
                    free_barriers: (0..max_barriers).rev().collect(),
                }),
                work_available: Condvar::new(),
                job_completed: Condvar::new(),
                stop: CachePadded::new(AtomicBool::new(false)),
                executed: (0..=worker_count)
                    .map(|_| CachePadded::new(AtomicU64::new(0)))
                    .collect(),
                max_jobs,
                max_barriers,
            }),
            workers: Vec::with_capacity(worker_count),
        }
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    #[inline]
    pub fn max_jobs(&self) -> usize {
        self.shared.max_jobs
    }

    #[inline]
    pub fn max_barriers(&self) -> usize {
        self.shared.max_barriers
    }

    /// Number of job slots not currently holding a scheduled or running job.
    pub fn available_job_slots(&self) -> usize {
        self.shared.state.lock().free_jobs.len()
    }

    /// Jobs executed so far by each worker; the last entry counts jobs run by waiting threads.
    pub fn executed_job_counts(&self) -> Vec<u64> {
        self.shared
            .executed
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Submits every job of `graph`, returning the barrier that completes once all of them have run.
    pub fn schedule(&self, graph: JobGraph) -> Result<BarrierHandle, SchedulerError> {
        self.try_schedule(graph).map_err(|(error, _)| error)
    }

    /// Like [`schedule`](JobSystem::schedule), but hands the graph back when it does not fit so the caller can run
    /// it some other way.
    pub fn try_schedule(&self, graph: JobGraph) -> Result<BarrierHandle, (SchedulerError, JobGraph)> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let requested = graph.len();
        if requested > state.free_jobs.len() {
            let error = SchedulerError::JobCapacityExceeded {
                capacity: self.shared.max_jobs,
                available: state.free_jobs.len(),
                requested,
            };
            return Err((error, graph));
        }
        let Some(barrier) = state.free_barriers.pop() else {
            let error = SchedulerError::BarrierCapacityExceeded {
                capacity: self.shared.max_barriers,
            };
            return Err((error, graph));
        };
        state.barriers[barrier] = Some(BarrierSlot {
            remaining: requested,
            panic: None,
        });

        let first_free = state.free_jobs.len() - requested;
        let slots = state.free_jobs.split_off(first_free);
        for (local_index, pending) in graph.jobs.into_iter().enumerate() {
            let slot = slots[local_index];
            for &dependency in &pending.dependencies {
                if let Some(job) = state.jobs[slots[dependency]].as_mut() {
                    job.dependents.push(slot);
                }
            }
            let ready = pending.dependencies.is_empty();
            state.jobs[slot] = Some(JobSlot {
                name: pending.name,
                work: Some(pending.work),
                pending_dependencies: pending.dependencies.len(),
                dependents: Vec::new(),
                barrier,
            });
            if ready {
                state.ready.push_back(slot);
            }
        }
        drop(guard);

        if requested > 0 {
            self.shared.work_available.notify_all();
        }
        Ok(BarrierHandle {
            index: barrier,
            job_count: requested,
        })
    }

    /// Blocks until every job tracked by `barrier` has completed, running ready jobs on this thread meanwhile.
    ///
    /// If any job of the graph panicked, the first panic is resumed here once the whole graph has finished.
    pub fn wait_for(&self, barrier: BarrierHandle) {
        let executor_index = self.shared.executed.len() - 1;
        let backoff = Backoff::new();
        loop {
            let mut state = self.shared.state.lock();
            if Self::barrier_finished(&state, barrier.index) {
                let finished = state.barriers[barrier.index].take();
                state.free_barriers.push(barrier.index);
                drop(state);
                if let Some(payload) = finished.and_then(|b| b.panic) {
                    panic::resume_unwind(payload);
                }
                return;
            }
            match self.shared.try_pop(&mut state) {
                (PopTaskResult::Success, Some(job)) => {
                    drop(state);
                    self.shared.execute(job, executor_index);
                    backoff.reset();
                }
                _ => {
                    if backoff.is_completed() {
                        self.shared.job_completed.wait(&mut state);
                    } else {
                        MutexGuard::unlocked(&mut state, || backoff.snooze());
                    }
                }
            }
        }
    }

    /// Schedules `graph` and waits for it.
    pub fn run(&self, graph: JobGraph) -> Result<(), SchedulerError> {
        let barrier = self.schedule(graph)?;
        self.wait_for(barrier);
        Ok(())
    }

    fn barrier_finished(state: &SchedulerState, index: usize) -> bool {
        state.barriers[index]
            .as_ref()
            .map_or(true, |barrier| barrier.remaining == 0)
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        {
            let _state = self.shared.state.lock();
            self.shared.stop.store(true, Ordering::Release);
        }
        self.shared.work_available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_main(shared: Arc<Shared>, worker_index: usize) {
    loop {
        let mut state = shared.state.lock();
        let job = loop {
            match shared.try_pop(&mut state) {
                (PopTaskResult::Success, Some(job)) => break job,
                (PopTaskResult::Stop, _) => return,
                _ => shared.work_available.wait(&mut state),
            }
        };
        drop(state);
        shared.execute(job, worker_index);
    }
}
