//! Job descriptions submitted to the [`JobSystem`](super::JobSystem).

use parking_lot::Mutex;
use std::sync::Arc;

/// Work executed by a job. Jobs own everything they touch; results travel back through a [`JobOutput`].
pub(crate) type JobWork = Box<dyn FnOnce() + Send + 'static>;

/// Refers to a job within the [`JobGraph`] that created it.
///
/// Handles are only meaningful for the graph that returned them and are used to express dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(pub(crate) usize);

impl JobHandle {
    /// Position of the job within its graph.
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0
    }
}

pub(crate) struct PendingJob {
    pub name: &'static str,
    pub dependencies: Vec<usize>,
    pub work: JobWork,
}

/// A batch of jobs plus the dependency edges between them.
///
/// A job becomes ready once every job it depends on has completed. Dependencies may only point at jobs added
/// earlier to the same graph, which keeps every graph acyclic by construction.
#[derive(Default)]
pub struct JobGraph {
    pub(crate) jobs: Vec<PendingJob>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job that runs after all of `dependencies` completed.
    ///
    /// # Panics
    /// Panics if a dependency does not belong to this graph.
    pub fn add_job<F>(&mut self, name: &'static str, dependencies: &[JobHandle], work: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let index = self.jobs.len();
        for dependency in dependencies {
            assert!(
                dependency.0 < index,
                "job '{name}' depends on a job that is not part of this graph"
            );
        }
        self.jobs.push(PendingJob {
            name,
            dependencies: dependencies.iter().map(|d| d.0).collect(),
            work: Box::new(work),
        });
        JobHandle(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Runs every job on the calling thread in insertion order, which respects all dependencies.
    pub fn run_inline(self) {
        for job in self.jobs {
            tracing::trace!(job = job.name, "running job inline");
            (job.work)();
        }
    }
}

/// Single-assignment slot a job writes its result into.
///
/// Cloning shares the slot; the scheduling thread keeps one clone and takes the value after waiting on the barrier.
pub struct JobOutput<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for JobOutput<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for JobOutput<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T> JobOutput<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the job's result, replacing any earlier value.
    pub fn set(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    /// Removes the stored result, if the job produced one.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_are_recorded() {
        let mut graph = JobGraph::new();
        let a = graph.add_job("a", &[], || {});
        let b = graph.add_job("b", &[a], || {});
        graph.add_job("c", &[a, b], || {});
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.jobs[2].dependencies, vec![0, 1]);
    }

    #[test]
    #[should_panic(expected = "depends on a job that is not part of this graph")]
    fn forward_dependency_is_rejected() {
        let mut graph = JobGraph::new();
        graph.add_job("a", &[JobHandle(3)], || {});
    }

    #[test]
    fn output_is_taken_once() {
        let output = JobOutput::new();
        output.clone().set(7);
        assert_eq!(output.take(), Some(7));
        assert_eq!(output.take(), None);
    }

    #[test]
    fn inline_run_follows_insertion_order() {
        let order = JobOutput::<Vec<&str>>::new();
        let mut graph = JobGraph::new();
        for name in ["first", "second", "third"] {
            let order = order.clone();
            graph.add_job(name, &[], move || {
                let mut seen = order.take().unwrap_or_default();
                seen.push(name);
                order.set(seen);
            });
        }
        graph.run_inline();
        assert_eq!(order.take(), Some(vec!["first", "second", "third"]));
    }
}
