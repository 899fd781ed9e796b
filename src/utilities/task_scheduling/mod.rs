//! Job scheduling for the parallel stages of a simulation step.
//!
//! - `JobGraph`: a batch of jobs with dependency edges, built per step
//! - `JobSystem`: fixed worker pool executing graphs and tracking each with a barrier
//! - `JobOutput`: slot a job writes its result into for the scheduling thread

mod job;
mod job_system;
mod pop_task_result;

pub use job::{JobGraph, JobHandle, JobOutput};
pub use job_system::{BarrierHandle, JobSystem, SchedulerError};
pub use pop_task_result::PopTaskResult;
