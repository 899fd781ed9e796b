/// Describes the result status of an attempt to pop a ready job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PopTaskResult {
    /// A ready job was taken.
    Success = 0,
    /// No job is ready, but more may become ready once running jobs complete.
    Empty = 1,
    /// The job system is shutting down and all threads seeking work should stop.
    Stop = 2,
}
