//! Job tracking: the authoritative job store and the progress broadcaster
//! that streams its updates.

pub mod job_progress;
pub mod job_store;

pub use job_progress::{JobProgressBroadcaster, JobProgressEvent};
pub use job_store::{Job, JobCounts, JobStatus, JobStore, StatusCounts};
