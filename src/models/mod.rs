//! Domain models.

mod job;
mod material;

pub use job::{JobKind, JobStatus, ProcessJob, QueuedJob};
pub use material::MaterialRecord;
