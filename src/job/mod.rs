//! # Batch Jobs
//!
//! Launch parameters for reverse-chronological reader jobs and the step runner
//! that drives a reader, a processor and the checkpoint together.

mod parameters;
mod step;

pub use parameters::{JobParameters, ReaderParameters};
pub use step::{BatchProcessor, BatchStep, StepSummary};
