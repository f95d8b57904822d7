//! # Batch Cursor
//!
//! Keyset pagination over a non-unique last-updated sort key.
//!
//! - [`state`] - per-url position and the run-wide cursor
//! - [`threshold`] - computes the next ceiling and tie set from a batch
//! - [`reader`] - assembles batches across the url list
//! - [`checkpoint`] - saves and restores the run through an execution context

pub mod checkpoint;
pub mod reader;
pub mod state;
pub mod threshold;

pub use checkpoint::{CheckpointCodec, CheckpointRecovery, ExecutionContext};
pub use reader::BatchCursorReader;
pub use state::{CursorState, RunState};
pub use threshold::{ThresholdAdvancer, ThresholdUpdate};
