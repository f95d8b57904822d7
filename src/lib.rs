#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Batch Reader
//!
//! Checkpointable reverse-chronological batch reader over search results.
//!
//! ## Overview
//!
//! A job supplies a list of partitioned search urls. The reader walks them in
//! order and emits resource pids in batches of at most `batch_size`, newest
//! last-updated first, using keyset pagination on a sort key that is **not
//! unique**: many resources can share the same last-updated instant.
//!
//! Each url keeps an inclusive ceiling and the set of pids already emitted at
//! that ceiling. Both are saved into an execution context after every batch, so
//! an interrupted job resumes without losing or re-emitting resources at a tie
//! boundary.
//!
//! ## Module Organization
//!
//! - [`models`] - Resource pids, timestamps and partitioned urls
//! - [`search`] - Fetcher and lookup seams plus an in-memory store
//! - [`cursor`] - Cursor state, threshold advancing, reader and checkpoint codec
//! - [`job`] - Job parameters and the batch step runner
//! - [`config`] - Host configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasker_batch_reader::cursor::{BatchCursorReader, CheckpointCodec, ExecutionContext};
//! use tasker_batch_reader::models::PartitionedUrl;
//! use tasker_batch_reader::search::{InMemoryResourceStore, StoredResource};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryResourceStore::new().with_resources([
//!     StoredResource::new(1, "Patient", 1_000),
//!     StoredResource::new(2, "Patient", 1_000),
//! ]));
//!
//! let mut reader = BatchCursorReader::new(
//!     vec![PartitionedUrl::new("Patient?active=true", None)],
//!     100,
//!     None,
//!     store.clone(),
//!     store,
//! )?;
//!
//! let codec = CheckpointCodec::default();
//! let mut context = ExecutionContext::new();
//! while let Some(batch) = reader.read()? {
//!     println!("processing {} pids", batch.len());
//!     reader.update(&mut context, &codec);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod job;
pub mod logging;
pub mod models;
pub mod search;

pub use crate::config::ReaderConfig;
pub use crate::cursor::{
    BatchCursorReader, CheckpointCodec, CheckpointRecovery, CursorState, ExecutionContext,
    RunState, ThresholdAdvancer,
};
pub use crate::error::{CheckpointError, FetchError, LookupError, ReaderError, Result, SkippedItem};
pub use crate::job::{BatchProcessor, BatchStep, JobParameters, ReaderParameters, StepSummary};
pub use crate::logging::init_structured_logging;
pub use crate::models::{PartitionedUrl, RequestList, RequestPartitionId, ResourcePid, Timestamp};
pub use crate::search::{ResultFetcher, ResultIterator, SearchRequest, TimestampLookup};
