//! # Batch Step
//!
//! Chunk-oriented driver around a [`BatchCursorReader`]: read a batch, hand it
//! to a [`BatchProcessor`], then checkpoint. The checkpoint is written only
//! after the processor accepted the batch, so a crash in between redelivers
//! that batch on restart (at-least-once). Processors must therefore be
//! idempotent per pid.

use crate::cursor::{BatchCursorReader, CheckpointCodec, ExecutionContext};
use crate::error::{Result, SkippedItem};
use crate::logging::log_batch_operation;
use crate::models::ResourcePid;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Consumer of emitted batches
pub trait BatchProcessor {
    fn process(&mut self, batch: &[ResourcePid]) -> Result<()>;
}

impl<F> BatchProcessor for F
where
    F: FnMut(&[ResourcePid]) -> Result<()>,
{
    fn process(&mut self, batch: &[ResourcePid]) -> Result<()> {
        self(batch)
    }
}

/// Outcome of one step execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    pub run_id: Uuid,
    pub batches: usize,
    pub items: usize,
    pub skipped: Vec<SkippedItem>,
    /// Every url was read to exhaustion
    pub completed: bool,
}

#[derive(Debug)]
pub struct BatchStep {
    reader: BatchCursorReader,
    codec: CheckpointCodec,
    run_id: Uuid,
}

impl BatchStep {
    pub fn new(reader: BatchCursorReader, codec: CheckpointCodec) -> Self {
        Self {
            reader,
            codec,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn reader(&self) -> &BatchCursorReader {
        &self.reader
    }

    /// Run until every url is exhausted
    pub fn execute<P>(&mut self, processor: &mut P, context: &mut ExecutionContext) -> Result<StepSummary>
    where
        P: BatchProcessor + ?Sized,
    {
        self.execute_batches(processor, context, usize::MAX)
    }

    /// Run at most `max_batches` batches, resuming from `context`
    ///
    /// Stopping early leaves `context` at the last processed batch; calling
    /// this again with the same context continues from there.
    #[instrument(skip_all, fields(run_id = %self.run_id))]
    pub fn execute_batches<P>(
        &mut self,
        processor: &mut P,
        context: &mut ExecutionContext,
        max_batches: usize,
    ) -> Result<StepSummary>
    where
        P: BatchProcessor + ?Sized,
    {
        self.reader.open(context, &self.codec)?;
        let run_id = self.run_id.to_string();

        let mut summary = StepSummary {
            run_id: self.run_id,
            batches: 0,
            items: 0,
            skipped: Vec::new(),
            completed: false,
        };

        while summary.batches < max_batches {
            let Some(batch) = self.reader.read()? else {
                // Persist the exhausted position so a restart ends immediately
                self.reader.update(context, &self.codec);
                summary.completed = true;
                break;
            };
            let url_index = self.reader.state().active_index();

            if let Err(error) = processor.process(&batch) {
                // The batch is redelivered on restart, so its lookup failures
                // will be reported again; log and drop them here
                let skipped = self.reader.take_skipped_items();
                for item in &skipped {
                    warn!(
                        url_index = item.partition_index,
                        pid = %item.pid,
                        reason = %item.reason,
                        "Dropping skipped item of failed batch"
                    );
                }
                log_batch_operation(
                    "process",
                    Some(&run_id),
                    Some(url_index),
                    Some(batch.len()),
                    "failed",
                    Some(&format!("{error}; {} skipped items dropped", skipped.len())),
                );
                return Err(error);
            }

            self.reader.update(context, &self.codec);
            summary.batches += 1;
            summary.items += batch.len();
            summary.skipped.extend(self.reader.take_skipped_items());

            debug!(
                url_index = url_index,
                batch_len = batch.len(),
                total_items = summary.items,
                "Batch processed and checkpointed"
            );
        }

        info!(
            batches = summary.batches,
            items = summary.items,
            skipped = summary.skipped.len(),
            completed = summary.completed,
            "Batch step finished"
        );
        log_batch_operation(
            "execute",
            Some(&run_id),
            None,
            Some(summary.items),
            if summary.completed { "completed" } else { "paused" },
            None,
        );

        Ok(summary)
    }
}
