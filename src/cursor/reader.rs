//! # Batch Cursor Reader
//!
//! Returns at most `batch_size` pids per [`BatchCursorReader::read`] call, newest
//! first, walking the partitioned urls in order and returning `None` once every
//! url is exhausted.
//!
//! ## Keyset position
//!
//! Each url keeps an inclusive last-updated ceiling and the pids already
//! emitted at that instant ([`CursorState`]). Every read searches at or below
//! the ceiling, drops tie-set pids, and hands the batch to the
//! [`ThresholdAdvancer`]. Resources sharing a last-updated value across a batch
//! boundary are neither lost nor repeated, including across a restart from a
//! saved checkpoint.
//!
//! ## Failure semantics
//!
//! - Search failures return [`ReaderError::Fetch`] before any state changes, so
//!   calling `read()` again resumes from the same position.
//! - A pid whose last-updated value cannot be read is still emitted; it is
//!   recorded as a [`SkippedItem`] and excluded from the tie set.

use crate::config::ReaderConfig;
use crate::cursor::checkpoint::{CheckpointCodec, ExecutionContext};
use crate::cursor::state::{CursorState, RunState};
use crate::cursor::threshold::ThresholdAdvancer;
use crate::error::{ReaderError, Result, SkippedItem};
use crate::job::ReaderParameters;
use crate::models::{PartitionedUrl, ResourcePid, Timestamp};
use crate::search::{ResultFetcher, SearchRequest, TimestampLookup};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resumable reverse-chronological reader over a list of partitioned urls
///
/// Not safe to share between callers: `read()` takes `&mut self` and the
/// reader owns its [`RunState`] exclusively.
pub struct BatchCursorReader {
    partitioned_urls: Vec<PartitionedUrl>,
    batch_size: usize,
    start_time: Option<Timestamp>,
    fetcher: Arc<dyn ResultFetcher>,
    advancer: ThresholdAdvancer,
    state: RunState,
    /// Pids of the active url whose lookup failed during this process; they
    /// are not in the tie set, so they are filtered here to keep each read
    /// making progress
    unresolved: HashSet<ResourcePid>,
    skipped: Vec<SkippedItem>,
}

impl std::fmt::Debug for BatchCursorReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCursorReader")
            .field("partitioned_urls", &self.partitioned_urls)
            .field("batch_size", &self.batch_size)
            .field("start_time", &self.start_time)
            .field("state", &self.state)
            .finish()
    }
}

impl BatchCursorReader {
    /// Create a reader positioned at the start of a fresh run
    ///
    /// Fails with [`ReaderError::Configuration`] for an empty url list, a blank
    /// url or a zero batch size.
    pub fn new(
        partitioned_urls: Vec<PartitionedUrl>,
        batch_size: u32,
        start_time: Option<Timestamp>,
        fetcher: Arc<dyn ResultFetcher>,
        lookup: Arc<dyn TimestampLookup>,
    ) -> Result<Self> {
        if partitioned_urls.is_empty() {
            return Err(ReaderError::configuration(
                "url list must contain at least one search url",
            ));
        }
        if let Some(index) = partitioned_urls
            .iter()
            .position(|entry| entry.url.trim().is_empty())
        {
            return Err(ReaderError::configuration(format!(
                "url list entry {index} has a blank url"
            )));
        }
        if batch_size == 0 {
            return Err(ReaderError::configuration("batch size must be positive"));
        }

        let state = RunState::fresh(partitioned_urls.len(), start_time);
        Ok(Self {
            partitioned_urls,
            batch_size: batch_size as usize,
            start_time,
            fetcher,
            advancer: ThresholdAdvancer::new(lookup),
            state,
            unresolved: HashSet::new(),
            skipped: Vec::new(),
        })
    }

    /// Create a reader from resolved job parameters
    pub fn from_parameters(
        parameters: ReaderParameters,
        fetcher: Arc<dyn ResultFetcher>,
        lookup: Arc<dyn TimestampLookup>,
    ) -> Result<Self> {
        info!(
            operation = %parameters.operation_name,
            urls = parameters.request_list.len(),
            batch_size = parameters.batch_size,
            "Building batch reader from job parameters"
        );
        Self::new(
            parameters.request_list.partitioned_urls,
            parameters.batch_size,
            parameters.start_time,
            fetcher,
            lookup,
        )
    }

    /// Create a reader and restore its position from `context` using the
    /// configured recovery policy
    pub fn resume(
        parameters: ReaderParameters,
        config: &ReaderConfig,
        context: &ExecutionContext,
        fetcher: Arc<dyn ResultFetcher>,
        lookup: Arc<dyn TimestampLookup>,
    ) -> Result<Self> {
        let mut reader = Self::from_parameters(parameters, fetcher, lookup)?;
        reader.open(context, &CheckpointCodec::new(config.checkpoint_recovery))?;
        Ok(reader)
    }

    /// Replace the run state, e.g. one built directly in a test
    pub fn with_state(mut self, state: RunState) -> Result<Self> {
        if state.partition_count() != self.partitioned_urls.len() {
            return Err(ReaderError::configuration(format!(
                "run state covers {} urls but the reader has {}",
                state.partition_count(),
                self.partitioned_urls.len()
            )));
        }
        self.state = state;
        self.unresolved.clear();
        Ok(self)
    }

    /// Restore the run position from a saved context
    pub fn open(&mut self, context: &ExecutionContext, codec: &CheckpointCodec) -> Result<()> {
        self.state = codec.restore(context, self.partitioned_urls.len(), self.start_time)?;
        self.unresolved.clear();
        info!(
            active_index = self.state.active_index(),
            partition_count = self.state.partition_count(),
            "Batch reader opened"
        );
        Ok(())
    }

    /// Write the current run position into `context`
    pub fn update(&self, context: &mut ExecutionContext, codec: &CheckpointCodec) {
        codec.save_into(&self.state, context);
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn partitioned_urls(&self) -> &[PartitionedUrl] {
        &self.partitioned_urls
    }

    /// Drain the lookup failures recorded since the last call
    pub fn take_skipped_items(&mut self) -> Vec<SkippedItem> {
        std::mem::take(&mut self.skipped)
    }

    /// Next batch of pids, or `None` once every url is exhausted
    ///
    /// Never returns an empty batch: a url with nothing left under its ceiling
    /// is skipped within the same call. The active index only moves once a
    /// batch or end-of-data is reached, so a failed search on a later url
    /// leaves the state as it was.
    pub fn read(&mut self) -> Result<Option<Vec<ResourcePid>>> {
        let mut index = self.state.active_index();
        while index < self.state.partition_count() {
            let cursor = self.state.cursor(index).cloned().unwrap_or_default();
            let batch = self.fetch_candidates(index, &cursor)?;
            if !batch.is_empty() {
                self.move_to(index);
                self.advance_threshold(index, &cursor, &batch);
                return Ok(Some(batch));
            }

            info!(
                url_index = index,
                url = %self.partitioned_urls[index].url,
                "No more resources under threshold for url"
            );
            index += 1;
        }
        self.move_to(index);
        Ok(None)
    }

    fn move_to(&mut self, index: usize) {
        if self.state.active_index() == index {
            return;
        }
        while self.state.active_index() < index {
            self.state.advance_partition();
        }
        self.unresolved.clear();
    }

    fn advance_threshold(&mut self, index: usize, cursor: &CursorState, batch: &[ResourcePid]) {
        let update = self.advancer.advance(cursor, batch);
        for (pid, reason) in update.failed_lookups {
            warn!(
                url_index = index,
                pid = %pid,
                error = %reason,
                "Unable to read last-updated value; pid excluded from threshold"
            );
            self.unresolved.insert(pid);
            self.skipped.push(SkippedItem {
                partition_index: index,
                pid,
                reason,
            });
        }

        debug_assert!(
            match (cursor.threshold_high(), update.cursor.threshold_high()) {
                (Some(before), Some(after)) => after <= before,
                (Some(_), None) => false,
                (None, _) => true,
            },
            "threshold must not increase"
        );

        debug!(
            url_index = index,
            batch_size = batch.len(),
            threshold_high = ?update.cursor.threshold_high(),
            tie_set = update.cursor.pids_at_threshold().len(),
            "Threshold advanced"
        );
        self.state.replace_cursor(index, update.cursor);
    }

    /// Pull pages until the batch is full or the bounded search is exhausted
    fn fetch_candidates(&self, index: usize, cursor: &CursorState) -> Result<Vec<ResourcePid>> {
        let partitioned_url = &self.partitioned_urls[index];
        let request = SearchRequest::reverse_chronological(
            partitioned_url,
            cursor.threshold_high(),
            self.batch_size,
        );

        let mut results = self
            .fetcher
            .search(&request)
            .map_err(|e| ReaderError::fetch(&request.url, e.message))?;

        // Unresolved pids belong to the active url only
        let unresolved = (index == self.state.active_index()).then_some(&self.unresolved);
        let mut seen = HashSet::new();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut pages = 0usize;
        while batch.len() < self.batch_size && results.has_next() {
            let page = results
                .next_page(self.batch_size)
                .map_err(|e| ReaderError::fetch(&request.url, e.message))?;
            pages += 1;
            for pid in page {
                if cursor.already_emitted(&pid)
                    || unresolved.is_some_and(|pids| pids.contains(&pid))
                {
                    continue;
                }
                if seen.insert(pid) {
                    batch.push(pid);
                    if batch.len() == self.batch_size {
                        break;
                    }
                }
            }
        }

        debug!(
            url_index = index,
            url = %request.url,
            partition = %request.partition,
            upper_bound = ?request.last_updated_upper_bound,
            pages = pages,
            results = batch.len(),
            "Search returned results"
        );

        Ok(batch)
    }
}
