//! # Cursor State
//!
//! Per-partition keyset position and the run-wide cursor over the url list.

use crate::error::CheckpointError;
use crate::models::{ResourcePid, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Keyset position within one partitioned url
///
/// `threshold_high` is the inclusive last-updated ceiling for the next search
/// (`None` = unbounded). `pids_at_threshold` holds the pids already emitted
/// whose last-updated value equals the ceiling; the next search excludes them.
/// The tie set is only ever non-empty when the ceiling is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    threshold_high: Option<Timestamp>,
    pids_at_threshold: BTreeSet<ResourcePid>,
}

impl CursorState {
    /// Fresh position with no emitted pids
    pub fn starting_at(threshold_high: Option<Timestamp>) -> Self {
        Self {
            threshold_high,
            pids_at_threshold: BTreeSet::new(),
        }
    }

    /// Position at `threshold_high` with `pids` already emitted at that instant
    pub fn at_threshold(
        threshold_high: Timestamp,
        pids: impl IntoIterator<Item = ResourcePid>,
    ) -> Self {
        Self {
            threshold_high: Some(threshold_high),
            pids_at_threshold: pids.into_iter().collect(),
        }
    }

    /// Rebuild from stored parts, rejecting a tie set without a ceiling
    pub fn from_parts(
        index: usize,
        threshold_high: Option<Timestamp>,
        pids_at_threshold: BTreeSet<ResourcePid>,
    ) -> Result<Self, CheckpointError> {
        if threshold_high.is_none() && !pids_at_threshold.is_empty() {
            return Err(CheckpointError::OrphanTieSet { index });
        }
        Ok(Self {
            threshold_high,
            pids_at_threshold,
        })
    }

    pub fn threshold_high(&self) -> Option<Timestamp> {
        self.threshold_high
    }

    pub fn pids_at_threshold(&self) -> &BTreeSet<ResourcePid> {
        &self.pids_at_threshold
    }

    pub fn already_emitted(&self, pid: &ResourcePid) -> bool {
        self.pids_at_threshold.contains(pid)
    }

    pub fn is_unbounded(&self) -> bool {
        self.threshold_high.is_none()
    }
}

/// Run-wide cursor: active url index plus one [`CursorState`] per url
///
/// Owned by a single reader; hosts that shard work across threads give each
/// worker its own `RunState` over a disjoint url list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    active_index: usize,
    cursors: Vec<CursorState>,
}

impl RunState {
    /// New run where every url starts at `start_time`
    pub fn fresh(partition_count: usize, start_time: Option<Timestamp>) -> Self {
        Self {
            active_index: 0,
            cursors: vec![CursorState::starting_at(start_time); partition_count],
        }
    }

    /// Assemble a state directly; the active index may equal the cursor count
    /// (a finished run) but not exceed it
    pub fn from_parts(
        active_index: usize,
        cursors: Vec<CursorState>,
    ) -> Result<Self, CheckpointError> {
        if active_index > cursors.len() {
            return Err(CheckpointError::IndexOutOfRange {
                index: i64::try_from(active_index).unwrap_or(i64::MAX),
                partitions: cursors.len(),
            });
        }
        Ok(Self {
            active_index,
            cursors,
        })
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn partition_count(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.active_index >= self.cursors.len()
    }

    pub fn cursor(&self, index: usize) -> Option<&CursorState> {
        self.cursors.get(index)
    }

    pub fn cursors(&self) -> &[CursorState] {
        &self.cursors
    }

    pub(crate) fn replace_cursor(&mut self, index: usize, cursor: CursorState) {
        if let Some(slot) = self.cursors.get_mut(index) {
            *slot = cursor;
        }
    }

    pub(crate) fn advance_partition(&mut self) {
        if !self.is_exhausted() {
            self.active_index += 1;
        }
    }
}
