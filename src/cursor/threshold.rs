//! # Threshold Advancer
//!
//! Moves a partition's keyset position past a freshly emitted batch.
//!
//! The next ceiling is the *oldest* last-updated value in the batch, kept
//! inclusive. Resources sharing that instant may still be unfetched because the
//! page cutoff, not the filter, excluded them; an exclusive ceiling would lose
//! them. The pids of the batch at that instant join the tie set so the next
//! search skips exactly those and nothing else.

use crate::cursor::state::CursorState;
use crate::error::LookupError;
use crate::models::{ResourcePid, Timestamp};
use crate::search::TimestampLookup;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Result of advancing one partition's position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdUpdate {
    pub cursor: CursorState,
    /// Pids whose last-updated value could not be read; they are left out of
    /// the tie set
    pub failed_lookups: Vec<(ResourcePid, LookupError)>,
}

/// Computes the next ceiling and tie set from an emitted batch
#[derive(Clone)]
pub struct ThresholdAdvancer {
    lookup: Arc<dyn TimestampLookup>,
}

impl std::fmt::Debug for ThresholdAdvancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdAdvancer").finish()
    }
}

impl ThresholdAdvancer {
    pub fn new(lookup: Arc<dyn TimestampLookup>) -> Self {
        Self { lookup }
    }

    /// Advance `previous` past `batch`
    ///
    /// Resources whose last-updated value is now newer than the previous
    /// ceiling were modified after the search ran; they do not move the
    /// ceiling, which keeps it non-increasing. When no pid of the batch yields
    /// a usable instant the previous position is returned unchanged.
    pub fn advance(&self, previous: &CursorState, batch: &[ResourcePid]) -> ThresholdUpdate {
        let mut failed_lookups = Vec::new();
        let mut resolved: Vec<(ResourcePid, Timestamp)> = Vec::with_capacity(batch.len());

        for &pid in batch {
            match self.lookup.last_updated(pid) {
                Ok(last_updated) => {
                    if previous
                        .threshold_high()
                        .is_some_and(|high| last_updated > high)
                    {
                        debug!(
                            pid = %pid,
                            last_updated = %last_updated,
                            "Resource updated after search; ignoring for threshold"
                        );
                        continue;
                    }
                    resolved.push((pid, last_updated));
                }
                Err(error) => failed_lookups.push((pid, error)),
            }
        }

        let Some(oldest) = resolved.iter().map(|(_, ts)| *ts).min() else {
            return ThresholdUpdate {
                cursor: previous.clone(),
                failed_lookups,
            };
        };

        let at_oldest = resolved
            .iter()
            .filter(|(_, ts)| *ts == oldest)
            .map(|(pid, _)| *pid);

        let pids_at_threshold: BTreeSet<ResourcePid> = if previous.threshold_high() == Some(oldest)
        {
            previous
                .pids_at_threshold()
                .iter()
                .copied()
                .chain(at_oldest)
                .collect()
        } else {
            at_oldest.collect()
        };

        ThresholdUpdate {
            cursor: CursorState::at_threshold(oldest, pids_at_threshold),
            failed_lookups,
        }
    }
}
