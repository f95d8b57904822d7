//! # Checkpoint Codec
//!
//! Saves and restores a [`RunState`] through a flat key-value
//! [`ExecutionContext`], so a job can be interrupted and resumed without
//! skipping or re-emitting resources.
//!
//! ## Layout
//!
//! | key | value |
//! |-----|-------|
//! | `current.url-index` | active url index |
//! | `current.threshold-high.<i>` | ceiling in epoch millis, or `null` when unbounded |
//! | `current.threshold-high-pids.<i>` | tie-set pids, omitted when empty |
//!
//! Contexts written without the tie-set key restore with an empty tie set.
//!
//! ## Recovery
//!
//! An unparseable value is fatal under [`CheckpointRecovery::Strict`]. Under
//! [`CheckpointRecovery::FallbackToStartTime`] the affected url restarts from
//! the default start time, which can re-emit resources but never skips them.

use crate::constants::checkpoint_keys::{
    threshold_high_key, threshold_high_pids_key, CURRENT_URL_INDEX, PREFIX,
};
use crate::cursor::state::{CursorState, RunState};
use crate::error::CheckpointError;
use crate::models::{ResourcePid, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Flat key-value execution state handed to a durable store by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    entries: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What restore does with a value it cannot parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointRecovery {
    #[default]
    Strict,
    FallbackToStartTime,
}

/// Encodes [`RunState`] into an [`ExecutionContext`] and back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointCodec {
    recovery: CheckpointRecovery,
}

impl CheckpointCodec {
    pub fn new(recovery: CheckpointRecovery) -> Self {
        Self { recovery }
    }

    pub fn recovery(&self) -> CheckpointRecovery {
        self.recovery
    }

    /// Encode `state` into a new context
    pub fn save(&self, state: &RunState) -> ExecutionContext {
        let mut context = ExecutionContext::new();
        self.save_into(state, &mut context);
        context
    }

    /// Encode `state` into an existing context, replacing earlier cursor keys
    ///
    /// Keys outside the `current.` namespace are left untouched.
    pub fn save_into(&self, state: &RunState, context: &mut ExecutionContext) {
        let stale: Vec<String> = context
            .keys()
            .filter(|key| key.starts_with(PREFIX))
            .map(str::to_string)
            .collect();
        for key in stale {
            context.remove(&key);
        }

        context.put(CURRENT_URL_INDEX, state.active_index() as u64);
        for (index, cursor) in state.cursors().iter().enumerate() {
            let high = cursor
                .threshold_high()
                .map_or(Value::Null, |ts| Value::from(ts.as_millis()));
            context.put(threshold_high_key(index), high);

            if !cursor.pids_at_threshold().is_empty() {
                let pids: Vec<i64> = cursor.pids_at_threshold().iter().map(|p| p.id()).collect();
                context.put(threshold_high_pids_key(index), pids);
            }
        }
    }

    /// Rebuild the state of a run over `partition_count` urls
    ///
    /// Urls with no stored ceiling start at `default_start_time` with an empty
    /// tie set. A missing url index starts the run at the first url.
    pub fn restore(
        &self,
        context: &ExecutionContext,
        partition_count: usize,
        default_start_time: Option<Timestamp>,
    ) -> Result<RunState, CheckpointError> {
        let active_index = match self.restore_url_index(context, partition_count) {
            Ok(index) => index,
            Err(error) => self.recover(error, 0)?,
        };

        let mut cursors = Vec::with_capacity(partition_count);
        for index in 0..partition_count {
            let cursor = match restore_cursor(context, index, default_start_time) {
                Ok(cursor) => cursor,
                Err(error) => {
                    self.recover(error, CursorState::starting_at(default_start_time))?
                }
            };
            cursors.push(cursor);
        }

        debug!(
            active_index = active_index,
            partition_count = partition_count,
            "Restored cursor state from checkpoint"
        );

        RunState::from_parts(active_index, cursors)
    }

    fn restore_url_index(
        &self,
        context: &ExecutionContext,
        partition_count: usize,
    ) -> Result<usize, CheckpointError> {
        let Some(value) = context.get(CURRENT_URL_INDEX) else {
            return Ok(0);
        };
        let index = value.as_i64().ok_or_else(|| {
            CheckpointError::corrupt_value(CURRENT_URL_INDEX, format!("expected integer, got {value}"))
        })?;
        usize::try_from(index)
            .ok()
            .filter(|index| *index <= partition_count)
            .ok_or(CheckpointError::IndexOutOfRange {
                index,
                partitions: partition_count,
            })
    }

    fn recover<T>(&self, error: CheckpointError, fallback: T) -> Result<T, CheckpointError> {
        match self.recovery {
            CheckpointRecovery::Strict => Err(error),
            CheckpointRecovery::FallbackToStartTime => {
                warn!(error = %error, "Discarding corrupt checkpoint value");
                Ok(fallback)
            }
        }
    }
}

fn restore_cursor(
    context: &ExecutionContext,
    index: usize,
    default_start_time: Option<Timestamp>,
) -> Result<CursorState, CheckpointError> {
    let high_key = threshold_high_key(index);
    let threshold_high = match context.get(&high_key) {
        None => default_start_time,
        Some(Value::Null) => None,
        Some(value) => Some(Timestamp::from_millis(value.as_i64().ok_or_else(|| {
            CheckpointError::corrupt_value(&high_key, format!("expected epoch millis, got {value}"))
        })?)),
    };

    let pids_key = threshold_high_pids_key(index);
    let pids_at_threshold = match context.get(&pids_key) {
        None | Some(Value::Null) => BTreeSet::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_i64().map(ResourcePid::new).ok_or_else(|| {
                    CheckpointError::corrupt_value(&pids_key, format!("expected pid, got {item}"))
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?,
        Some(other) => {
            return Err(CheckpointError::corrupt_value(
                &pids_key,
                format!("expected pid array, got {other}"),
            ))
        }
    };

    CursorState::from_parts(index, threshold_high, pids_at_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pid(id: i64) -> ResourcePid {
        ResourcePid::new(id)
    }

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn sample_state() -> RunState {
        RunState::from_parts(
            1,
            vec![
                CursorState::at_threshold(ts(5), []),
                CursorState::at_threshold(ts(10), [pid(1), pid(2)]),
                CursorState::starting_at(None),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_save_layout() {
        let context = CheckpointCodec::default().save(&sample_state());

        assert_eq!(context.get("current.url-index"), Some(&json!(1)));
        assert_eq!(context.get("current.threshold-high.0"), Some(&json!(5)));
        assert_eq!(context.get("current.threshold-high.1"), Some(&json!(10)));
        assert_eq!(context.get("current.threshold-high.2"), Some(&Value::Null));
        assert_eq!(context.get("current.threshold-high-pids.1"), Some(&json!([1, 2])));
        assert!(!context.contains_key("current.threshold-high-pids.0"));
        assert_eq!(context.len(), 5);
    }

    #[test]
    fn test_restore_round_trip_ignores_default() {
        let codec = CheckpointCodec::default();
        let state = sample_state();
        let context = codec.save(&state);

        assert_eq!(codec.restore(&context, 3, None).unwrap(), state);
        assert_eq!(codec.restore(&context, 3, Some(ts(999))).unwrap(), state);
    }

    #[test]
    fn test_restore_empty_context_is_fresh_run() {
        let codec = CheckpointCodec::default();
        let restored = codec.restore(&ExecutionContext::new(), 2, Some(ts(42))).unwrap();
        assert_eq!(restored, RunState::fresh(2, Some(ts(42))));
    }

    #[test]
    fn test_restore_legacy_layout_without_tie_set() {
        let mut context = ExecutionContext::new();
        context.put("current.url-index", 0);
        context.put("current.threshold-high.0", 1_000);

        let restored = CheckpointCodec::default()
            .restore(&context, 2, Some(ts(5_000)))
            .unwrap();
        assert_eq!(restored.cursor(0), Some(&CursorState::at_threshold(ts(1_000), [])));
        assert_eq!(restored.cursor(1), Some(&CursorState::starting_at(Some(ts(5_000)))));
    }

    #[test]
    fn test_save_into_replaces_stale_cursor_keys() {
        let codec = CheckpointCodec::default();
        let mut context = codec.save(&sample_state());
        context.put("job.owner", "batch");

        codec.save_into(&RunState::fresh(1, Some(ts(3))), &mut context);

        assert!(!context.contains_key("current.threshold-high-pids.1"));
        assert!(!context.contains_key("current.threshold-high.2"));
        assert_eq!(context.get("job.owner"), Some(&json!("batch")));
        assert_eq!(context.get("current.url-index"), Some(&json!(0)));
    }

    #[test]
    fn test_strict_restore_rejects_corruption() {
        let codec = CheckpointCodec::new(CheckpointRecovery::Strict);

        let mut context = ExecutionContext::new();
        context.put("current.threshold-high.0", "yesterday");
        assert!(matches!(
            codec.restore(&context, 1, None),
            Err(CheckpointError::CorruptValue { .. })
        ));

        let mut context = ExecutionContext::new();
        context.put("current.url-index", 4);
        assert!(matches!(
            codec.restore(&context, 2, None),
            Err(CheckpointError::IndexOutOfRange { index: 4, partitions: 2 })
        ));

        let mut context = ExecutionContext::new();
        context.put("current.threshold-high.0", Value::Null);
        context.put("current.threshold-high-pids.0", json!([7]));
        assert!(matches!(
            codec.restore(&context, 1, None),
            Err(CheckpointError::OrphanTieSet { index: 0 })
        ));

        let mut context = ExecutionContext::new();
        context.put("current.threshold-high.0", 10);
        context.put("current.threshold-high-pids.0", json!(["a"]));
        assert!(codec.restore(&context, 1, None).is_err());
    }

    #[test]
    fn test_fallback_restore_resets_only_corrupt_partition() {
        let codec = CheckpointCodec::new(CheckpointRecovery::FallbackToStartTime);
        let mut context = ExecutionContext::new();
        context.put("current.url-index", 1);
        context.put("current.threshold-high.0", "garbage");
        context.put("current.threshold-high.1", 20);
        context.put("current.threshold-high-pids.1", json!([3]));

        let restored = codec.restore(&context, 2, Some(ts(100))).unwrap();
        assert_eq!(restored.active_index(), 1);
        assert_eq!(restored.cursor(0), Some(&CursorState::starting_at(Some(ts(100)))));
        assert_eq!(restored.cursor(1), Some(&CursorState::at_threshold(ts(20), [pid(3)])));

        let mut context = ExecutionContext::new();
        context.put("current.url-index", -1);
        assert_eq!(codec.restore(&context, 2, None).unwrap().active_index(), 0);
    }

    #[test]
    fn test_context_json_round_trip() {
        let context = CheckpointCodec::default().save(&sample_state());
        let json = context.to_json().unwrap();
        assert_eq!(ExecutionContext::from_json(&json).unwrap(), context);
    }
}
