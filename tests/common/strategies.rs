use proptest::prelude::*;
use std::collections::BTreeSet;
use tasker_batch_reader::cursor::{CursorState, RunState};
use tasker_batch_reader::models::{ResourcePid, Timestamp};
use tasker_batch_reader::search::StoredResource;

pub const RESOURCE_TYPES: [&str; 2] = ["Patient", "Observation"];

/// Resources with unique pids and heavily tied last-updated values
pub fn tied_resources_strategy() -> impl Strategy<Value = Vec<StoredResource>> {
    prop::collection::vec((0usize..RESOURCE_TYPES.len(), 0i64..6), 0..40).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, (type_index, last_updated))| {
                StoredResource::new(index as i64 + 1, RESOURCE_TYPES[type_index], last_updated)
            })
            .collect()
    })
}

pub fn batch_size_strategy() -> impl Strategy<Value = u32> {
    1u32..6
}

/// Which batch numbers trigger a restart from the checkpoint
pub fn restart_plan_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..50)
}

pub fn cursor_state_strategy() -> impl Strategy<Value = CursorState> {
    prop_oneof![
        Just(CursorState::starting_at(None)),
        (
            -1_000i64..1_000_000,
            prop::collection::btree_set(1i64..500, 0..6)
        )
            .prop_map(|(millis, ids)| {
                let ties: BTreeSet<ResourcePid> = ids.into_iter().map(ResourcePid::new).collect();
                CursorState::at_threshold(Timestamp::from_millis(millis), ties)
            }),
    ]
}

pub fn run_state_strategy() -> impl Strategy<Value = RunState> {
    prop::collection::vec(cursor_state_strategy(), 1..5).prop_flat_map(|cursors| {
        let count = cursors.len();
        (0..=count).prop_map(move |active_index| {
            RunState::from_parts(active_index, cursors.clone())
                .expect("generated run state should be consistent")
        })
    })
}
