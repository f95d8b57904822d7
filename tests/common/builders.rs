use std::sync::Arc;
use tasker_batch_reader::cursor::{BatchCursorReader, CheckpointCodec, ExecutionContext};
use tasker_batch_reader::models::{PartitionedUrl, ResourcePid, Timestamp};
use tasker_batch_reader::search::{InMemoryResourceStore, StoredResource};

pub fn pids(ids: &[i64]) -> Vec<ResourcePid> {
    ids.iter().copied().map(ResourcePid::new).collect()
}

pub fn urls(urls: &[&str]) -> Vec<PartitionedUrl> {
    urls.iter().map(|url| PartitionedUrl::new(*url, None)).collect()
}

pub fn store_with(resources: impl IntoIterator<Item = StoredResource>) -> Arc<InMemoryResourceStore> {
    Arc::new(InMemoryResourceStore::new().with_resources(resources))
}

/// Five patients: three tied at 10, then 9 and 8
pub fn tied_patient_store() -> Arc<InMemoryResourceStore> {
    store_with([
        StoredResource::new(1, "Patient", 10),
        StoredResource::new(2, "Patient", 10),
        StoredResource::new(3, "Patient", 10),
        StoredResource::new(4, "Patient", 9),
        StoredResource::new(5, "Patient", 8),
    ])
}

pub fn reader(
    store: &Arc<InMemoryResourceStore>,
    search_urls: &[&str],
    batch_size: u32,
    start_time: Option<Timestamp>,
) -> BatchCursorReader {
    BatchCursorReader::new(
        urls(search_urls),
        batch_size,
        start_time,
        store.clone(),
        store.clone(),
    )
    .expect("reader configuration should be valid")
}

/// Read every remaining batch
pub fn drain(reader: &mut BatchCursorReader) -> Vec<Vec<ResourcePid>> {
    let mut batches = Vec::new();
    while let Some(batch) = reader.read().expect("read should succeed") {
        batches.push(batch);
    }
    batches
}

/// Run to completion, checkpointing after each batch and rebuilding the
/// reader from the checkpoint whenever `restart_after(batch_number)` says so
pub fn run_with_restarts(
    store: &Arc<InMemoryResourceStore>,
    search_urls: &[&str],
    batch_size: u32,
    start_time: Option<Timestamp>,
    mut restart_after: impl FnMut(usize) -> bool,
) -> Vec<ResourcePid> {
    let codec = CheckpointCodec::default();
    let mut context = ExecutionContext::new();
    let mut current = reader(store, search_urls, batch_size, start_time);
    let mut emitted = Vec::new();
    let mut batch_number = 0;

    while let Some(batch) = current.read().expect("read should succeed") {
        emitted.extend(batch);
        current.update(&mut context, &codec);
        batch_number += 1;

        if restart_after(batch_number) {
            // Persisted contexts go through JSON
            let json = context.to_json().expect("context should serialize");
            context = ExecutionContext::from_json(&json).expect("context should deserialize");
            current = reader(store, search_urls, batch_size, start_time);
            current.open(&context, &codec).expect("checkpoint should restore");
        }
    }
    emitted
}
