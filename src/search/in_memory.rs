//! # In-Memory Resource Store
//!
//! Reference [`ResultFetcher`] and [`TimestampLookup`] over a vector of
//! resources. Searches snapshot the matching pids when they start, so
//! resources inserted mid-iteration only show up in later searches, the same
//! way a database cursor behaves.
//!
//! Matching is deliberately simple: the resource type before `?` in the url
//! must equal the stored resource type (an empty type matches everything), and
//! a partition scope with ids only matches resources stored in one of those
//! partitions. Partition names are not resolved.
//!
//! Fault injection hooks let tests exercise transient search failures and
//! resources that disappear between search and lookup.

use super::{ResultFetcher, ResultIterator, SearchRequest, SortOrder, TimestampLookup};
use crate::error::{FetchError, LookupError};
use crate::models::{ResourcePid, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

const DEFAULT_MAX_PAGE_SIZE: usize = 1_000;

/// A stored resource as seen by the search engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResource {
    pub pid: ResourcePid,
    pub resource_type: String,
    pub last_updated: Timestamp,
    pub partition_id: Option<i32>,
}

impl StoredResource {
    pub fn new(pid: i64, resource_type: impl Into<String>, last_updated_millis: i64) -> Self {
        Self {
            pid: ResourcePid::new(pid),
            resource_type: resource_type.into(),
            last_updated: Timestamp::from_millis(last_updated_millis),
            partition_id: None,
        }
    }

    pub fn in_partition(mut self, partition_id: i32) -> Self {
        self.partition_id = Some(partition_id);
        self
    }

    fn matches(&self, request: &SearchRequest) -> bool {
        let resource_type = request.resource_type();
        if !resource_type.is_empty() && resource_type != self.resource_type {
            return false;
        }
        if !request.partition.partition_ids.is_empty() {
            match self.partition_id {
                Some(id) if request.partition.partition_ids.contains(&id) => {}
                _ => return false,
            }
        }
        request
            .last_updated_upper_bound
            .map_or(true, |bound| self.last_updated <= bound)
    }
}

#[derive(Debug, Default)]
struct FaultPlan {
    failing_searches: usize,
    failing_pages: usize,
    unreadable: HashSet<ResourcePid>,
}

/// Vector-backed search engine and pid reader
#[derive(Debug)]
pub struct InMemoryResourceStore {
    resources: RwLock<Vec<StoredResource>>,
    max_page_size: usize,
    faults: Mutex<FaultPlan>,
    searches: AtomicUsize,
}

impl Default for InMemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(Vec::new()),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            faults: Mutex::new(FaultPlan::default()),
            searches: AtomicUsize::new(0),
        }
    }

    /// Cap every internal page at `max_page_size` pids regardless of the hint
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn with_resources(self, resources: impl IntoIterator<Item = StoredResource>) -> Self {
        self.resources.write().extend(resources);
        self
    }

    pub fn insert(&self, resource: StoredResource) {
        self.resources.write().push(resource);
    }

    /// Remove a resource; returns whether it existed
    pub fn delete(&self, pid: ResourcePid) -> bool {
        let mut resources = self.resources.write();
        let before = resources.len();
        resources.retain(|resource| resource.pid != pid);
        resources.len() != before
    }

    /// Keep the resource searchable but fail every lookup of it
    pub fn make_unreadable(&self, pid: ResourcePid) {
        self.faults.lock().unreadable.insert(pid);
    }

    /// Fail the next `count` calls to `search`
    pub fn fail_next_searches(&self, count: usize) {
        self.faults.lock().failing_searches = count;
    }

    /// Fail the next `count` page pulls across all open iterators
    pub fn fail_next_pages(&self, count: usize) {
        self.faults.lock().failing_pages = count;
    }

    /// Number of searches started, including failed ones
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }

    fn take_fault(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

impl ResultFetcher for InMemoryResourceStore {
    fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Box<dyn ResultIterator + '_>, FetchError> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        if Self::take_fault(&mut self.faults.lock().failing_searches) {
            return Err(FetchError::new(format!(
                "injected search failure for {}",
                request.url
            )));
        }

        let mut matches: Vec<(Timestamp, ResourcePid)> = self
            .resources
            .read()
            .iter()
            .filter(|resource| resource.matches(request))
            .map(|resource| (resource.last_updated, resource.pid))
            .collect();

        // Stable sorts keep insertion order within equal timestamps
        match request.sort {
            SortOrder::LastUpdatedDescending => matches.sort_by_key(|(ts, _)| Reverse(*ts)),
            SortOrder::LastUpdatedAscending => matches.sort_by_key(|(ts, _)| *ts),
        }

        trace!(
            url = %request.url,
            upper_bound = ?request.last_updated_upper_bound,
            matches = matches.len(),
            "In-memory search snapshot taken"
        );

        Ok(Box::new(InMemoryResults {
            store: self,
            pids: matches.into_iter().map(|(_, pid)| pid).collect(),
            position: 0,
            page_limit: request.page_size_hint.clamp(1, self.max_page_size),
        }))
    }
}

impl TimestampLookup for InMemoryResourceStore {
    fn last_updated(&self, pid: ResourcePid) -> Result<Timestamp, LookupError> {
        if self.faults.lock().unreadable.contains(&pid) {
            return Err(LookupError::Unavailable {
                pid,
                message: "resource marked unreadable".to_string(),
            });
        }
        self.resources
            .read()
            .iter()
            .find(|resource| resource.pid == pid)
            .map(|resource| resource.last_updated)
            .ok_or(LookupError::NotFound { pid })
    }
}

struct InMemoryResults<'a> {
    store: &'a InMemoryResourceStore,
    pids: Vec<ResourcePid>,
    position: usize,
    page_limit: usize,
}

impl ResultIterator for InMemoryResults<'_> {
    fn next_page(&mut self, max_results: usize) -> Result<Vec<ResourcePid>, FetchError> {
        if InMemoryResourceStore::take_fault(&mut self.store.faults.lock().failing_pages) {
            return Err(FetchError::new("injected page failure"));
        }
        let take = max_results.min(self.page_limit);
        let end = (self.position + take).min(self.pids.len());
        let page = self.pids[self.position..end].to_vec();
        self.position = end;
        Ok(page)
    }

    fn has_next(&self) -> bool {
        self.position < self.pids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PartitionedUrl, RequestPartitionId};

    fn pids(ids: &[i64]) -> Vec<ResourcePid> {
        ids.iter().copied().map(ResourcePid::new).collect()
    }

    fn drain(iter: &mut dyn ResultIterator, page: usize) -> Vec<ResourcePid> {
        let mut out = Vec::new();
        while iter.has_next() {
            out.extend(iter.next_page(page).unwrap());
        }
        out
    }

    fn store() -> InMemoryResourceStore {
        InMemoryResourceStore::new().with_resources([
            StoredResource::new(1, "Patient", 10),
            StoredResource::new(2, "Patient", 30),
            StoredResource::new(3, "Observation", 20),
            StoredResource::new(4, "Patient", 20).in_partition(7),
            StoredResource::new(5, "Patient", 30),
        ])
    }

    #[test]
    fn test_search_sorts_descending_with_stable_ties() {
        let store = store();
        let request =
            SearchRequest::reverse_chronological(&PartitionedUrl::new("Patient?", None), None, 10);
        let mut results = store.search(&request).unwrap();
        assert_eq!(drain(results.as_mut(), 10), pids(&[2, 5, 4, 1]));
    }

    #[test]
    fn test_search_honours_inclusive_bound_and_partition() {
        let store = store();
        let url = PartitionedUrl::new("Patient?", Some(RequestPartitionId::from_partition_id(7)));
        let request =
            SearchRequest::reverse_chronological(&url, Some(Timestamp::from_millis(20)), 10);
        let mut results = store.search(&request).unwrap();
        assert_eq!(drain(results.as_mut(), 10), pids(&[4]));

        let everything = SearchRequest {
            sort: SortOrder::LastUpdatedAscending,
            ..SearchRequest::reverse_chronological(
                &PartitionedUrl::new("?", None),
                Some(Timestamp::from_millis(20)),
                10,
            )
        };
        let mut results = store.search(&everything).unwrap();
        assert_eq!(drain(results.as_mut(), 10), pids(&[1, 3, 4]));
    }

    #[test]
    fn test_pages_are_capped() {
        let store = store().with_max_page_size(2);
        let request =
            SearchRequest::reverse_chronological(&PartitionedUrl::new("Patient", None), None, 10);
        let mut results = store.search(&request).unwrap();

        assert_eq!(results.next_page(10).unwrap().len(), 2);
        assert!(results.has_next());
        assert_eq!(results.next_page(1).unwrap(), pids(&[4]));
        assert_eq!(results.next_page(10).unwrap(), pids(&[1]));
        assert!(!results.has_next());
        assert!(results.next_page(10).unwrap().is_empty());
    }

    #[test]
    fn test_injected_faults() {
        let store = store();
        let request =
            SearchRequest::reverse_chronological(&PartitionedUrl::new("Patient", None), None, 10);

        store.fail_next_searches(1);
        assert!(store.search(&request).is_err());
        assert!(store.search(&request).is_ok());
        assert_eq!(store.search_count(), 2);

        store.fail_next_pages(1);
        let mut results = store.search(&request).unwrap();
        assert!(results.next_page(10).is_err());
        assert_eq!(results.next_page(10).unwrap().len(), 4);
    }

    #[test]
    fn test_lookup() {
        let store = store();
        assert_eq!(
            store.last_updated(ResourcePid::new(3)).unwrap(),
            Timestamp::from_millis(20)
        );

        assert!(store.delete(ResourcePid::new(3)));
        assert!(!store.delete(ResourcePid::new(3)));
        assert_eq!(
            store.last_updated(ResourcePid::new(3)),
            Err(LookupError::NotFound {
                pid: ResourcePid::new(3)
            })
        );

        store.make_unreadable(ResourcePid::new(1));
        assert!(matches!(
            store.last_updated(ResourcePid::new(1)),
            Err(LookupError::Unavailable { .. })
        ));
    }
}
