//! # Search Collaborators
//!
//! Narrow capability traits the reader depends on. The search engine that
//! turns a url into a sorted result stream and the storage layer that reads a
//! resource back by pid both live outside this crate; hosts plug them in here.
//!
//! ## Contracts
//!
//! - [`ResultFetcher::search`] must return every pid matching the request whose
//!   last-updated value is at or below the inclusive upper bound, in the
//!   requested order. The page size hint only shapes internal paging; the
//!   iterator keeps yielding pages until the bounded result set is exhausted.
//! - [`TimestampLookup::last_updated`] fails with [`LookupError::NotFound`] when
//!   the resource vanished between search and lookup.

pub mod in_memory;

pub use in_memory::{InMemoryResourceStore, StoredResource};

use crate::error::{FetchError, LookupError};
use crate::models::{PartitionedUrl, RequestPartitionId, ResourcePid, Timestamp};
use serde::{Deserialize, Serialize};

/// Ordering of search results by last-updated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    LastUpdatedAscending,
    LastUpdatedDescending,
}

/// A search bounded by an inclusive last-updated ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub url: String,
    pub partition: RequestPartitionId,
    /// `None` searches without an upper bound
    pub last_updated_upper_bound: Option<Timestamp>,
    pub sort: SortOrder,
    pub page_size_hint: usize,
}

impl SearchRequest {
    /// Reverse-chronological search for one url, capped at `upper_bound`
    pub fn reverse_chronological(
        partitioned_url: &PartitionedUrl,
        upper_bound: Option<Timestamp>,
        page_size_hint: usize,
    ) -> Self {
        Self {
            url: partitioned_url.url.clone(),
            partition: partitioned_url.partition(),
            last_updated_upper_bound: upper_bound,
            sort: SortOrder::LastUpdatedDescending,
            page_size_hint,
        }
    }

    /// Resource type portion of the url (text before `?`)
    pub fn resource_type(&self) -> &str {
        self.url
            .split_once('?')
            .map_or(self.url.as_str(), |(resource_type, _)| resource_type)
            .trim()
    }
}

/// Pull iterator over the pids of one search
pub trait ResultIterator {
    /// Next page of at most `max_results` pids; may return fewer
    fn next_page(&mut self, max_results: usize) -> Result<Vec<ResourcePid>, FetchError>;

    /// Whether another call to `next_page` can yield more pids
    fn has_next(&self) -> bool;
}

/// Executes bounded searches
pub trait ResultFetcher: Send + Sync {
    fn search(&self, request: &SearchRequest)
        -> Result<Box<dyn ResultIterator + '_>, FetchError>;
}

/// Recovers the last-updated value of a resource
pub trait TimestampLookup: Send + Sync {
    fn last_updated(&self, pid: ResourcePid) -> Result<Timestamp, LookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_chronological_request() {
        let url = PartitionedUrl::new(
            "Patient?active=false",
            Some(RequestPartitionId::from_partition_id(3)),
        );
        let request =
            SearchRequest::reverse_chronological(&url, Some(Timestamp::from_millis(10)), 50);

        assert_eq!(request.url, "Patient?active=false");
        assert_eq!(request.partition, RequestPartitionId::from_partition_id(3));
        assert_eq!(
            request.last_updated_upper_bound,
            Some(Timestamp::from_millis(10))
        );
        assert_eq!(request.sort, SortOrder::LastUpdatedDescending);
        assert_eq!(request.page_size_hint, 50);
        assert_eq!(request.resource_type(), "Patient");
    }

    #[test]
    fn test_resource_type_without_query() {
        let url = PartitionedUrl::new("Observation", None);
        let request = SearchRequest::reverse_chronological(&url, None, 10);
        assert_eq!(request.resource_type(), "Observation");
        assert!(request.partition.is_all_partitions());
    }
}
