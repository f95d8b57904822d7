//! # Partitioned Search Urls
//!
//! The ordered list of searches a job walks through. Each entry pairs an
//! opaque search url (the filter descriptor handed to the search engine) with
//! the storage partition scope it runs against.

use crate::error::{ReaderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage partition scope for a search
///
/// Empty id and name lists mean "all partitions".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPartitionId {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_ids: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_names: Vec<String>,
}

impl RequestPartitionId {
    pub fn all_partitions() -> Self {
        Self::default()
    }

    pub fn from_partition_id(partition_id: i32) -> Self {
        Self {
            partition_ids: vec![partition_id],
            partition_names: Vec::new(),
        }
    }

    pub fn from_partition_name(name: impl Into<String>) -> Self {
        Self {
            partition_ids: Vec::new(),
            partition_names: vec![name.into()],
        }
    }

    pub fn is_all_partitions(&self) -> bool {
        self.partition_ids.is_empty() && self.partition_names.is_empty()
    }
}

impl fmt::Display for RequestPartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all_partitions() {
            return write!(f, "all");
        }
        let mut parts: Vec<String> = self.partition_ids.iter().map(|id| id.to_string()).collect();
        parts.extend(self.partition_names.iter().cloned());
        write!(f, "{}", parts.join(","))
    }
}

/// One search of the job, immutable for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionedUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_partition_id: Option<RequestPartitionId>,
}

impl PartitionedUrl {
    pub fn new(url: impl Into<String>, request_partition_id: Option<RequestPartitionId>) -> Self {
        Self {
            url: url.into(),
            request_partition_id,
        }
    }

    /// Partition scope, defaulting to all partitions when unset
    pub fn partition(&self) -> RequestPartitionId {
        self.request_partition_id.clone().unwrap_or_default()
    }
}

/// The `url-list` job parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestList {
    #[serde(default)]
    pub partitioned_urls: Vec<PartitionedUrl>,
}

impl RequestList {
    pub fn new(partitioned_urls: Vec<PartitionedUrl>) -> Self {
        Self { partitioned_urls }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ReaderError::configuration(format!("Invalid url list JSON: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ReaderError::configuration(format!("Unable to encode url list: {e}")))
    }

    /// Reject lists the reader cannot run: empty lists and blank urls
    pub fn validate(&self) -> Result<()> {
        if self.partitioned_urls.is_empty() {
            return Err(ReaderError::configuration(
                "url list must contain at least one search url",
            ));
        }
        if let Some(index) = self
            .partitioned_urls
            .iter()
            .position(|entry| entry.url.trim().is_empty())
        {
            return Err(ReaderError::configuration(format!(
                "url list entry {index} has a blank url"
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.partitioned_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitioned_urls.is_empty()
    }
}
