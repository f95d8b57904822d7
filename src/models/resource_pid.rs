use serde::{Deserialize, Serialize};
use std::fmt;

/// Persistent identifier of a stored resource
///
/// Opaque 64-bit handle returned by searches and emitted in batches. The
/// reader never interprets the value beyond equality and hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePid(i64);

impl ResourcePid {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> i64 {
        self.0
    }
}

impl From<i64> for ResourcePid {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ResourcePid> for i64 {
    fn from(pid: ResourcePid) -> Self {
        pid.0
    }
}

impl fmt::Display for ResourcePid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
