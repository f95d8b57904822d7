pub mod partitioned_url;
pub mod resource_pid;
pub mod timestamp;

// Re-export core models for easy access
pub use partitioned_url::{PartitionedUrl, RequestList, RequestPartitionId};
pub use resource_pid::ResourcePid;
pub use timestamp::Timestamp;
