//! # System Constants
//!
//! Job parameter names, checkpoint keys and defaults shared by the reader,
//! the checkpoint codec and the step runner.

/// Job parameter names accepted by the reader
pub mod job_params {
    /// Name of the operation the job runs on behalf of
    pub const OPERATION_NAME: &str = "operation-name";
    /// JSON request list of partitioned urls
    pub const REQUEST_LIST: &str = "url-list";
    /// Maximum number of pids per batch
    pub const BATCH_SIZE: &str = "batch-size";
    /// Initial inclusive last-updated ceiling, epoch milliseconds
    pub const START_TIME: &str = "start-time";
}

/// Execution-context keys written by the checkpoint codec
pub mod checkpoint_keys {
    /// Namespace shared by every key below
    pub const PREFIX: &str = "current.";
    /// Index of the url currently being read
    pub const CURRENT_URL_INDEX: &str = "current.url-index";
    /// Ceiling per url index, suffixed with `.<index>`
    pub const CURRENT_THRESHOLD_HIGH: &str = "current.threshold-high";
    /// Tie-set pids per url index, suffixed with `.<index>`
    pub const CURRENT_THRESHOLD_HIGH_PIDS: &str = "current.threshold-high-pids";

    pub fn threshold_high_key(index: usize) -> String {
        format!("{CURRENT_THRESHOLD_HIGH}.{index}")
    }

    pub fn threshold_high_pids_key(index: usize) -> String {
        format!("{CURRENT_THRESHOLD_HIGH_PIDS}.{index}")
    }
}

/// Default values used when configuration leaves them unset
pub mod defaults {
    pub const BATCH_SIZE: u32 = 100;
    /// New jobs read from slightly in the future so resources written while
    /// the job is being launched are still included
    pub const MINUTES_IN_FUTURE_TO_PROCESS_FROM: i64 = 1;
    pub const LOG_LEVEL: &str = "info";
}

#[cfg(test)]
mod tests {
    use super::checkpoint_keys::*;

    #[test]
    fn test_checkpoint_keys_share_prefix() {
        assert!(CURRENT_URL_INDEX.starts_with(PREFIX));
        assert_eq!(threshold_high_key(3), "current.threshold-high.3");
        assert_eq!(threshold_high_pids_key(0), "current.threshold-high-pids.0");
        assert!(threshold_high_pids_key(7).starts_with(PREFIX));
    }
}
