//! # Reader Configuration
//!
//! Host-level defaults for batch reader jobs. Values come from, in increasing
//! precedence: built-in defaults, an optional configuration file, and
//! `BATCH_READER__*` environment variables.

use crate::constants::defaults;
use crate::cursor::CheckpointRecovery;
use crate::error::{ReaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "BATCH_READER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Batch size used when the job does not specify one
    pub default_batch_size: u32,
    /// Offset applied to "now" when building the start time of a new job
    pub minutes_in_future_to_process_from: i64,
    /// Policy for unparseable checkpoint values
    pub checkpoint_recovery: CheckpointRecovery,
    pub log_level: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            default_batch_size: defaults::BATCH_SIZE,
            minutes_in_future_to_process_from: defaults::MINUTES_IN_FUTURE_TO_PROCESS_FROM,
            checkpoint_recovery: CheckpointRecovery::Strict,
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl ReaderConfig {
    /// Defaults overridden by single-underscore environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(batch_size) = std::env::var("BATCH_READER_DEFAULT_BATCH_SIZE") {
            config.default_batch_size = batch_size.parse().map_err(|e| {
                ReaderError::configuration(format!("Invalid default_batch_size: {e}"))
            })?;
        }

        if let Ok(minutes) = std::env::var("BATCH_READER_MINUTES_IN_FUTURE") {
            config.minutes_in_future_to_process_from = minutes.parse().map_err(|e| {
                ReaderError::configuration(format!("Invalid minutes_in_future: {e}"))
            })?;
        }

        if let Ok(recovery) = std::env::var("BATCH_READER_CHECKPOINT_RECOVERY") {
            config.checkpoint_recovery = parse_recovery(&recovery)?;
        }

        if let Ok(level) = std::env::var("BATCH_READER_LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Layer defaults, an optional file (format from its extension) and
    /// `BATCH_READER__<FIELD>` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Self::default()).map_err(config_error)?;
        let mut builder = ::config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_batch_size == 0 {
            return Err(ReaderError::configuration(
                "default_batch_size must be positive",
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(ReaderError::configuration("log_level must not be blank"));
        }
        Ok(())
    }

    /// Batch size from the job, falling back to the configured default
    pub fn effective_batch_size(&self, job_batch_size: Option<u32>) -> u32 {
        job_batch_size.unwrap_or(self.default_batch_size)
    }
}

fn parse_recovery(value: &str) -> Result<CheckpointRecovery> {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => Ok(CheckpointRecovery::Strict),
        "fallback_to_start_time" | "fallback" => Ok(CheckpointRecovery::FallbackToStartTime),
        other => Err(ReaderError::configuration(format!(
            "Invalid checkpoint_recovery '{other}' (expected strict or fallback_to_start_time)"
        ))),
    }
}

fn config_error(error: ::config::ConfigError) -> ReaderError {
    ReaderError::configuration(error.to_string())
}
