//! # Structured Logging Module
//!
//! Console logging for batch reader jobs, JSON when
//! `BATCH_READER_LOG_FORMAT=json`. `RUST_LOG` takes precedence over the
//! configured level.

use crate::config::ReaderConfig;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_structured_logging(config: &ReaderConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
        let json = is_json_format();

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            log_level = %config.log_level,
            json = json,
            "STRUCTURED LOGGING: Initialized"
        );
    });
}

fn is_json_format() -> bool {
    std::env::var("BATCH_READER_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for batch operations
pub fn log_batch_operation(
    operation: &str,
    run_id: Option<&str>,
    url_index: Option<usize>,
    batch_len: Option<usize>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        run_id = run_id,
        url_index = url_index,
        batch_len = batch_len,
        status = %status,
        details = details,
        "BATCH_OPERATION"
    );
}
