//! # Job Parameters
//!
//! Builds and validates the parameter map a batch reader job is launched with,
//! and resolves it against host configuration into [`ReaderParameters`].

use crate::config::ReaderConfig;
use crate::constants::job_params::{BATCH_SIZE, OPERATION_NAME, REQUEST_LIST, START_TIME};
use crate::error::{ReaderError, Result};
use crate::models::{RequestList, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Named launch parameters of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParameters {
    values: BTreeMap<String, Value>,
}

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters for a new job starting a few minutes in the future
    pub fn build(
        operation_name: &str,
        request_list: &RequestList,
        batch_size: Option<u32>,
        config: &ReaderConfig,
    ) -> Result<Self> {
        let start_time = Timestamp::now().plus_minutes(config.minutes_in_future_to_process_from);
        Self::build_at(operation_name, request_list, batch_size, start_time)
    }

    /// Parameters for a job reading from `start_time` downwards
    pub fn build_at(
        operation_name: &str,
        request_list: &RequestList,
        batch_size: Option<u32>,
        start_time: Timestamp,
    ) -> Result<Self> {
        let mut parameters = Self::new();
        parameters.put(OPERATION_NAME, operation_name);
        parameters.put(REQUEST_LIST, request_list.to_json()?);
        parameters.put(START_TIME, start_time.as_millis());
        if let Some(batch_size) = batch_size {
            parameters.put(BATCH_SIZE, batch_size);
        }
        Ok(parameters)
    }

    pub fn put(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn validate(&self) -> Result<()> {
        self.operation_name()?;
        self.request_list()?;
        self.batch_size()?;
        self.start_time()?;
        Ok(())
    }

    fn operation_name(&self) -> Result<String> {
        let name = self
            .get(OPERATION_NAME)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if name.is_empty() {
            return Err(ReaderError::configuration(format!(
                "Job parameter '{OPERATION_NAME}' must be a non-blank string"
            )));
        }
        Ok(name.to_string())
    }

    fn request_list(&self) -> Result<RequestList> {
        let json = self
            .get(REQUEST_LIST)
            .ok_or_else(|| {
                ReaderError::configuration(format!("Missing job parameter '{REQUEST_LIST}'"))
            })?
            .as_str()
            .ok_or_else(|| {
                ReaderError::configuration(format!(
                    "Job parameter '{REQUEST_LIST}' must be a JSON string"
                ))
            })?;
        let request_list = RequestList::from_json(json)?;
        request_list.validate()?;
        Ok(request_list)
    }

    fn batch_size(&self) -> Result<Option<u32>> {
        let Some(value) = self.get(BATCH_SIZE) else {
            return Ok(None);
        };
        value
            .as_u64()
            .and_then(|size| u32::try_from(size).ok())
            .filter(|size| *size > 0)
            .map(Some)
            .ok_or_else(|| {
                ReaderError::configuration(format!(
                    "Job parameter '{BATCH_SIZE}' must be a positive integer, got {value}"
                ))
            })
    }

    fn start_time(&self) -> Result<Option<Timestamp>> {
        match self.get(START_TIME) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .map(|millis| Some(Timestamp::from_millis(millis)))
                .ok_or_else(|| {
                    ReaderError::configuration(format!(
                        "Job parameter '{START_TIME}' must be epoch milliseconds, got {value}"
                    ))
                }),
        }
    }
}

/// Validated inputs of a [`crate::cursor::BatchCursorReader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderParameters {
    pub operation_name: String,
    pub request_list: RequestList,
    pub batch_size: u32,
    /// `None` starts every url unbounded
    pub start_time: Option<Timestamp>,
}

impl ReaderParameters {
    /// Validate `parameters` and fill the batch size from `config` when absent
    pub fn resolve(parameters: &JobParameters, config: &ReaderConfig) -> Result<Self> {
        Ok(Self {
            operation_name: parameters.operation_name()?,
            request_list: parameters.request_list()?,
            batch_size: config.effective_batch_size(parameters.batch_size()?),
            start_time: parameters.start_time()?,
        })
    }
}
