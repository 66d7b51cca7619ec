//! Execution context handed to a job by the scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::Notify;

use super::errors::JobError;

/// Free-form per-fire data supplied by the trigger.
pub type JobDataMap = BTreeMap<String, serde_json::Value>;

/// Cooperative cancellation signal.
///
/// Cloning shares the signal. The executor never interrupts work; the job
/// decides where to check.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Clear the signal so that later runs start uncancelled.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel() is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Opaque context of one fire: trigger metadata, job data and cancellation.
#[derive(Debug, Clone)]
pub struct JobContext {
    trigger_name: String,
    fire_time: DateTime<Utc>,
    data: JobDataMap,
    cancellation: CancellationToken,
}

impl JobContext {
    pub fn new(trigger_name: impl Into<String>, fire_time: DateTime<Utc>) -> Self {
        Self {
            trigger_name: trigger_name.into(),
            fire_time,
            data: JobDataMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_data(mut self, data: JobDataMap) -> Self {
        self.data = data;
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn trigger_name(&self) -> &str {
        &self.trigger_name
    }

    pub fn fire_time(&self) -> DateTime<Utc> {
        self.fire_time
    }

    pub fn data(&self) -> &JobDataMap {
        &self.data
    }

    /// Decode one entry of the job data map.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, JobError> {
        self.data
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|source| JobError::InvalidData {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// `Err(JobError::Cancelled)` once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<(), JobError> {
        if self.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }
}
