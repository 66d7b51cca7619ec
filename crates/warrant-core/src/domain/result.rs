//! Job result: structured outcome of one execution attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::InvalidStateError;
use super::ids::RunId;

/// Status of a single run.
///
/// State transitions:
/// - Pending -> Succeeded
/// - Pending -> Failed
///
/// Nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The work function returned an error.
    Execution,

    /// The work function observed cancellation and stopped.
    Cancelled,

    /// The work function panicked.
    Panicked,
}

/// Error detail recorded on a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: FailureKind,
    pub message: String,

    /// Hint for the scheduler's retry policy. This core never retries by itself.
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorDetail {
    pub fn execution(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind: FailureKind::Execution,
            message: message.into(),
            retryable,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: "cancelled".to_string(),
            retryable: false,
        }
    }

    /// The run was dropped by its caller (timeout, aborted task) before it finished.
    pub fn abandoned() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: "run dropped before completion".to_string(),
            retryable: false,
        }
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panicked,
            message: message.into(),
            retryable: false,
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of one run.
///
/// Invariants:
/// - `finished_at` is set iff `status != Pending`
/// - `error` is set iff `status == Failed`
/// - `finished_at >= started_at`
///
/// Only the executor that created the result mutates it, and only while it is `Pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    run_id: RunId,
    status: JobStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,

    started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl JobResult {
    pub fn start(run_id: RunId, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status: JobStatus::Pending,
            payload: None,
            error: None,
            started_at,
            finished_at: None,
        }
    }

    pub fn mark_succeeded(
        &mut self,
        payload: Option<serde_json::Value>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), InvalidStateError> {
        self.ensure_pending()?;
        self.status = JobStatus::Succeeded;
        self.payload = payload;
        self.finished_at = Some(finished_at.max(self.started_at));
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        detail: ErrorDetail,
        finished_at: DateTime<Utc>,
    ) -> Result<(), InvalidStateError> {
        self.ensure_pending()?;
        self.status = JobStatus::Failed;
        self.error = Some(detail);
        self.finished_at = Some(finished_at.max(self.started_at));
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), InvalidStateError> {
        if self.status.is_terminal() {
            return Err(InvalidStateError {
                run_id: self.run_id,
                current: self.status,
            });
        }
        Ok(())
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Wall-clock duration of a finished run.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|f| f - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use ulid::Ulid;

    fn t(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, sec).unwrap()
    }

    fn pending() -> JobResult {
        JobResult::start(RunId::from_ulid(Ulid::new()), t(0))
    }

    #[test]
    fn new_result_is_pending_without_finish_time() {
        let r = pending();
        assert_eq!(r.status(), JobStatus::Pending);
        assert!(r.finished_at().is_none());
        assert!(r.payload().is_none());
        assert!(r.error().is_none());
        assert!(r.duration().is_none());
    }

    #[test]
    fn mark_succeeded_sets_payload_and_finish_time() {
        let mut r = pending();
        r.mark_succeeded(Some(json!("ok")), t(3)).unwrap();

        assert_eq!(r.status(), JobStatus::Succeeded);
        assert_eq!(r.payload(), Some(&json!("ok")));
        assert_eq!(r.finished_at(), Some(t(3)));
        assert_eq!(r.duration(), Some(chrono::Duration::seconds(3)));
        assert!(r.error().is_none());
    }

    #[test]
    fn mark_failed_sets_error_detail() {
        let mut r = pending();
        r.mark_failed(ErrorDetail::execution("disk full", true), t(1))
            .unwrap();

        assert_eq!(r.status(), JobStatus::Failed);
        let err = r.error().unwrap();
        assert_eq!(err.kind, FailureKind::Execution);
        assert_eq!(err.message, "disk full");
        assert!(r.payload().is_none());
    }

    #[test]
    fn second_mark_is_rejected_and_result_untouched() {
        let mut r = pending();
        r.mark_succeeded(Some(json!(1)), t(1)).unwrap();
        let before = r.clone();

        let err = r.mark_succeeded(Some(json!(2)), t(2)).unwrap_err();
        assert_eq!(err.current, JobStatus::Succeeded);
        assert_eq!(err.run_id, r.run_id());

        let err = r
            .mark_failed(ErrorDetail::execution("late", false), t(2))
            .unwrap_err();
        assert_eq!(err.current, JobStatus::Succeeded);

        assert_eq!(r, before);
    }

    #[test]
    fn mark_succeeded_after_failure_is_rejected() {
        let mut r = pending();
        r.mark_failed(ErrorDetail::cancelled(), t(1)).unwrap();
        let err = r.mark_succeeded(None, t(2)).unwrap_err();
        assert_eq!(err.current, JobStatus::Failed);
    }

    #[test]
    fn finish_time_is_clamped_to_start_time() {
        let mut r = JobResult::start(RunId::from_ulid(Ulid::new()), t(10));
        r.mark_succeeded(None, t(5)).unwrap();
        assert_eq!(r.finished_at(), Some(t(10)));
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
        assert_eq!(
            serde_json::to_string(&FailureKind::Panicked).unwrap(),
            "\"panicked\""
        );
    }

    #[test]
    fn pending_result_omits_finish_fields_in_json() {
        let v = serde_json::to_value(pending()).unwrap();
        assert_eq!(v["status"], "pending");
        assert!(v.get("finished_at").is_none());
        assert!(v.get("error").is_none());
    }
}
