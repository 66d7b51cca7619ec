//! Error taxonomy.
//!
//! - `JobError`: what a work function reports.
//! - `ExecutorError`: what the executor reports to the scheduler.
//! - `InvalidStateError`: a terminal `JobResult` was marked again (a defect, not a business condition).
//! - `DefinitionError`: a job definition could not be constructed.

use std::sync::Arc;

use thiserror::Error;

use super::ids::RunId;
use super::result::{ErrorDetail, JobResult, JobStatus};
use super::role::Role;

/// Failure signalled by a job's work function.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{message}")]
    Failed { message: String, retryable: bool },

    #[error("job was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid job data for key `{key}`: {source}")]
    InvalidData {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            retryable: true,
        }
    }

    /// I/O failures are assumed transient; bad input and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Failed { retryable, .. } => *retryable,
            JobError::Io(_) => true,
            JobError::Cancelled | JobError::InvalidData { .. } => false,
        }
    }
}

/// Attempt to transition a `JobResult` that already left `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job result {run_id} is already terminal ({current:?})")]
pub struct InvalidStateError {
    pub run_id: RunId,
    pub current: JobStatus,
}

/// Failure reported by `JobExecutor::run` to the calling scheduler.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("role `{role}` is not authorized to run job `{job}`")]
    Unauthorized { job: String, role: Role },

    /// The run was recorded as `Failed`; `result` is its terminal snapshot.
    #[error("job `{job}` failed ({run_id}): {detail}")]
    Execution {
        job: String,
        run_id: RunId,
        detail: ErrorDetail,
        result: Arc<JobResult>,
    },

    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
}

impl ExecutorError {
    /// Whether a scheduler retry policy may act on this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutorError::Execution { detail, .. } => detail.retryable,
            ExecutorError::Unauthorized { .. } | ExecutorError::InvalidState(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("job name must not be empty")]
    EmptyName,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::failed(JobError::failed("boom"), false)]
    #[case::retryable(JobError::retryable("busy"), true)]
    #[case::io(JobError::from(std::io::Error::other("disk full")), true)]
    #[case::cancelled(JobError::Cancelled, false)]
    fn job_error_retryability(#[case] err: JobError, #[case] expected: bool) {
        assert_eq!(err.is_retryable(), expected);
    }

    #[test]
    fn io_error_message_is_passed_through() {
        let err = JobError::from(std::io::Error::other("disk full"));
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn unauthorized_is_never_retryable() {
        let err = ExecutorError::Unauthorized {
            job: "SendReport".to_string(),
            role: Role::new("Guest"),
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "role `Guest` is not authorized to run job `SendReport`"
        );
    }
}
