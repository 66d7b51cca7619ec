//! Domain events emitted around each fire.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::RunId;
use super::result::{ErrorDetail, JobStatus};
use super::role::Role;

/// Why a fire never reached the work function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Unauthorized,
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    RunRejected {
        job: String,
        role: Role,
        reason: RejectReason,
        at: DateTime<Utc>,
    },
    RunStarted {
        job: String,
        run_id: RunId,
        role: Role,
        at: DateTime<Utc>,
    },
    RunSucceeded {
        job: String,
        run_id: RunId,
        at: DateTime<Utc>,
    },
    RunFailed {
        job: String,
        run_id: RunId,
        detail: ErrorDetail,
        at: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn job(&self) -> &str {
        match self {
            DomainEvent::RunRejected { job, .. }
            | DomainEvent::RunStarted { job, .. }
            | DomainEvent::RunSucceeded { job, .. }
            | DomainEvent::RunFailed { job, .. } => job,
        }
    }

    pub fn run_id(&self) -> Option<RunId> {
        match self {
            DomainEvent::RunRejected { .. } => None,
            DomainEvent::RunStarted { run_id, .. }
            | DomainEvent::RunSucceeded { run_id, .. }
            | DomainEvent::RunFailed { run_id, .. } => Some(*run_id),
        }
    }

    /// The status a run is in once this event has happened.
    pub fn status(&self) -> Option<JobStatus> {
        match self {
            DomainEvent::RunRejected { .. } => None,
            DomainEvent::RunStarted { .. } => Some(JobStatus::Pending),
            DomainEvent::RunSucceeded { .. } => Some(JobStatus::Succeeded),
            DomainEvent::RunFailed { .. } => Some(JobStatus::Failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_is_internally_tagged() {
        let e = DomainEvent::RunRejected {
            job: "SendReport".to_string(),
            role: Role::new("Guest"),
            reason: RejectReason::Unauthorized,
            at: Utc::now(),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["event"], "run_rejected");
        assert_eq!(v["reason"], "unauthorized");
        assert_eq!(v["role"], "Guest");
        assert_eq!(e.job(), "SendReport");
        assert!(e.run_id().is_none());
        assert!(e.status().is_none());
    }
}
