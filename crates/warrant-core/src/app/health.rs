//! Health - 直近の run と連続失敗数から job の健全性を判定

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{JobResult, JobStatus, RunId};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRunInfo {
    pub run_id: RunId,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}

impl From<&JobResult> for LastRunInfo {
    fn from(result: &JobResult) -> Self {
        Self {
            run_id: result.run_id(),
            status: result.status(),
            started_at: result.started_at(),
            duration_ms: result.duration().map(|d| d.num_milliseconds()),
            error: result.error().map(|e| e.message.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobHealthStatus {
    pub job: String,
    pub status: HealthState,
    pub running: bool,
    pub cancelled: bool,
    pub last_run: Option<LastRunInfo>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobsHealthStatus {
    pub status: HealthState,
    pub jobs: Vec<JobHealthStatus>,
}

pub(crate) const DEGRADED_AFTER_FAILURES: u32 = 1;
pub(crate) const UNHEALTHY_AFTER_FAILURES: u32 = 3;

pub(crate) fn determine_health_state(
    last_run: Option<&JobResult>,
    consecutive_failures: u32,
) -> HealthState {
    match last_run.map(JobResult::status) {
        None | Some(JobStatus::Pending) | Some(JobStatus::Succeeded) => HealthState::Healthy,
        Some(JobStatus::Failed) => {
            if consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
                HealthState::Unhealthy
            } else if consecutive_failures >= DEGRADED_AFTER_FAILURES {
                HealthState::Degraded
            } else {
                HealthState::Healthy
            }
        }
    }
}

/// Worst state across all jobs; `Healthy` when there are none.
pub(crate) fn worst_state<'a>(states: impl IntoIterator<Item = &'a HealthState>) -> HealthState {
    states
        .into_iter()
        .fold(HealthState::Healthy, |worst, state| match (worst, *state) {
            (HealthState::Unhealthy, _) | (_, HealthState::Unhealthy) => HealthState::Unhealthy,
            (HealthState::Degraded, _) | (_, HealthState::Degraded) => HealthState::Degraded,
            _ => HealthState::Healthy,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorDetail;
    use rstest::rstest;
    use ulid::Ulid;

    fn result(status: JobStatus) -> JobResult {
        let mut r = JobResult::start(RunId::from_ulid(Ulid::new()), Utc::now());
        match status {
            JobStatus::Pending => {}
            JobStatus::Succeeded => r.mark_succeeded(None, Utc::now()).unwrap(),
            JobStatus::Failed => r
                .mark_failed(ErrorDetail::execution("Error", false), Utc::now())
                .unwrap(),
        }
        r
    }

    #[test]
    fn no_last_run_is_healthy() {
        assert_eq!(determine_health_state(None, 0), HealthState::Healthy);
    }

    #[rstest]
    #[case::pending(JobStatus::Pending, 0, HealthState::Healthy)]
    #[case::succeeded(JobStatus::Succeeded, 0, HealthState::Healthy)]
    #[case::failed_zero(JobStatus::Failed, 0, HealthState::Healthy)]
    #[case::failed_one(JobStatus::Failed, 1, HealthState::Degraded)]
    #[case::failed_two(JobStatus::Failed, 2, HealthState::Degraded)]
    #[case::failed_three(JobStatus::Failed, 3, HealthState::Unhealthy)]
    #[case::failed_five(JobStatus::Failed, 5, HealthState::Unhealthy)]
    fn health_follows_last_status_and_failures(
        #[case] status: JobStatus,
        #[case] failures: u32,
        #[case] expected: HealthState,
    ) {
        let r = result(status);
        assert_eq!(determine_health_state(Some(&r), failures), expected);
    }

    #[test]
    fn last_run_info_carries_error_message() {
        let r = result(JobStatus::Failed);
        let info = LastRunInfo::from(&r);
        assert_eq!(info.status, JobStatus::Failed);
        assert_eq!(info.error.as_deref(), Some("Error"));
        assert!(info.duration_ms.is_some());
    }

    #[test]
    fn worst_state_picks_most_severe() {
        assert_eq!(worst_state(std::iter::empty()), HealthState::Healthy);
        assert_eq!(
            worst_state(&[HealthState::Healthy, HealthState::Degraded]),
            HealthState::Degraded
        );
        assert_eq!(
            worst_state(&[
                HealthState::Unhealthy,
                HealthState::Degraded,
                HealthState::Healthy
            ]),
            HealthState::Unhealthy
        );
    }
}
