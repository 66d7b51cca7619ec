//! Status - 登録済みジョブの一覧表示用ビュー

use std::sync::Arc;

use serde::Serialize;

use super::executor::{ExecutorState, JobExecutor};
use super::job::Job;
use crate::domain::{JobResult, Role};

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub name: String,
    pub allowed_roles: Vec<Role>,
    pub allow_concurrent_execution: bool,
    pub state: ExecutorState,
    pub running: bool,
    pub last_result: Option<Arc<JobResult>>,
}

impl JobSummary {
    pub(crate) fn new<J: Job>(executor: &JobExecutor<J>, running: bool) -> Self {
        let definition = executor.definition();
        Self {
            name: definition.name().to_string(),
            allowed_roles: definition.allowed_roles().iter().cloned().collect(),
            allow_concurrent_execution: definition.allows_concurrent_execution(),
            state: executor.state(),
            running,
            last_result: executor.last_result(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::job::FnJob;
    use crate::domain::{JobContext, JobDefinition, JobError};

    #[test]
    fn summary_of_fresh_executor() {
        let def = JobDefinition::new("Cleanup")
            .unwrap()
            .with_roles(["Ops", "Admin"])
            .allow_concurrent_execution(true);
        let executor = JobExecutor::new(FnJob::new(def, |_ctx: JobContext| async {
            Ok::<_, JobError>(serde_json::Value::Null)
        }));

        let summary = JobSummary::new(&executor, false);
        assert_eq!(summary.name, "Cleanup");
        assert_eq!(
            summary.allowed_roles,
            vec![Role::new("Admin"), Role::new("Ops")]
        );
        assert!(summary.allow_concurrent_execution);
        assert_eq!(summary.state, ExecutorState::NotStarted);
        assert!(summary.last_result.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["state"], "not_started");
    }
}
