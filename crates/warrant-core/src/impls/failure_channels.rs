//! FailureChannel 実装
//!
//! - TracingFailureChannel: `tracing` に warn/error で出力（デフォルト）
//! - RecordingFailureChannel: メモリに記録（テスト・CLI のサマリ用）

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::ports::{FailureCause, FailureChannel, JobFailure};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailureChannel;

#[async_trait]
impl FailureChannel for TracingFailureChannel {
    async fn job_failed(&self, failure: &JobFailure) {
        let run_id = failure.run_id.map(|id| id.to_string()).unwrap_or_default();
        match failure.cause {
            FailureCause::InvalidState => error!(
                job = %failure.job,
                run_id = %run_id,
                error = %failure.message,
                "Job result state violation"
            ),
            cause => warn!(
                job = %failure.job,
                run_id = %run_id,
                role = %failure.role,
                cause = ?cause,
                retryable = failure.retryable,
                error = %failure.message,
                "Job execution failed"
            ),
        }
    }
}

/// Keeps every failure in arrival order.
#[derive(Debug, Default)]
pub struct RecordingFailureChannel {
    failures: Mutex<Vec<JobFailure>>,
}

impl RecordingFailureChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn failures(&self) -> Vec<JobFailure> {
        self.failures.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.failures.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.failures.lock().await.is_empty()
    }
}

#[async_trait]
impl FailureChannel for RecordingFailureChannel {
    async fn job_failed(&self, failure: &JobFailure) {
        self.failures.lock().await.push(failure.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, Role};
    use chrono::Utc;

    fn failure(job: &str) -> JobFailure {
        JobFailure {
            job: job.to_string(),
            run_id: None,
            role: Role::new("Admin"),
            cause: FailureCause::Execution(FailureKind::Execution),
            message: "disk full".to_string(),
            retryable: true,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recording_channel_keeps_order() {
        let channel = RecordingFailureChannel::new();
        assert!(channel.is_empty().await);

        channel.job_failed(&failure("a")).await;
        channel.job_failed(&failure("b")).await;

        let jobs: Vec<String> = channel
            .failures()
            .await
            .into_iter()
            .map(|f| f.job)
            .collect();
        assert_eq!(jobs, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(channel.len().await, 2);
    }
}
