//! FailureChannel port - スケジューラの「ジョブ実行失敗」通知チャネル
//!
//! スケジューラ統合層が run の失敗ごとにちょうど 1 回呼び出す。
//! retry / misfire の判断は外部スケジューラ側の責務。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{FailureKind, RunId, Role};

/// Where in the fire protocol the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", content = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// Caller role not allowed. No run was started.
    Unauthorized,

    /// A non-concurrent job was fired while a run was in flight. No run was started.
    AlreadyRunning,

    /// The work function failed; the run's `JobResult` is `Failed`.
    Execution(FailureKind),

    /// A terminal result was marked again. Indicates a defect.
    InvalidState,
}

/// One failure notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub job: String,
    pub run_id: Option<RunId>,
    pub role: Role,
    pub cause: FailureCause,
    pub message: String,
    pub retryable: bool,
    pub at: DateTime<Utc>,
}

/// FailureChannel はジョブ失敗を受け取る
#[async_trait]
pub trait FailureChannel: Send + Sync {
    async fn job_failed(&self, failure: &JobFailure);
}
