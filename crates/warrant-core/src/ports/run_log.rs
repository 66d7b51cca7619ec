//! RunLog port - run 履歴（append-only）
//!
//! executor が持つのは直近 1 件（last_result）だけ。
//! 複数 run の履歴が必要な場合はこの port をスケジューラ統合層の上に重ねる。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::JobResult;

/// RunLog は終了した run の結果を job 名ごとに追記する
#[async_trait]
pub trait RunLog: Send + Sync {
    /// Append a terminal result.
    async fn append(&self, job: &str, result: Arc<JobResult>);

    /// Most recent results first, at most `limit` entries.
    async fn recent(&self, job: &str, limit: usize) -> Vec<Arc<JobResult>>;

    /// Number of `Failed` results since the last success.
    async fn consecutive_failures(&self, job: &str) -> u32;
}
