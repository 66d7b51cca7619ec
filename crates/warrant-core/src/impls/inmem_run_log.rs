//! InMemoryRunLog - 開発用の run 履歴
//!
//! # 実装詳細
//! - HashMap<String, VecDeque<Arc<JobResult>>> で job ごとに保持
//! - job ごとに最大 `capacity` 件。超えたら古いものから捨てる

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{JobResult, JobStatus};
use crate::ports::RunLog;

pub const DEFAULT_RUN_LOG_CAPACITY: usize = 100;

pub struct InMemoryRunLog {
    runs: Mutex<HashMap<String, VecDeque<Arc<JobResult>>>>,
    capacity: usize,
}

impl InMemoryRunLog {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryRunLog {
    fn default() -> Self {
        Self::new(DEFAULT_RUN_LOG_CAPACITY)
    }
}

#[async_trait]
impl RunLog for InMemoryRunLog {
    async fn append(&self, job: &str, result: Arc<JobResult>) {
        let mut runs = self.runs.lock().await;
        let entries = runs.entry(job.to_string()).or_default();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    async fn recent(&self, job: &str, limit: usize) -> Vec<Arc<JobResult>> {
        let runs = self.runs.lock().await;
        runs.get(job)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    async fn consecutive_failures(&self, job: &str) -> u32 {
        let runs = self.runs.lock().await;
        let Some(entries) = runs.get(job) else {
            return 0;
        };
        entries
            .iter()
            .rev()
            .take_while(|r| r.status() == JobStatus::Failed)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorDetail, RunId};
    use chrono::Utc;
    use ulid::Ulid;

    fn finished(ok: bool) -> Arc<JobResult> {
        let mut r = JobResult::start(RunId::from_ulid(Ulid::new()), Utc::now());
        if ok {
            r.mark_succeeded(None, Utc::now()).unwrap();
        } else {
            r.mark_failed(ErrorDetail::execution("boom", false), Utc::now())
                .unwrap();
        }
        Arc::new(r)
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let log = InMemoryRunLog::default();
        let a = finished(true);
        let b = finished(false);
        log.append("job", Arc::clone(&a)).await;
        log.append("job", Arc::clone(&b)).await;

        let recent = log.recent("job", 10).await;
        assert_eq!(recent.len(), 2);
        assert!(Arc::ptr_eq(&recent[0], &b));
        assert!(Arc::ptr_eq(&recent[1], &a));

        assert_eq!(log.recent("job", 1).await.len(), 1);
        assert!(log.recent("other", 10).await.is_empty());
    }

    #[tokio::test]
    async fn oldest_entries_are_evicted_at_capacity() {
        let log = InMemoryRunLog::new(2);
        let first = finished(true);
        log.append("job", Arc::clone(&first)).await;
        log.append("job", finished(true)).await;
        log.append("job", finished(true)).await;

        let recent = log.recent("job", 10).await;
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|r| !Arc::ptr_eq(r, &first)));
    }

    #[tokio::test]
    async fn consecutive_failures_stop_at_last_success() {
        let log = InMemoryRunLog::default();
        assert_eq!(log.consecutive_failures("job").await, 0);

        log.append("job", finished(false)).await;
        log.append("job", finished(true)).await;
        log.append("job", finished(false)).await;
        log.append("job", finished(false)).await;

        assert_eq!(log.consecutive_failures("job").await, 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(InMemoryRunLog::new(0).capacity(), 1);
    }
}
