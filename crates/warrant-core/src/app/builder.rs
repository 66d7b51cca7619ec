//! SchedulerBuilder - ジョブ登録とスケジューラ統合層のワイヤリング
//!
//! # Fail-fast 設計
//! - 同名ジョブの二重登録は register() 時点でエラー
//! - expect_jobs() で期待されるジョブ名を宣言すると、build() 時に不足をチェック

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::executor::JobExecutor;
use super::job::Job;
use super::scheduler::{RegisteredJob, Scheduler};
use crate::impls::{InMemoryRunLog, NoopEventSink, TracingFailureChannel};
use crate::ports::{Clock, EventSink, FailureChannel, RunLog, SystemClock};

/// SchedulerBuilder はジョブを登録して Scheduler を構築
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new()
///     .register(SendReport::new())?
///     .expect_jobs(&["SendReport"])
///     .build()?;
/// ```
pub struct SchedulerBuilder {
    jobs: BTreeMap<String, Arc<dyn Job>>,
    expected_jobs: Option<Vec<String>>,
    clock: Arc<dyn Clock>,
    failures: Arc<dyn FailureChannel>,
    run_log: Arc<dyn RunLog>,
    events: Arc<dyn EventSink>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job `{0}` is already registered")]
    DuplicateJob(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing jobs: {0:?}. These jobs were expected but not registered.")]
    MissingJobs(Vec<String>),
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            jobs: BTreeMap::new(),
            expected_jobs: None,
            clock: Arc::new(SystemClock),
            failures: Arc::new(TracingFailureChannel),
            run_log: Arc::new(InMemoryRunLog::default()),
            events: Arc::new(NoopEventSink),
        }
    }

    /// Register a job type under its definition's name.
    pub fn register<J: Job + 'static>(self, job: J) -> Result<Self, RegistryError> {
        self.register_arc(Arc::new(job))
    }

    pub fn register_arc(mut self, job: Arc<dyn Job>) -> Result<Self, RegistryError> {
        let name = job.definition().name().to_string();
        if self.jobs.contains_key(&name) {
            return Err(RegistryError::DuplicateJob(name));
        }
        self.jobs.insert(name, job);
        Ok(self)
    }

    pub fn expect_jobs(mut self, names: &[&str]) -> Self {
        self.expected_jobs = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_failure_channel(mut self, failures: Arc<dyn FailureChannel>) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_run_log(mut self, run_log: Arc<dyn RunLog>) -> Self {
        self.run_log = run_log;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn registered_jobs(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    pub fn build(self) -> Result<Scheduler, BuildError> {
        if let Some(expected) = &self.expected_jobs {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.jobs.contains_key(name.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobs(missing));
            }
        }

        let jobs = self
            .jobs
            .into_iter()
            .map(|(name, job)| {
                let executor = JobExecutor::new(job)
                    .with_clock(Arc::clone(&self.clock))
                    .with_event_sink(Arc::clone(&self.events));
                (name, RegisteredJob::new(executor))
            })
            .collect::<BTreeMap<_, _>>();

        info!(job_count = jobs.len(), "Job scheduler built");

        Ok(Scheduler::new(
            jobs,
            self.clock,
            self.failures,
            self.run_log,
            self.events,
        ))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
