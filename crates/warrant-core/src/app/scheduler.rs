//! Scheduler - 外部スケジューラとの統合層
//!
//! トリガ評価（cron・misfire ポリシー）は外部の責務。ここでは「発火した」ジョブを
//! 1 回実行し、次を保証する:
//! - allow_concurrent_execution = false のジョブは同時に 1 つしか走らない
//! - 失敗は FailureChannel にちょうど 1 回通知される
//! - 確定した JobResult は RunLog に追記される

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{info, instrument, warn};

use super::executor::JobExecutor;
use super::health::{
    JobHealthStatus, JobsHealthStatus, LastRunInfo, determine_health_state, worst_state,
};
use super::job::Job;
use super::status::JobSummary;
use crate::domain::{
    CancellationToken, DomainEvent, ExecutorError, JobContext, JobDataMap, JobDefinition,
    JobResult, RejectReason, Role,
};
use crate::ports::{Clock, EventSink, FailureCause, FailureChannel, JobFailure, RunLog};

/// What fired the job: a trigger name plus its data map.
#[derive(Debug, Clone, Default)]
pub struct Trigger {
    name: String,
    data: JobDataMap,
}

impl Trigger {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: JobDataMap::new(),
        }
    }

    pub fn manual() -> Self {
        Self::named("manual")
    }

    pub fn with_data(mut self, data: JobDataMap) -> Self {
        self.data = data;
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job `{0}` is not registered")]
    NotFound(String),

    #[error("job `{0}` is already running and does not allow concurrent execution")]
    ConcurrentExecution(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl SchedulerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SchedulerError::Executor(err) => err.is_retryable(),
            SchedulerError::NotFound(_) | SchedulerError::ConcurrentExecution(_) => false,
        }
    }
}

pub(crate) struct RegisteredJob {
    executor: JobExecutor<Arc<dyn Job>>,
    in_flight: AtomicUsize,
    cancellation: CancellationToken,
}

impl RegisteredJob {
    pub(crate) fn new(executor: JobExecutor<Arc<dyn Job>>) -> Self {
        Self {
            executor,
            in_flight: AtomicUsize::new(0),
            cancellation: CancellationToken::new(),
        }
    }

    /// `None` when the job is non-concurrent and a run is already in flight.
    fn try_enter(&self) -> Option<InFlight<'_>> {
        if self.executor.definition().allows_concurrent_execution() {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        } else if self
            .in_flight
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        Some(InFlight(&self.in_flight))
    }

    fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

/// Decrements the in-flight counter on drop.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Registry of executors plus the glue the external scheduler talks to.
///
/// Built with [`SchedulerBuilder`](super::builder::SchedulerBuilder).
pub struct Scheduler {
    jobs: BTreeMap<String, RegisteredJob>,
    clock: Arc<dyn Clock>,
    failures: Arc<dyn FailureChannel>,
    run_log: Arc<dyn RunLog>,
    events: Arc<dyn EventSink>,
}

impl Scheduler {
    pub(crate) fn new(
        jobs: BTreeMap<String, RegisteredJob>,
        clock: Arc<dyn Clock>,
        failures: Arc<dyn FailureChannel>,
        run_log: Arc<dyn RunLog>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            jobs,
            clock,
            failures,
            run_log,
            events,
        }
    }

    /// Fire `job` once on behalf of `role`.
    ///
    /// Every failure (rejection or failed run) is forwarded to the failure
    /// channel exactly once before it is returned.
    #[instrument(skip(self, trigger), fields(trigger = trigger.name()))]
    pub async fn fire(
        &self,
        job: &str,
        role: &Role,
        trigger: Trigger,
    ) -> Result<Arc<JobResult>, SchedulerError> {
        let registered = self
            .jobs
            .get(job)
            .ok_or_else(|| SchedulerError::NotFound(job.to_string()))?;
        let executor = &registered.executor;

        // Unauthorized callers learn nothing about whether the job is running.
        if let Err(err) = executor.authorize(role) {
            warn!("Caller role not authorized, fire rejected");
            self.events
                .emit(DomainEvent::RunRejected {
                    job: job.to_string(),
                    role: role.clone(),
                    reason: RejectReason::Unauthorized,
                    at: self.clock.now(),
                })
                .await;
            return Err(self.reject(executor, role, err).await);
        }

        let Some(_in_flight) = registered.try_enter() else {
            warn!("Job already running, fire rejected");
            self.events
                .emit(DomainEvent::RunRejected {
                    job: job.to_string(),
                    role: role.clone(),
                    reason: RejectReason::AlreadyRunning,
                    at: self.clock.now(),
                })
                .await;
            let err = SchedulerError::ConcurrentExecution(job.to_string());
            self.report(JobFailure {
                job: job.to_string(),
                run_id: None,
                role: role.clone(),
                cause: FailureCause::AlreadyRunning,
                message: err.to_string(),
                retryable: false,
                at: self.clock.now(),
            })
            .await;
            return Err(err);
        };

        let ctx = JobContext::new(trigger.name, self.clock.now())
            .with_data(trigger.data)
            .with_cancellation(registered.cancellation.clone());

        match executor.run(&ctx, role).await {
            Ok(result) => {
                self.run_log.append(job, Arc::clone(&result)).await;
                Ok(result)
            }
            Err(err) => Err(self.reject(executor, role, err).await),
        }
    }

    async fn reject(
        &self,
        executor: &JobExecutor<Arc<dyn Job>>,
        role: &Role,
        err: ExecutorError,
    ) -> SchedulerError {
        let (run_id, cause) = match &err {
            ExecutorError::Unauthorized { .. } => (None, FailureCause::Unauthorized),
            ExecutorError::Execution {
                run_id,
                detail,
                result,
                ..
            } => {
                self.run_log
                    .append(executor.name(), Arc::clone(result))
                    .await;
                (Some(*run_id), FailureCause::Execution(detail.kind))
            }
            ExecutorError::InvalidState(state) => (Some(state.run_id), FailureCause::InvalidState),
        };

        let message = match &err {
            ExecutorError::Execution { detail, .. } => detail.message.clone(),
            other => other.to_string(),
        };

        self.report(JobFailure {
            job: executor.name().to_string(),
            run_id,
            role: role.clone(),
            cause,
            message,
            retryable: err.is_retryable(),
            at: self.clock.now(),
        })
        .await;

        SchedulerError::Executor(err)
    }

    async fn report(&self, failure: JobFailure) {
        self.failures.job_failed(&failure).await;
    }

    /// Request cooperative cancellation of `job`. Runs started afterwards see
    /// the signal too, until [`resume`](Self::resume) is called.
    #[instrument(skip(self))]
    pub fn cancel(&self, job: &str) -> Result<(), SchedulerError> {
        let registered = self.get(job)?;
        registered.cancellation.cancel();
        info!("Job cancellation requested");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn resume(&self, job: &str) -> Result<(), SchedulerError> {
        let registered = self.get(job)?;
        registered.cancellation.reset();
        info!("Job resumed");
        Ok(())
    }

    fn get(&self, job: &str) -> Result<&RegisteredJob, SchedulerError> {
        self.jobs
            .get(job)
            .ok_or_else(|| SchedulerError::NotFound(job.to_string()))
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    pub fn definition(&self, job: &str) -> Option<&JobDefinition> {
        self.jobs.get(job).map(|r| r.executor.definition())
    }

    pub fn last_result(&self, job: &str) -> Option<Arc<JobResult>> {
        self.jobs.get(job).and_then(|r| r.executor.last_result())
    }

    pub fn is_running(&self, job: &str) -> bool {
        self.jobs.get(job).is_some_and(RegisteredJob::is_running)
    }

    /// Finished runs of `job`, newest first.
    pub async fn history(&self, job: &str, limit: usize) -> Vec<Arc<JobResult>> {
        self.run_log.recent(job, limit).await
    }

    pub fn summaries(&self) -> Vec<JobSummary> {
        self.jobs
            .values()
            .map(|r| JobSummary::new(&r.executor, r.is_running()))
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn job_status(&self, job: &str) -> Option<JobHealthStatus> {
        let registered = self.jobs.get(job)?;

        let last_run = self.run_log.recent(job, 1).await.into_iter().next();
        let consecutive_failures = self.run_log.consecutive_failures(job).await;
        let status = determine_health_state(last_run.as_deref(), consecutive_failures);

        Some(JobHealthStatus {
            job: job.to_string(),
            status,
            running: registered.is_running(),
            cancelled: registered.cancellation.is_cancelled(),
            last_run: last_run.as_deref().map(LastRunInfo::from),
            consecutive_failures,
        })
    }

    pub async fn health_status(&self) -> JobsHealthStatus {
        let mut jobs = Vec::with_capacity(self.jobs.len());
        for name in self.jobs.keys() {
            if let Some(status) = self.job_status(name).await {
                jobs.push(status);
            }
        }

        JobsHealthStatus {
            status: worst_state(jobs.iter().map(|j| &j.status)),
            jobs,
        }
    }
}
