//! JobExecutor - 認可 → 実行 → JobResult の記録
//!
//! # 実行プロトコル（1 回の呼び出しごと）
//! 1. Authorize: 呼び出しロールが許可されていなければ即 `Unauthorized`（JobResult は作らない）
//! 2. Start: 新しい JobResult（Pending）を作り last_result を置き換える
//! 3. Execute: ジョブ本体を実行し、結果を Succeeded / Failed に確定する
//! 4. Terminal: 確定した JobResult を last_result に公開して制御を返す
//!
//! ジョブ本体の失敗（エラー・panic）は必ずここで捕捉して記録する。
//! 捕捉しないと last_result が Pending のまま残る。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::job::Job;
use crate::domain::{
    DomainEvent, ErrorDetail, ExecutorError, JobContext, JobDefinition, JobError, JobResult,
    JobStatus, RejectReason, Role,
};
use crate::impls::NoopEventSink;
use crate::ports::{Clock, EventSink, IdGenerator, SystemClock, UlidGenerator};

/// Lifecycle of an executor, derived from its last result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    NotStarted,
    Pending,
    Succeeded,
    Failed,
}

impl From<JobStatus> for ExecutorState {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => ExecutorState::Pending,
            JobStatus::Succeeded => ExecutorState::Succeeded,
            JobStatus::Failed => ExecutorState::Failed,
        }
    }
}

/// Runs one job type on behalf of a scheduler.
///
/// Holds a single "last result" slot. History is not kept here (see `RunLog`).
///
/// `run` takes `&self`; concurrent invocations each get their own `JobResult`
/// and the slot ends up holding whichever finished last. Jobs that must not
/// overlap declare `allow_concurrent_execution(false)` and the scheduler
/// integration layer refuses the second fire.
pub struct JobExecutor<J> {
    job: J,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    events: Arc<dyn EventSink>,
    last_result: RwLock<Option<Arc<JobResult>>>,
}

impl<J: Job> JobExecutor<J> {
    pub fn new(job: J) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            job,
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            events: Arc::new(NoopEventSink),
            last_result: RwLock::new(None),
        }
    }

    /// Use `clock` for timestamps and for the time part of run IDs.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn name(&self) -> &str {
        self.job.definition().name()
    }

    pub fn definition(&self) -> &JobDefinition {
        self.job.definition()
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    /// Snapshot of the most recent run, `None` until the first authorized run.
    ///
    /// A terminal snapshot never changes; repeated reads return the same `Arc`
    /// until the next run starts.
    pub fn last_result(&self) -> Option<Arc<JobResult>> {
        self.last_result
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> ExecutorState {
        self.last_result()
            .map(|r| ExecutorState::from(r.status()))
            .unwrap_or(ExecutorState::NotStarted)
    }

    /// Step 1 of the protocol. Exposed so a scheduler can reject early.
    pub fn authorize(&self, role: &Role) -> Result<(), ExecutorError> {
        let definition = self.job.definition();
        if definition.is_authorized(role) {
            Ok(())
        } else {
            Err(ExecutorError::Unauthorized {
                job: definition.name().to_string(),
                role: role.clone(),
            })
        }
    }

    /// Run the job once under `role`.
    ///
    /// Returns the terminal `JobResult` on success. Any failure of the work
    /// function is recorded in `last_result` first and then returned as
    /// `ExecutorError::Execution`.
    #[instrument(skip_all, fields(job = %self.name(), role = %role))]
    pub async fn run(
        &self,
        ctx: &JobContext,
        role: &Role,
    ) -> Result<Arc<JobResult>, ExecutorError> {
        if let Err(err) = self.authorize(role) {
            warn!("Caller role not authorized, job not started");
            self.events
                .emit(DomainEvent::RunRejected {
                    job: self.name().to_string(),
                    role: role.clone(),
                    reason: RejectReason::Unauthorized,
                    at: self.clock.now(),
                })
                .await;
            return Err(err);
        }

        let mut result = JobResult::start(self.ids.generate_run_id(), self.clock.now());
        let run_id = result.run_id();
        self.publish(Arc::new(result.clone()));
        let mut unfinished = Unfinished {
            slot: &self.last_result,
            clock: self.clock.as_ref(),
            pending: Some(result.clone()),
        };
        self.events
            .emit(DomainEvent::RunStarted {
                job: self.name().to_string(),
                run_id,
                role: role.clone(),
                at: result.started_at(),
            })
            .await;
        debug!(run_id = %run_id, trigger = ctx.trigger_name(), "Job run started");

        let outcome = AssertUnwindSafe(self.job.execute(ctx)).catch_unwind().await;
        let finished_at = self.clock.now();

        let marked = match outcome {
            Ok(Ok(output)) => {
                let payload = (!output.is_null()).then_some(output);
                result.mark_succeeded(payload, finished_at).map(|()| None)
            }
            Ok(Err(err)) => {
                let detail = detail_for(&err);
                result
                    .mark_failed(detail.clone(), finished_at)
                    .map(|()| Some(detail))
            }
            Err(panic) => {
                let detail = ErrorDetail::panicked(panic_message(panic.as_ref()));
                result
                    .mark_failed(detail.clone(), finished_at)
                    .map(|()| Some(detail))
            }
        };

        let failure = match marked {
            Ok(failure) => failure,
            Err(err) => {
                // mark_* only fails on a terminal result, so publishing it
                // still leaves the slot terminal.
                error!(run_id = %run_id, error = %err, "Job result already terminal");
                self.publish(Arc::new(result));
                unfinished.disarm();
                return Err(err.into());
            }
        };

        let snapshot = Arc::new(result);
        self.publish(Arc::clone(&snapshot));
        unfinished.disarm();

        match failure {
            None => {
                info!(run_id = %run_id, "Job completed successfully");
                self.events
                    .emit(DomainEvent::RunSucceeded {
                        job: self.name().to_string(),
                        run_id,
                        at: finished_at,
                    })
                    .await;
                Ok(snapshot)
            }
            Some(detail) => {
                warn!(
                    run_id = %run_id,
                    kind = ?detail.kind,
                    retryable = detail.retryable,
                    error = %detail,
                    "Job failed"
                );
                self.events
                    .emit(DomainEvent::RunFailed {
                        job: self.name().to_string(),
                        run_id,
                        detail: detail.clone(),
                        at: finished_at,
                    })
                    .await;
                Err(ExecutorError::Execution {
                    job: self.name().to_string(),
                    run_id,
                    detail,
                    result: snapshot,
                })
            }
        }
    }

    fn publish(&self, result: Arc<JobResult>) {
        *self
            .last_result
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(result);
    }
}

/// Records the run as abandoned when `run` is dropped before reaching a
/// terminal state, so `last_result` never stays `Pending`.
struct Unfinished<'a> {
    slot: &'a RwLock<Option<Arc<JobResult>>>,
    clock: &'a dyn Clock,
    pending: Option<JobResult>,
}

impl Unfinished<'_> {
    fn disarm(&mut self) {
        self.pending = None;
    }
}

impl Drop for Unfinished<'_> {
    fn drop(&mut self) {
        let Some(mut result) = self.pending.take() else {
            return;
        };

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        // A later run may already own the slot.
        let still_ours = slot
            .as_ref()
            .is_some_and(|r| r.run_id() == result.run_id() && !r.is_terminal());
        if !still_ours {
            return;
        }

        if result
            .mark_failed(ErrorDetail::abandoned(), self.clock.now())
            .is_ok()
        {
            warn!(run_id = %result.run_id(), "Job run dropped before completion");
            *slot = Some(Arc::new(result));
        }
    }
}

fn detail_for(err: &JobError) -> ErrorDetail {
    match err {
        JobError::Cancelled => ErrorDetail::cancelled(),
        other => ErrorDetail::execution(other.to_string(), other.is_retryable()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("job panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("job panicked: {s}")
    } else {
        "job panicked".to_string()
    }
}
