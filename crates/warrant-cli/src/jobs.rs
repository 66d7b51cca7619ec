//! Built-in job kinds and scheduler wiring for the CLI.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::{Duration, sleep};
use tracing::{debug, info};
use warrant_core::domain::{JobContext, JobDefinition, JobError};
use warrant_core::impls::InMemoryRunLog;
use warrant_core::{Job, Scheduler, SchedulerBuilder};

use crate::config::{JobConfig, WarrantConfig};

pub const KINDS: &[&str] = &["SendReport", "Cleanup", "Flaky"];

/// Builds the definition for `name`: the config entry when present,
/// otherwise `roles` and `concurrent`.
fn job_definition(
    name: &str,
    config: Option<&JobConfig>,
    roles: &[&str],
    concurrent: bool,
) -> anyhow::Result<JobDefinition> {
    let definition = JobDefinition::new(name)?;
    Ok(match config {
        Some(c) => definition
            .with_roles(c.roles.iter().map(String::as_str))
            .allow_concurrent_execution(c.allow_concurrent_execution),
        None => definition
            .with_roles(roles.iter().copied())
            .allow_concurrent_execution(concurrent),
    })
}

/// Sends a report to `to` (default `ops`).
pub struct SendReport {
    definition: JobDefinition,
}

#[async_trait]
impl Job for SendReport {
    fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Value, JobError> {
        ctx.check_cancelled()?;
        let to = ctx.get::<String>("to")?.unwrap_or_else(|| "ops".to_string());
        info!(to = %to, "Report sent");
        Ok(json!("ok"))
    }
}

/// Removes `steps` batches, one every 200ms, stopping early when cancelled.
pub struct Cleanup {
    definition: JobDefinition,
}

const CLEANUP_STEP: Duration = Duration::from_millis(200);

#[async_trait]
impl Job for Cleanup {
    fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Value, JobError> {
        let steps = ctx.get::<u64>("steps")?.unwrap_or(3);
        for step in 0..steps {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => return Err(JobError::Cancelled),
                _ = sleep(CLEANUP_STEP) => debug!(step, "Cleanup batch removed"),
            }
        }
        Ok(json!({ "removed": steps }))
    }
}

/// Fails with an I/O error a fixed number of times, then succeeds.
pub struct Flaky {
    definition: JobDefinition,
    remaining_failures: AtomicU32,
}

impl Flaky {
    pub const DEFAULT_FAILURES: u32 = 2;
}

#[async_trait]
impl Job for Flaky {
    fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Value, JobError> {
        ctx.check_cancelled()?;

        // 読み取りと減算を 1 つの原子操作で行う（並行 run でも 0 を下回らない）
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(std::io::Error::other("disk full").into());
        }
        Ok(Value::Null)
    }
}

pub fn build_scheduler(config: &WarrantConfig) -> anyhow::Result<Scheduler> {
    let send_report = SendReport {
        definition: job_definition("SendReport", config.job("SendReport"), &["Admin"], false)?,
    };
    let cleanup = Cleanup {
        definition: job_definition("Cleanup", config.job("Cleanup"), &["Admin", "Ops"], true)?,
    };
    let flaky = Flaky {
        definition: job_definition("Flaky", config.job("Flaky"), &["Admin"], false)?,
        remaining_failures: AtomicU32::new(Flaky::DEFAULT_FAILURES),
    };

    let scheduler = SchedulerBuilder::new()
        .with_run_log(Arc::new(InMemoryRunLog::new(config.run_log_capacity)))
        .register(send_report)?
        .register(cleanup)?
        .register(flaky)?
        .expect_jobs(KINDS)
        .build()?;
    Ok(scheduler)
}
