//! Job trait - 各ジョブ種別が実装する契約
//!
//! # 二層構造
//! - **Job**: definition（名前・許可ロール）+ execute（作業本体）
//! - **JobExecutor**: 認可・JobResult の管理・失敗の捕捉（executor.rs）
//!
//! ジョブ本体は認可や結果の記録を気にしなくてよい。

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{JobContext, JobDefinition, JobError};

/// A schedulable unit of work.
///
/// # 使用例
/// ```ignore
/// struct SendReport {
///     definition: JobDefinition,
/// }
///
/// #[async_trait]
/// impl Job for SendReport {
///     fn definition(&self) -> &JobDefinition {
///         &self.definition
///     }
///
///     async fn execute(&self, ctx: &JobContext) -> Result<serde_json::Value, JobError> {
///         ctx.check_cancelled()?;
///         Ok(serde_json::json!("ok"))
///     }
/// }
/// ```
///
/// `execute` returning `serde_json::Value::Null` records a success without payload.
#[async_trait]
pub trait Job: Send + Sync {
    fn definition(&self) -> &JobDefinition;

    async fn execute(&self, ctx: &JobContext) -> Result<serde_json::Value, JobError>;
}

#[async_trait]
impl<J: Job + ?Sized> Job for Arc<J> {
    fn definition(&self) -> &JobDefinition {
        (**self).definition()
    }

    async fn execute(&self, ctx: &JobContext) -> Result<serde_json::Value, JobError> {
        (**self).execute(ctx).await
    }
}

/// A job whose work function is a closure.
///
/// The closure receives an owned copy of the context so the returned future
/// does not borrow from the caller.
pub struct FnJob<F, Fut> {
    definition: JobDefinition,
    work: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnJob<F, Fut>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, JobError>> + Send,
{
    pub fn new(definition: JobDefinition, work: F) -> Self {
        Self {
            definition,
            work,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Job for FnJob<F, Fut>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, JobError>> + Send,
{
    fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    async fn execute(&self, ctx: &JobContext) -> Result<serde_json::Value, JobError> {
        (self.work)(ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn fn_job_passes_context_to_closure() {
        let def = JobDefinition::new("echo").unwrap();
        let job = FnJob::new(def, |ctx: JobContext| async move {
            let msg: Option<String> = ctx.get("msg")?;
            Ok::<_, JobError>(json!(msg))
        });

        let ctx = JobContext::new("manual", Utc::now()).with_value("msg", json!("hi"));
        let out = job.execute(&ctx).await.unwrap();
        assert_eq!(out, json!("hi"));
        assert_eq!(job.definition().name(), "echo");
    }

    #[tokio::test]
    async fn arc_dyn_job_delegates() {
        let def = JobDefinition::new("noop").unwrap();
        let job: Arc<dyn Job> = Arc::new(FnJob::new(def, |_ctx: JobContext| async {
            Ok::<_, JobError>(serde_json::Value::Null)
        }));

        let ctx = JobContext::new("manual", Utc::now());
        assert_eq!(job.execute(&ctx).await.unwrap(), serde_json::Value::Null);
        assert_eq!(Job::definition(&job).name(), "noop");
    }
}
