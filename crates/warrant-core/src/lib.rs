//! warrant-core
//!
//! Role-authorized job execution for an external scheduler.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（definition, role, result, context, errors, events, ids）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, FailureChannel, RunLog, EventSink）
//! - **app**: アプリケーションロジック（job, executor, scheduler, builder, health, status）
//! - **impls**: 実装（InMemoryRunLog, TracingFailureChannel など）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{Job, JobExecutor, Scheduler, SchedulerBuilder, SchedulerError, Trigger};
pub use domain::{
    ExecutorError, JobContext, JobDefinition, JobError, JobResult, JobStatus, Role, RunId,
};
