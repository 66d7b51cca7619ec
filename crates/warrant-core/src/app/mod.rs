//! App - アプリケーション層
//!
//! ports を組み合わせてジョブ実行のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Job**: ジョブ種別ごとの契約（definition + execute）
//! - **JobExecutor**: 認可 → 実行 → JobResult の記録
//! - **Scheduler**: 外部スケジューラとの統合層（同時実行制御・失敗通知・履歴）
//! - **SchedulerBuilder**: ジョブ登録とワイヤリング

pub mod builder;
pub mod executor;
pub mod health;
pub mod job;
pub mod scheduler;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, RegistryError, SchedulerBuilder};
pub use self::executor::{ExecutorState, JobExecutor};
pub use self::health::{HealthState, JobHealthStatus, JobsHealthStatus, LastRunInfo};
pub use self::job::{FnJob, Job};
pub use self::scheduler::{Scheduler, SchedulerError, Trigger};
pub use self::status::JobSummary;
