//! Ports - 抽象化レイヤー
//!
//! 外部スケジューラ・時刻・ID 生成・履歴・イベント通知へのインターフェース。
//! 実装は `impls` にある（いずれもインメモリ / ログ出力のみ）。

pub mod clock;
pub mod event_sink;
pub mod failure_channel;
pub mod id_generator;
pub mod run_log;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::failure_channel::{FailureCause, FailureChannel, JobFailure};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::run_log::RunLog;
