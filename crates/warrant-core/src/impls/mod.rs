//! Impls - port の実装（インメモリ / tracing 出力）

pub mod event_sinks;
pub mod failure_channels;
pub mod inmem_run_log;

pub use self::event_sinks::{NoopEventSink, RecordingEventSink};
pub use self::failure_channels::{RecordingFailureChannel, TracingFailureChannel};
pub use self::inmem_run_log::{DEFAULT_RUN_LOG_CAPACITY, InMemoryRunLog};
