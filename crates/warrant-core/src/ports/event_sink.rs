//! EventSink port - ドメインイベント記録の抽象化
//!
//! - NoopEventSink: 何もしない（デフォルト）
//! - RecordingEventSink: メモリに記録（テスト・CLI 用）

use async_trait::async_trait;

use crate::domain::DomainEvent;

/// EventSink はドメインイベントを記録
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: DomainEvent);
}
