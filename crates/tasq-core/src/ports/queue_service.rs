//! QueueService port - 外部キューサービスの RPC 面
//!
//! キューサービス自体（耐久性・順序・配送保証）は前提として扱い、
//! ここでは狭い RPC だけを抽象化します。
//!
//! # 実装
//! - `InMemoryQueueService`（開発・テスト用、`impls`）
//! - `SqsQueueService`（本番用、`tasq-sqs` クレート）

use async_trait::async_trait;

use crate::domain::{MessageId, QueueAddress, ReceiptHandle, ReceivedMessage, TasqError};

/// ReceiveRequest は receive 1 回分のパラメータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub max_messages: u32,
    pub visibility_timeout: u32,
    pub wait_time_seconds: u32,
}

/// QueueService はキューサービスの生の RPC
///
/// ここは全部アドレス指定。名前解決とキャッシュは
/// `QueueGateway` の担当。RPC の失敗は
/// `TasqError::Transport` で返す
#[async_trait]
pub trait QueueService: Send + Sync + 'static {
    /// キューアドレスを列挙。`name_prefix` は絞り込みに使うだけで、
    /// 名前の完全一致は呼び出し側で確認する
    async fn list_queues(&self, name_prefix: Option<&str>) -> Result<Vec<QueueAddress>, TasqError>;

    async fn send_message(
        &self,
        address: &QueueAddress,
        body: &str,
        delay_seconds: u32,
    ) -> Result<MessageId, TasqError>;

    /// 待ち時間内に何も来なければ空の vec
    async fn receive_messages(
        &self,
        address: &QueueAddress,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, TasqError>;

    async fn delete_message(
        &self,
        address: &QueueAddress,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), TasqError>;

    /// ログ用の短いプロバイダ名（"sqs", "in_memory"）
    fn provider_name(&self) -> &'static str;
}
