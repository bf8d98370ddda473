//! QueueGateway - キュー名ベースの RPC ラッパー
//!
//! `QueueService` はアドレスで話すので、名前 -> アドレスの解決を
//! `AddressCache` に任せて、呼び出し側にはキュー名だけを見せます。
//!
//! receive が transport エラーになったらキャッシュを捨てる
//! （キューが作り直されてアドレスが変わっていても次のサイクルで拾える）。

use std::sync::Arc;

use chrono::Duration;

use super::address_cache::AddressCache;
use crate::domain::{MessageId, QueueAddress, ReceiptHandle, ReceivedMessage, TasqError};
use crate::ports::{Clock, QueueService, ReceiveRequest, SystemClock};

#[derive(Clone)]
pub struct QueueGateway {
    service: Arc<dyn QueueService>,
    cache: Arc<AddressCache>,
}

impl QueueGateway {
    /// SystemClock、キャッシュは無期限
    pub fn new(service: Arc<dyn QueueService>) -> Self {
        Self::with_cache_ttl(service, Arc::new(SystemClock), None)
    }

    pub fn with_cache_ttl(
        service: Arc<dyn QueueService>,
        clock: Arc<dyn Clock>,
        ttl: Option<Duration>,
    ) -> Self {
        let cache = AddressCache::new(Arc::clone(&service), clock, ttl);
        Self {
            service,
            cache: Arc::new(cache),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.service.provider_name()
    }

    pub async fn resolve_address(&self, queue_name: &str) -> Result<QueueAddress, TasqError> {
        self.cache.resolve(queue_name).await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(queue = %queue_name, delay_seconds = delay_seconds))]
    pub async fn send(
        &self,
        queue_name: &str,
        body: &str,
        delay_seconds: u32,
    ) -> Result<MessageId, TasqError> {
        let address = self.resolve_address(queue_name).await?;
        self.service
            .send_message(&address, body, delay_seconds)
            .await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(queue = %queue_name, max_messages = request.max_messages))]
    pub async fn receive(
        &self,
        queue_name: &str,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, TasqError> {
        let address = self.resolve_address(queue_name).await?;
        let result = self.service.receive_messages(&address, request).await;
        if let Err(TasqError::Transport { .. }) = &result {
            self.cache.invalidate(queue_name);
        }
        result
    }

    #[tracing::instrument(level = "debug", skip_all, fields(queue = %queue_name))]
    pub async fn delete(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), TasqError> {
        let address = self.resolve_address(queue_name).await?;
        self.service.delete_message(&address, receipt_handle).await
    }

    pub fn invalidate(&self, queue_name: &str) {
        self.cache.invalidate(queue_name);
    }
}

impl std::fmt::Debug for QueueGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueGateway")
            .field("provider", &self.provider_name())
            .finish_non_exhaustive()
    }
}
