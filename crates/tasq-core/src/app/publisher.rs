//! Publisher - 1 つのキューへの送信口
//!
//! delay は生成時に検証するので、送信時に弾かれることはありません。
//! リトライはしない（エラーはそのまま呼び出し元へ）。

use serde::Serialize;

use super::gateway::QueueGateway;
use crate::domain::{Envelope, MessageId, TasqError, validate_delay_seconds};
use crate::typed::encode_call;

#[derive(Debug, Clone)]
pub struct Publisher {
    gateway: QueueGateway,
    queue_name: String,
    delay_seconds: u32,
}

impl Publisher {
    pub fn new(
        gateway: QueueGateway,
        queue_name: impl Into<String>,
        delay_seconds: u32,
    ) -> Result<Self, TasqError> {
        validate_delay_seconds(delay_seconds)?;
        Ok(Self {
            gateway,
            queue_name: queue_name.into(),
            delay_seconds,
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn delay_seconds(&self) -> u32 {
        self.delay_seconds
    }

    /// `body` をそのまま送信
    pub async fn publish(&self, body: &str) -> Result<MessageId, TasqError> {
        let message_id = self
            .gateway
            .send(&self.queue_name, body, self.delay_seconds)
            .await?;
        tracing::debug!(queue = %self.queue_name, message_id = %message_id, "message published");
        Ok(message_id)
    }

    pub async fn publish_lazy(&self, envelope: &Envelope) -> Result<MessageId, TasqError> {
        let body = envelope.encode()?;
        self.publish(&body).await
    }

    pub async fn publish_call<T: Serialize>(&self, call: &T) -> Result<MessageId, TasqError> {
        let envelope = encode_call(call)?;
        self.publish_lazy(&envelope).await
    }
}
