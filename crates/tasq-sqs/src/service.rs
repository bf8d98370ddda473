//! SqsQueueService - Amazon SQS による QueueService 実装
//!
//! # 学習ポイント
//! - `aws_config::defaults(BehaviorVersion::latest())` + standard retry
//! - ListQueues の NextToken ページング
//! - SDK エラーから service error code を取り出して `TasqError::Transport` へ

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::config::Credentials;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};

use tasq_core::domain::{MessageId, QueueAddress, ReceiptHandle, ReceivedMessage, TasqError};
use tasq_core::ports::{QueueService, ReceiveRequest};

use crate::config::SqsConfig;

const CREDENTIALS_PROVIDER_NAME: &str = "tasq-static";

#[derive(Debug, Clone)]
pub struct SqsQueueService {
    client: Client,
}

impl SqsQueueService {
    /// `config` からクライアントを作る。未指定の項目は
    /// SDK のデフォルトプロバイダチェーンに任せる
    pub async fn connect(config: &SqsConfig) -> Self {
        let retry_config = RetryConfig::standard().with_max_attempts(config.max_attempts);

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).retry_config(retry_config);
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                config.session_token.clone(),
                None,
                CREDENTIALS_PROVIDER_NAME,
            ));
        }

        let sdk_config = loader.load().await;
        tracing::info!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            endpoint_url = ?config.endpoint_url,
            "SQS client configured"
        );
        Self::from_client(Client::new(&sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn list_queues(&self, name_prefix: Option<&str>) -> Result<Vec<QueueAddress>, TasqError> {
        let queue = name_prefix.unwrap_or_default();
        let mut addresses = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_queues()
                .set_queue_name_prefix(name_prefix.map(str::to_string))
                .set_next_token(next_token.take())
                .max_results(1000)
                .send()
                .await
                .map_err(|e| transport_error("list", queue, &e))?;

            addresses.extend(output.queue_urls().iter().map(QueueAddress::new));
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(addresses)
    }

    async fn send_message(
        &self,
        address: &QueueAddress,
        body: &str,
        delay_seconds: u32,
    ) -> Result<MessageId, TasqError> {
        let output = self
            .client
            .send_message()
            .queue_url(address.as_str())
            .message_body(body)
            .delay_seconds(clamp_i32(delay_seconds))
            .send()
            .await
            .map_err(|e| transport_error("send", address.queue_name(), &e))?;

        output
            .message_id()
            .map(MessageId::new)
            .ok_or_else(|| {
                TasqError::transport("send", address.queue_name(), "response carried no message id")
            })
    }

    async fn receive_messages(
        &self,
        address: &QueueAddress,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, TasqError> {
        let output = self
            .client
            .receive_message()
            .queue_url(address.as_str())
            .max_number_of_messages(clamp_i32(request.max_messages))
            .visibility_timeout(clamp_i32(request.visibility_timeout))
            .wait_time_seconds(clamp_i32(request.wait_time_seconds))
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| transport_error("receive", address.queue_name(), &e))?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| into_received(message, address))
            .collect())
    }

    async fn delete_message(
        &self,
        address: &QueueAddress,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), TasqError> {
        self.client
            .delete_message()
            .queue_url(address.as_str())
            .receipt_handle(receipt_handle.as_str())
            .send()
            .await
            .map_err(|e| transport_error("delete", address.queue_name(), &e))?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "sqs"
    }
}

/// SDK のメッセージを変換。receipt handle のないものは
/// delete できないので捨てる
pub(crate) fn into_received(message: Message, address: &QueueAddress) -> Option<ReceivedMessage> {
    let Some(receipt_handle) = message.receipt_handle else {
        tracing::warn!(
            queue = %address.queue_name(),
            message_id = ?message.message_id,
            "received message without receipt handle; skipping"
        );
        return None;
    };

    let attributes: HashMap<String, String> = message
        .attributes
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name.as_str().to_string(), value))
        .collect();

    // binary 値の属性は文字列にできないので落とす
    let message_attributes: HashMap<String, String> = message
        .message_attributes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| value.string_value.map(|v| (name, v)))
        .collect();

    Some(ReceivedMessage {
        message_id: message.message_id.map(MessageId::new),
        body: message.body.unwrap_or_default(),
        receipt_handle: ReceiptHandle::new(receipt_handle),
        attributes,
        message_attributes,
    })
}

fn transport_error<E>(operation: &'static str, queue: &str, err: &E) -> TasqError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let code = err.code().map(str::to_string);
    let error = TasqError::transport(operation, queue, DisplayErrorContext(err).to_string());
    match code {
        Some(code) => error.with_code(code),
        None => error,
    }
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
