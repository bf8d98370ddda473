//! InMemoryQueueService - 開発・テスト用のキューサービス
//!
//! # 学習ポイント
//! - `tokio::sync::Mutex` + `Notify` による long polling
//! - visibility timeout / delay の再現（`tokio::time::Instant` ベース）
//! - 受信ごとに新しい receipt handle を払い出す
//!
//! # 使用例
//! ```ignore
//! let service = InMemoryQueueService::with_queues(&["orders"]);
//! let registry = TaskRegistry::new(Arc::new(service));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use ulid::Ulid;

use crate::domain::message::RECEIVE_COUNT_ATTRIBUTE;
use crate::domain::{MessageId, QueueAddress, ReceiptHandle, ReceivedMessage, TasqError};
use crate::ports::{QueueService, ReceiveRequest};

pub const IN_MEMORY_BASE_URL: &str = "https://sqs.in-memory.local/000000000000";

const NON_EXISTENT_QUEUE: &str = "AWS.SimpleQueueService.NonExistentQueue";
const INVALID_RECEIPT: &str = "ReceiptHandleIsInvalid";

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    body: String,
    sent_at_ms: i64,
    visible_at: Instant,
    receive_count: u32,
    receipt: Option<ReceiptHandle>,
}

#[derive(Debug, Default)]
struct InMemoryQueue {
    messages: VecDeque<StoredMessage>,
}

impl InMemoryQueue {
    fn take_visible(&mut self, now: Instant, request: &ReceiveRequest) -> Vec<ReceivedMessage> {
        let hidden_until = now + Duration::from_secs(u64::from(request.visibility_timeout));
        let mut batch = Vec::new();
        for stored in self.messages.iter_mut() {
            if batch.len() >= request.max_messages as usize {
                break;
            }
            if stored.visible_at > now {
                continue;
            }
            let receipt = ReceiptHandle::new(format!("rh-{}", Ulid::new()));
            stored.visible_at = hidden_until;
            stored.receive_count += 1;
            stored.receipt = Some(receipt.clone());

            batch.push(
                ReceivedMessage::new(stored.body.clone(), receipt)
                    .with_message_id(stored.id.clone())
                    .with_attribute(RECEIVE_COUNT_ATTRIBUTE, stored.receive_count.to_string())
                    .with_attribute("SentTimestamp", stored.sent_at_ms.to_string()),
            );
        }
        batch
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.messages.iter().map(|m| m.visible_at).min()
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    queues: HashMap<QueueAddress, InMemoryQueue>,
    pending_receive_failures: u32,
}

/// InMemoryQueueService はメモリ上の `QueueService` 実装
///
/// アドレスは `https://sqs.in-memory.local/000000000000/<name>` の形
#[derive(Debug, Default)]
pub struct InMemoryQueueService {
    state: Mutex<InMemoryState>,
    notify: Notify,
    sent: AtomicU64,
    deleted: AtomicU64,
    list_calls: AtomicU64,
}

impl InMemoryQueueService {
    pub fn new() -> Self {
        Self::default()
    }

    /// キューを作成済みの状態で生成
    pub fn with_queues(queue_names: &[&str]) -> Self {
        let queues = queue_names
            .iter()
            .map(|name| (Self::address_for(name), InMemoryQueue::default()))
            .collect();
        Self {
            state: Mutex::new(InMemoryState {
                queues,
                pending_receive_failures: 0,
            }),
            ..Self::default()
        }
    }

    pub fn address_for(queue_name: &str) -> QueueAddress {
        QueueAddress::new(format!("{IN_MEMORY_BASE_URL}/{queue_name}"))
    }

    /// 冪等
    pub async fn create_queue(&self, queue_name: &str) -> QueueAddress {
        let address = Self::address_for(queue_name);
        let mut state = self.state.lock().await;
        state.queues.entry(address.clone()).or_default();
        address
    }

    /// キューを中身ごと削除
    pub async fn delete_queue(&self, queue_name: &str) -> bool {
        let mut state = self.state.lock().await;
        state.queues.remove(&Self::address_for(queue_name)).is_some()
    }

    /// 次の `n` 回の receive を transport エラーにする
    pub async fn fail_next_receives(&self, n: u32) {
        self.state.lock().await.pending_receive_failures = n;
    }

    /// 今すぐ受信できるメッセージ数
    pub async fn visible_len(&self, queue_name: &str) -> usize {
        let now = Instant::now();
        self.count(queue_name, |m| m.visible_at <= now).await
    }

    /// 受信済みで、delete もされず再表示もされていないメッセージ数
    pub async fn in_flight_len(&self, queue_name: &str) -> usize {
        let now = Instant::now();
        self.count(queue_name, |m| m.receipt.is_some() && m.visible_at > now)
            .await
    }

    /// 残っている全メッセージの本文（キュー順）
    pub async fn bodies(&self, queue_name: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .queues
            .get(&Self::address_for(queue_name))
            .map(|q| q.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    async fn count(&self, queue_name: &str, pred: impl Fn(&StoredMessage) -> bool) -> usize {
        let state = self.state.lock().await;
        state
            .queues
            .get(&Self::address_for(queue_name))
            .map(|q| q.messages.iter().filter(|&m| pred(m)).count())
            .unwrap_or(0)
    }

    fn missing(operation: &'static str, address: &QueueAddress) -> TasqError {
        TasqError::transport(operation, address.queue_name(), "queue does not exist")
            .with_code(NON_EXISTENT_QUEUE)
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn list_queues(&self, name_prefix: Option<&str>) -> Result<Vec<QueueAddress>, TasqError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock().await;
        let mut addresses: Vec<QueueAddress> = state
            .queues
            .keys()
            .filter(|a| name_prefix.is_none_or(|p| a.queue_name().starts_with(p)))
            .cloned()
            .collect();
        addresses.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(addresses)
    }

    async fn send_message(
        &self,
        address: &QueueAddress,
        body: &str,
        delay_seconds: u32,
    ) -> Result<MessageId, TasqError> {
        let id = MessageId::new(Ulid::new().to_string());
        {
            let mut state = self.state.lock().await;
            let queue = state
                .queues
                .get_mut(address)
                .ok_or_else(|| Self::missing("send", address))?;
            queue.messages.push_back(StoredMessage {
                id: id.clone(),
                body: body.to_string(),
                sent_at_ms: Utc::now().timestamp_millis(),
                visible_at: Instant::now() + Duration::from_secs(u64::from(delay_seconds)),
                receive_count: 0,
                receipt: None,
            });
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        // 待機中の receive を全部起こす（キューごとの区別はしない）
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn receive_messages(
        &self,
        address: &QueueAddress,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, TasqError> {
        {
            let mut state = self.state.lock().await;
            if state.pending_receive_failures > 0 {
                state.pending_receive_failures -= 1;
                return Err(TasqError::transport(
                    "receive",
                    address.queue_name(),
                    "injected receive failure",
                )
                .with_code("ServiceUnavailable"));
            }
        }

        let deadline = Instant::now() + Duration::from_secs(u64::from(request.wait_time_seconds));
        loop {
            // send より先に登録しておかないと通知を取りこぼす
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_visible = {
                let mut state = self.state.lock().await;
                let queue = state
                    .queues
                    .get_mut(address)
                    .ok_or_else(|| Self::missing("receive", address))?;
                let batch = queue.take_visible(Instant::now(), request);
                if !batch.is_empty() {
                    return Ok(batch);
                }
                queue.next_visible_at()
            };

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete_message(
        &self,
        address: &QueueAddress,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), TasqError> {
        let mut state = self.state.lock().await;
        let queue = state
            .queues
            .get_mut(address)
            .ok_or_else(|| Self::missing("delete", address))?;
        let position = queue
            .messages
            .iter()
            .position(|m| m.receipt.as_ref() == Some(receipt_handle))
            .ok_or_else(|| {
                TasqError::transport("delete", address.queue_name(), "receipt handle is invalid")
                    .with_code(INVALID_RECEIPT)
            })?;
        queue.messages.remove(position);
        self.deleted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn request(max_messages: u32, visibility_timeout: u32, wait_time_seconds: u32) -> ReceiveRequest {
        ReceiveRequest {
            max_messages,
            visibility_timeout,
            wait_time_seconds,
        }
    }

    #[tokio::test]
    async fn send_receive_delete_roundtrip() {
        let service = InMemoryQueueService::with_queues(&["orders"]);
        let address = InMemoryQueueService::address_for("orders");

        let id = service.send_message(&address, "m1", 0).await.unwrap();
        let batch = service
            .receive_messages(&address, &request(1, 30, 0))
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body(), "m1");
        assert_eq!(batch[0].message_id.as_ref(), Some(&id));
        assert_eq!(batch[0].receive_count(), Some(1));
        assert_eq!(service.in_flight_len("orders").await, 1);

        service
            .delete_message(&address, batch[0].receipt_handle())
            .await
            .unwrap();
        assert_eq!(service.bodies("orders").await, Vec::<String>::new());
        assert_eq!(service.deleted_count(), 1);
    }

    #[tokio::test]
    async fn receive_respects_max_messages_and_order() {
        let service = InMemoryQueueService::with_queues(&["orders"]);
        let address = InMemoryQueueService::address_for("orders");
        for body in ["a", "b", "c"] {
            service.send_message(&address, body, 0).await.unwrap();
        }

        let batch = service
            .receive_messages(&address, &request(2, 30, 0))
            .await
            .unwrap();
        let bodies: Vec<&str> = batch.iter().map(|m| m.body()).collect();
        assert_eq!(bodies, vec!["a", "b"]);
        assert_eq!(service.visible_len("orders").await, 1);
    }

    #[tokio::test]
    async fn zero_visibility_makes_message_visible_again() {
        let service = InMemoryQueueService::with_queues(&["orders"]);
        let address = InMemoryQueueService::address_for("orders");
        service.send_message(&address, "again", 0).await.unwrap();

        let first = service
            .receive_messages(&address, &request(1, 0, 0))
            .await
            .unwrap();
        let second = service
            .receive_messages(&address, &request(1, 0, 0))
            .await
            .unwrap();
        assert_eq!(second[0].receive_count(), Some(2));
        assert_ne!(first[0].receipt_handle(), second[0].receipt_handle());

        // 古い receipt handle では削除できない
        let err = service
            .delete_message(&address, first[0].receipt_handle())
            .await
            .unwrap_err();
        assert!(matches!(err, TasqError::Transport { code: Some(ref c), .. } if c == INVALID_RECEIPT));
    }

    #[tokio::test]
    async fn delayed_message_is_hidden_until_due() {
        let service = InMemoryQueueService::with_queues(&["orders"]);
        let address = InMemoryQueueService::address_for("orders");
        service.send_message(&address, "later", 60).await.unwrap();

        let batch = service
            .receive_messages(&address, &request(1, 30, 0))
            .await
            .unwrap();
        assert!(batch.is_empty());
        assert_eq!(service.bodies("orders").await, vec!["later".to_string()]);
    }

    #[tokio::test]
    async fn empty_receive_waits_for_budget() {
        let service = InMemoryQueueService::with_queues(&["orders"]);
        let address = InMemoryQueueService::address_for("orders");

        let start = std::time::Instant::now();
        let batch = service
            .receive_messages(&address, &request(1, 30, 1))
            .await
            .unwrap();
        assert!(batch.is_empty());
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn send_wakes_long_poll() {
        let service = Arc::new(InMemoryQueueService::with_queues(&["orders"]));
        let address = InMemoryQueueService::address_for("orders");

        let receiver = tokio::spawn({
            let service = Arc::clone(&service);
            let address = address.clone();
            async move {
                service
                    .receive_messages(&address, &request(1, 30, 10))
                    .await
                    .unwrap()
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let start = std::time::Instant::now();
        service.send_message(&address, "wake", 0).await.unwrap();

        let batch = receiver.await.unwrap();
        assert_eq!(batch[0].body(), "wake");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn list_queues_filters_by_prefix() {
        let service = InMemoryQueueService::with_queues(&["Q2", "prefixQ2", "Q2-dlq"]);
        let all = service.list_queues(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let names: Vec<String> = service
            .list_queues(Some("Q2"))
            .await
            .unwrap()
            .iter()
            .map(|a| a.queue_name().to_string())
            .collect();
        assert_eq!(names, vec!["Q2".to_string(), "Q2-dlq".to_string()]);
        assert_eq!(service.list_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_queue_is_a_transport_error() {
        let service = InMemoryQueueService::new();
        let address = InMemoryQueueService::address_for("ghost");
        let err = service.send_message(&address, "x", 0).await.unwrap_err();
        assert!(matches!(
            err,
            TasqError::Transport { code: Some(ref c), .. } if c == NON_EXISTENT_QUEUE
        ));
    }

    #[tokio::test]
    async fn injected_receive_failures_are_consumed() {
        let service = InMemoryQueueService::with_queues(&["orders"]);
        let address = InMemoryQueueService::address_for("orders");
        service.fail_next_receives(1).await;

        assert!(service
            .receive_messages(&address, &request(1, 30, 0))
            .await
            .is_err());
        assert!(service
            .receive_messages(&address, &request(1, 30, 0))
            .await
            .is_ok());
    }
}
