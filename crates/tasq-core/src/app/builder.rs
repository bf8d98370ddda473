//! RegistryBuilder - TaskRegistry の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use chrono::Duration;

use super::gateway::QueueGateway;
use super::registry::TaskRegistry;
use crate::config::RegistryConfig;
use crate::domain::{RetryPolicy, TasqError};
use crate::ports::{Clock, IdGenerator, QueueService, SystemClock, UlidGenerator};

/// RegistryBuilder は TaskRegistry を構築
///
/// # 使用例
/// ```ignore
/// let registry = TaskRegistry::builder(service)
///     .config(RegistryConfig::from_env())
///     .expect_queues(&["orders", "orders-dlq"])
///     .build()
///     .await?;
/// ```
///
/// # Fail-fast 設計
/// - expect_queues() で必要なキュー名を登録
/// - build() 時に全部解決できるかチェック（解決結果はキャッシュに残る）
/// - 解決できないものがあれば BuildError を返す
pub struct RegistryBuilder {
    service: Arc<dyn QueueService>,
    clock: Arc<dyn Clock>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    address_cache_ttl: Option<Duration>,
    receive_backoff: RetryPolicy,
    expected_queues: Vec<String>,
}

/// BuildError はレジストリ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing queues: {0:?}. These queues were expected but could not be resolved.")]
    MissingQueues(Vec<String>),

    #[error("resolving expected queues failed: {0}")]
    Transport(#[source] TasqError),
}

impl RegistryBuilder {
    pub fn new(service: Arc<dyn QueueService>) -> Self {
        Self {
            service,
            clock: Arc::new(SystemClock),
            id_generator: None,
            address_cache_ttl: None,
            receive_backoff: RetryPolicy::receive_default(),
            expected_queues: Vec::new(),
        }
    }

    /// キャッシュ期限の計測と（`id_generator` 未指定なら）タスク ID に使う Clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    pub fn address_cache_ttl(mut self, ttl: Duration) -> Self {
        self.address_cache_ttl = Some(ttl);
        self
    }

    pub fn receive_backoff(mut self, backoff: RetryPolicy) -> Self {
        self.receive_backoff = backoff;
        self
    }

    /// `config` の設定をまとめて適用
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.address_cache_ttl = config.address_cache_ttl();
        self.receive_backoff = config.receive_backoff;
        self
    }

    /// 期待されるキュー名のリストを設定
    pub fn expect_queues(mut self, queue_names: &[&str]) -> Self {
        self.expected_queues = queue_names.iter().map(|name| name.to_string()).collect();
        self
    }

    /// # 検証
    /// - expect_queues() で設定されたキューが全て解決できるかチェック
    /// - 見つからないものがあれば BuildError::MissingQueues を返す
    /// - list 自体が失敗したら BuildError::Transport
    pub async fn build(self) -> Result<TaskRegistry, BuildError> {
        let gateway = QueueGateway::with_cache_ttl(
            self.service,
            Arc::clone(&self.clock),
            self.address_cache_ttl,
        );

        let mut missing_queues = Vec::new();
        for queue_name in &self.expected_queues {
            match gateway.resolve_address(queue_name).await {
                Ok(_) => {}
                Err(TasqError::AddressResolution { .. }) => missing_queues.push(queue_name.clone()),
                Err(err) => return Err(BuildError::Transport(err)),
            }
        }
        if !missing_queues.is_empty() {
            return Err(BuildError::MissingQueues(missing_queues));
        }

        let id_generator = self
            .id_generator
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&self.clock))));

        Ok(TaskRegistry::from_parts(
            gateway,
            id_generator,
            self.receive_backoff,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryQueueService;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn service(names: &[&str]) -> (Arc<InMemoryQueueService>, Arc<dyn QueueService>) {
        let service = Arc::new(InMemoryQueueService::with_queues(names));
        let dyn_service: Arc<dyn QueueService> = service.clone();
        (service, dyn_service)
    }

    #[tokio::test]
    async fn test_build_success() {
        let (_, service) = service(&["orders", "orders-dlq"]);
        let registry = RegistryBuilder::new(service)
            .expect_queues(&["orders", "orders-dlq"])
            .build()
            .await;
        assert!(registry.is_ok());
    }

    #[tokio::test]
    async fn test_build_missing_queues() {
        let (_, service) = service(&["orders"]);
        let registry = RegistryBuilder::new(service)
            .expect_queues(&["orders", "payments"])
            .build()
            .await;
        assert!(matches!(
            registry,
            Err(BuildError::MissingQueues(missing)) if missing == vec!["payments".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_build_no_expect_queues() {
        let (inner, service) = service(&[]);
        let registry = RegistryBuilder::new(service).build().await;
        assert!(registry.is_ok());
        assert_eq!(inner.list_calls(), 0);
    }

    #[tokio::test]
    async fn expected_queues_are_already_cached() {
        let (inner, service) = service(&["orders"]);
        let registry = RegistryBuilder::new(service)
            .expect_queues(&["orders"])
            .build()
            .await
            .unwrap();
        registry.publish("orders", "m", 0).await.unwrap();
        assert_eq!(inner.list_calls(), 1);
    }

    #[tokio::test]
    async fn clock_drives_generated_ids() {
        let (_, service) = service(&[]);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let registry = RegistryBuilder::new(service)
            .clock(Arc::new(FixedClock::new(now)))
            .build()
            .await
            .unwrap();
        let task = registry
            .register_task(
                "anything",
                crate::domain::TaskOptions::default().wait_time_seconds(0),
                crate::typed::TaskHandler::message(crate::typed::message_fn(
                    |_m: crate::domain::ReceivedMessage| async {
                        Ok::<(), crate::domain::HandlerError>(())
                    },
                )),
            )
            .unwrap();
        assert_eq!(
            task.id().as_ulid().timestamp_ms(),
            now.timestamp_millis() as u64
        );
        registry.shutdown().await;
    }

    #[test]
    fn config_sets_ttl_and_backoff() {
        let (_, service) = service(&[]);
        let backoff = RetryPolicy::new(
            std::time::Duration::from_millis(10),
            1.5,
            std::time::Duration::from_secs(1),
        );
        let builder = RegistryBuilder::new(service).config(RegistryConfig {
            address_cache_ttl_secs: Some(120),
            receive_backoff: backoff.clone(),
        });
        assert_eq!(builder.address_cache_ttl, Some(Duration::seconds(120)));
        assert_eq!(builder.receive_backoff, backoff);
    }
}
