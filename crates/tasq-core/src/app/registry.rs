//! TaskRegistry - Task の登録・管理とワンショット送信の窓口
//!
//! # 学習ポイント
//! - 登録 = worker の起動（`register_task` は同期関数だが Tokio ランタイム上で呼ぶ）
//! - `QueueGateway`（アドレスキャッシュ込み）を全 Task / Publisher で共有
//! - ヘルスは各 Task の liveness の AND（空なら true）
//!
//! # 使用例
//! ```ignore
//! let registry = TaskRegistry::new(Arc::new(InMemoryQueueService::with_queues(&["orders"])));
//! let task = registry.register_task("orders", TaskOptions::default(), TaskHandler::message(handler))?;
//! registry.publish("orders", "hello", 0).await?;
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::builder::RegistryBuilder;
use super::gateway::QueueGateway;
use super::publisher::Publisher;
use super::status::HealthReport;
use super::task::Task;
use crate::domain::{
    Envelope, MessageId, QueueAddress, ReceivedMessage, RetryPolicy, TaskId, TaskOptions,
    TasqError, validate_delay_seconds,
};
use crate::ports::{IdGenerator, QueueService, SystemClock, UlidGenerator};
use crate::typed::{Handler, TaskCall, TaskHandler, TypedTask};

pub struct TaskRegistry {
    gateway: QueueGateway,
    id_generator: Arc<dyn IdGenerator>,
    receive_backoff: RetryPolicy,
    tasks: RwLock<BTreeMap<TaskId, Arc<Task>>>,
}

impl TaskRegistry {
    /// デフォルト設定の TaskRegistry を作成
    pub fn new(service: Arc<dyn QueueService>) -> Self {
        Self::from_parts(
            QueueGateway::new(service),
            Arc::new(UlidGenerator::new(SystemClock)),
            RetryPolicy::receive_default(),
        )
    }

    pub fn builder(service: Arc<dyn QueueService>) -> RegistryBuilder {
        RegistryBuilder::new(service)
    }

    pub(crate) fn from_parts(
        gateway: QueueGateway,
        id_generator: Arc<dyn IdGenerator>,
        receive_backoff: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            id_generator,
            receive_backoff,
            tasks: RwLock::new(BTreeMap::new()),
        }
    }

    /// `queue_name` にタスクを作成して worker を起動
    ///
    /// Tokio runtime の中から呼ぶこと
    pub fn register_task(
        &self,
        queue_name: impl Into<String>,
        options: TaskOptions,
        handler: TaskHandler,
    ) -> Result<Arc<Task>, TasqError> {
        let queue_name = queue_name.into();
        let task = Task::spawn(
            self.id_generator.generate_task_id(),
            queue_name,
            options,
            handler,
            self.gateway.clone(),
            self.receive_backoff.clone(),
        )?;

        tracing::info!(
            task_id = %task.id(),
            queue = %task.queue_name(),
            lazy = task.is_lazy(),
            provider = self.gateway.provider_name(),
            "task registered"
        );
        self.write_tasks().insert(task.id(), Arc::clone(&task));
        Ok(task)
    }

    /// `T::QUEUE` に型付きハンドラーを登録
    pub fn register_typed<T: TaskCall, H: Handler<T> + 'static>(
        &self,
        options: TaskOptions,
        handler: H,
    ) -> Result<TypedTask<T>, TasqError> {
        let task = self.register_task(T::QUEUE, options, TaskHandler::typed::<T, H>(handler))?;
        Ok(TypedTask::new(task))
    }

    /// 登録済みタスクの id -> Task スナップショット
    pub fn list_tasks(&self) -> BTreeMap<TaskId, Arc<Task>> {
        self.read_tasks().clone()
    }

    pub fn get_task(&self, id: TaskId) -> Option<Arc<Task>> {
        self.read_tasks().get(&id).cloned()
    }

    pub fn check_health(&self) -> bool {
        self.read_tasks().values().all(|task| task.check_health())
    }

    pub fn health_report(&self) -> HealthReport {
        HealthReport::from_tasks(self.read_tasks().values().map(|t| t.status()).collect())
    }

    /// 本文をそのまま 1 回送信。delay は RPC の前に検証する
    pub async fn publish(
        &self,
        queue_name: &str,
        message: &str,
        delay_seconds: u32,
    ) -> Result<MessageId, TasqError> {
        validate_delay_seconds(delay_seconds)?;
        self.gateway.send(queue_name, message, delay_seconds).await
    }

    pub async fn publish_lazy(
        &self,
        queue_name: &str,
        envelope: &Envelope,
    ) -> Result<MessageId, TasqError> {
        let body = envelope.encode()?;
        self.gateway.send(queue_name, &body, 0).await
    }

    /// アドレスキャッシュを共有する Publisher を作成
    pub fn publisher(
        &self,
        queue_name: impl Into<String>,
        delay_seconds: u32,
    ) -> Result<Publisher, TasqError> {
        Publisher::new(self.gateway.clone(), queue_name, delay_seconds)
    }

    pub async fn delete_message(
        &self,
        queue_name: &str,
        message: &ReceivedMessage,
    ) -> Result<(), TasqError> {
        self.gateway
            .delete(queue_name, message.receipt_handle())
            .await
    }

    pub async fn resolve_address(&self, queue_name: &str) -> Result<QueueAddress, TasqError> {
        self.gateway.resolve_address(queue_name).await
    }

    pub fn gateway(&self) -> &QueueGateway {
        &self.gateway
    }

    /// 全タスクを停止して worker の終了を待つ
    pub async fn shutdown(&self) {
        let tasks = self.list_tasks();
        for task in tasks.values() {
            task.request_stop();
        }
        for task in tasks.values() {
            task.stop().await;
        }
        tracing::info!(tasks = tasks.len(), "registry shut down");
    }

    fn read_tasks(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<TaskId, Arc<Task>>> {
        self.tasks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_tasks(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<TaskId, Arc<Task>>> {
        self.tasks.write().unwrap_or_else(|e| e.into_inner())
    }
}
