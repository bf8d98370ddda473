//! Task - キューに紐づいたハンドラーと、その worker
//!
//! # 学習ポイント
//! - 生成時に worker を `tokio::spawn` する（登録 = 起動）
//! - stop シグナルと状態は `watch` チャネルで worker と共有
//! - liveness は `JoinHandle::is_finished()` で判定
//!
//! # 状態遷移
//! ```text
//! created -> running -> stopped   (stop())
//!                    -> failed    (アドレス解決失敗)
//! ```

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::gateway::QueueGateway;
use super::publisher::Publisher;
use super::status::{TaskStats, TaskStatsSnapshot, TaskStatus};
use super::worker_loop::{WorkerLoop, invoke_guarded};
use crate::domain::{Envelope, MessageId, RetryPolicy, TaskId, TaskOptions, TaskState, TasqError};
use crate::typed::{Invocation, TaskHandler, encode_call};

pub struct Task {
    id: TaskId,
    queue_name: String,
    options: TaskOptions,
    handler: TaskHandler,
    /// lazy のときだけ持つ
    publisher: Option<Publisher>,
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<TaskState>,
    stats: Arc<TaskStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Task {
    /// options を検証し、現在の Tokio runtime 上でタスクを作って起動
    pub(crate) fn spawn(
        id: TaskId,
        queue_name: impl Into<String>,
        options: TaskOptions,
        handler: TaskHandler,
        gateway: QueueGateway,
        receive_backoff: RetryPolicy,
    ) -> Result<Arc<Self>, TasqError> {
        let queue_name = queue_name.into();
        options.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            TasqError::InvalidOperation("registering a task requires a Tokio runtime".into())
        })?;

        let publisher = if handler.is_lazy() {
            Some(Publisher::new(
                gateway.clone(),
                queue_name.clone(),
                options.delay_seconds,
            )?)
        } else {
            None
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(TaskState::Created);
        let stats = Arc::new(TaskStats::default());

        let worker = WorkerLoop::new(
            id,
            queue_name.clone(),
            options.clone(),
            handler.clone(),
            gateway,
            receive_backoff,
            Arc::clone(&stats),
            stop_rx,
            state_tx,
        );
        let join = runtime.spawn(worker.run());

        Ok(Arc::new(Self {
            id,
            queue_name,
            options,
            handler,
            publisher,
            stop_tx,
            state_rx,
            stats,
            worker: Mutex::new(Some(join)),
        }))
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    pub fn is_lazy(&self) -> bool {
        self.handler.is_lazy()
    }

    /// このタスク自身のハンドラー向けに引数 envelope を publish
    ///
    /// 非 lazy タスクではキューに触れず `InvalidOperation`
    pub async fn trigger(&self, envelope: Envelope) -> Result<MessageId, TasqError> {
        self.lazy_publisher()?.publish_lazy(&envelope).await
    }

    /// 型付きの呼び出しを envelope に encode して `trigger`
    pub async fn trigger_call<T: Serialize>(&self, call: &T) -> Result<MessageId, TasqError> {
        let publisher = self.lazy_publisher()?;
        let envelope = encode_call(call)?;
        publisher.publish_lazy(&envelope).await
    }

    /// キューを通さずにその場でハンドラーを呼ぶ
    pub async fn invoke_directly(&self, invocation: Invocation) -> Result<(), TasqError> {
        if !self.handler.accepts(&invocation) {
            let expected = if self.is_lazy() {
                "an argument envelope"
            } else {
                "a raw message"
            };
            return Err(TasqError::InvalidOperation(format!(
                "task {} on '{}' expects {expected}",
                self.id, self.queue_name
            )));
        }
        invoke_guarded(&self.handler, invocation)
            .await
            .map_err(|source| TasqError::HandlerInvocation {
                task_id: self.id,
                source,
            })
    }

    /// liveness: worker が動いている間は true
    pub fn check_health(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|join| !join.is_finished())
    }

    pub fn state(&self) -> TaskState {
        *self.state_rx.borrow()
    }

    pub fn stats(&self) -> TaskStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus {
            task_id: self.id,
            queue: self.queue_name.clone(),
            lazy: self.is_lazy(),
            state: self.state(),
            healthy: self.check_health(),
            stats: self.stats(),
        }
    }

    /// worker に停止を要求（終了は待たない）
    ///
    /// 処理中のハンドラーは最後まで走る。同じバッチの残りは処理も
    /// delete もされず、visibility timeout 後に再配信される
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// worker を停止して終了を待つ（冪等）
    pub async fn stop(&self) {
        self.request_stop();
        let join = self.lock_worker().take();
        if let Some(join) = join {
            if let Err(err) = join.await {
                tracing::error!(task_id = %self.id, queue = %self.queue_name, error = %err, "worker join failed");
            }
        }
    }

    fn lazy_publisher(&self) -> Result<&Publisher, TasqError> {
        self.publisher.as_ref().ok_or_else(|| {
            TasqError::InvalidOperation(format!(
                "trigger called on non-lazy task {} (queue '{}')",
                self.id, self.queue_name
            ))
        })
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("queue_name", &self.queue_name)
            .field("handler", &self.handler)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
