//! WorkerLoop - Task ごとの受信ループ
//!
//! # フロー
//! 1. `QueueGateway::receive()`（stop シグナルと select で競合させる）
//! 2. 0 件ならすぐ次の receive へ
//! 3. 1 件ずつ独立に: prepare -> invoke -> FailurePolicy -> delete
//!    （メッセージの合間に stop を確認。未処理分は delete しない）
//!
//! # 失敗の扱い
//! - アドレス解決失敗: 致命的。state を `Failed` にして worker を終了
//! - receive の transport エラー: `RetryPolicy` で待ってから再試行（tight-spin しない）
//! - handler の失敗 / panic: ログとカウンタのみ。ループは止めない
//! - delete の失敗: ログのみ（visibility timeout 後に再配信される）
//!
//! invoke より先に delete することはない。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;

use super::gateway::QueueGateway;
use super::status::TaskStats;
use crate::domain::{
    FailurePolicy, HandlerError, ReceiptHandle, ReceivedMessage, RetryPolicy, TaskId, TaskOptions,
    TaskState, TasqError,
};
use crate::ports::ReceiveRequest;
use crate::typed::{Invocation, TaskHandler};

pub struct WorkerLoop {
    task_id: TaskId,
    queue_name: String,
    options: TaskOptions,
    handler: TaskHandler,
    gateway: QueueGateway,
    receive_backoff: RetryPolicy,
    stats: Arc<TaskStats>,
    stop_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<TaskState>,
}

impl WorkerLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        task_id: TaskId,
        queue_name: String,
        options: TaskOptions,
        handler: TaskHandler,
        gateway: QueueGateway,
        receive_backoff: RetryPolicy,
        stats: Arc<TaskStats>,
        stop_rx: watch::Receiver<bool>,
        state_tx: watch::Sender<TaskState>,
    ) -> Self {
        Self {
            task_id,
            queue_name,
            options,
            handler,
            gateway,
            receive_backoff,
            stats,
            stop_rx,
            state_tx,
        }
    }

    pub async fn run(mut self) {
        self.state_tx.send_replace(TaskState::Running);
        tracing::info!(
            task_id = %self.task_id,
            queue = %self.queue_name,
            lazy = self.handler.is_lazy(),
            "worker started"
        );

        let request = ReceiveRequest {
            max_messages: self.options.max_messages,
            visibility_timeout: self.options.visibility_timeout,
            wait_time_seconds: self.options.wait_time_seconds,
        };
        let mut consecutive_failures = 0u32;

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            // receive は最大 wait_time_seconds 待つので stop と競合させる。
            // 途中で捨てた receive のメッセージは visibility timeout 後に戻ってくる
            let received = tokio::select! {
                biased;
                _ = self.stop_rx.changed() => break,
                result = self.gateway.receive(&self.queue_name, &request) => result,
            };

            match received {
                Ok(batch) if batch.is_empty() => {
                    consecutive_failures = 0;
                    tokio::task::yield_now().await;
                }
                Ok(batch) => {
                    consecutive_failures = 0;
                    tracing::debug!(
                        task_id = %self.task_id,
                        queue = %self.queue_name,
                        count = batch.len(),
                        "received batch"
                    );
                    let total = batch.len();
                    for (done, message) in batch.into_iter().enumerate() {
                        // 残りは処理せず手放す。visibility timeout 後に再配信される
                        if *self.stop_rx.borrow() {
                            tracing::info!(
                                task_id = %self.task_id,
                                queue = %self.queue_name,
                                released = total - done,
                                "stop requested mid-batch"
                            );
                            break;
                        }
                        self.process(message).await;
                    }
                }
                Err(err @ TasqError::AddressResolution { .. }) => {
                    tracing::error!(
                        task_id = %self.task_id,
                        queue = %self.queue_name,
                        error = %err,
                        "queue address cannot be resolved; worker exits"
                    );
                    self.state_tx.send_replace(TaskState::Failed);
                    return;
                }
                Err(err) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    self.stats.record_receive_error();
                    let delay = self.receive_backoff.next_delay(consecutive_failures);
                    tracing::warn!(
                        task_id = %self.task_id,
                        queue = %self.queue_name,
                        error = %err,
                        attempt = consecutive_failures,
                        backoff_ms = delay.as_millis() as u64,
                        "receive failed; backing off"
                    );
                    tokio::select! {
                        biased;
                        _ = self.stop_rx.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.state_tx.send_replace(TaskState::Stopped);
        tracing::info!(task_id = %self.task_id, queue = %self.queue_name, "worker stopped");
    }

    async fn process(&self, message: ReceivedMessage) {
        self.stats.record_received();
        let receipt = message.receipt_handle().clone();
        // DLQ に転送するときだけ元の body が要る
        let original_body = matches!(self.options.failure_policy, FailurePolicy::DeadLetter { .. })
            .then(|| message.body().to_string());

        let outcome = match self.handler.prepare(message) {
            Ok(invocation) => self.invoke_with_policy(invocation).await,
            // decode 失敗は何度やっても同じなので再試行しない
            Err(err) => Err(HandlerError::from(err)),
        };

        match outcome {
            Ok(()) => self.stats.record_succeeded(),
            Err(err) => {
                self.stats.record_failed();
                tracing::error!(
                    task_id = %self.task_id,
                    queue = %self.queue_name,
                    error = %err,
                    "handler failed"
                );
                if let (FailurePolicy::DeadLetter { queue_name }, Some(body)) =
                    (&self.options.failure_policy, original_body.as_deref())
                {
                    if !self.forward_to_dead_letter(queue_name, body).await {
                        return;
                    }
                }
            }
        }

        self.delete(&receipt).await;
    }

    async fn invoke_with_policy(&self, invocation: Invocation) -> Result<(), HandlerError> {
        let max_attempts = self.options.failure_policy.max_attempts();
        let mut attempt = 1;
        loop {
            match invoke_guarded(&self.handler, invocation.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < max_attempts => {
                    let delay = self.options.failure_policy.retry_delay(attempt);
                    tracing::warn!(
                        task_id = %self.task_id,
                        queue = %self.queue_name,
                        error = %err,
                        attempt,
                        max_attempts,
                        "handler failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// `false` ならメッセージはキューに残す
    async fn forward_to_dead_letter(&self, dead_letter_queue: &str, body: &str) -> bool {
        match self.gateway.send(dead_letter_queue, body, 0).await {
            Ok(message_id) => {
                self.stats.record_dead_lettered();
                tracing::info!(
                    task_id = %self.task_id,
                    queue = %self.queue_name,
                    dead_letter_queue = %dead_letter_queue,
                    message_id = %message_id,
                    "message dead-lettered"
                );
                true
            }
            Err(err) => {
                tracing::error!(
                    task_id = %self.task_id,
                    queue = %self.queue_name,
                    dead_letter_queue = %dead_letter_queue,
                    error = %err,
                    "dead-letter forward failed; message left for redelivery"
                );
                false
            }
        }
    }

    async fn delete(&self, receipt: &ReceiptHandle) {
        match self.gateway.delete(&self.queue_name, receipt).await {
            Ok(()) => self.stats.record_deleted(),
            Err(err) => tracing::warn!(
                task_id = %self.task_id,
                queue = %self.queue_name,
                error = %err,
                "delete failed; message will be redelivered"
            ),
        }
    }
}

/// ハンドラーを実行。panic は `HandlerError` に変換
pub(crate) async fn invoke_guarded(
    handler: &TaskHandler,
    invocation: Invocation,
) -> Result<(), HandlerError> {
    match AssertUnwindSafe(handler.invoke(invocation)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(HandlerError::new(format!(
            "handler panicked: {}",
            panic_message(&*panic)
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
