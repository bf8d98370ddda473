//! TaskCall trait - 型付き lazy 呼び出しの定義
//!
//! # 学習ポイント
//! - Associated Constants (`const QUEUE`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::Task;
use crate::domain::{MessageId, TaskId, TasqError};

/// TaskCall はキューに紐づいた呼び出しペイロード
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendEmail {
///     to: String,
///     subject: String,
/// }
///
/// impl TaskCall for SendEmail {
///     const QUEUE: &'static str = "prod-send-email";
/// }
/// ```
pub trait TaskCall: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// publish 先 / 受信元のキュー名
    const QUEUE: &'static str;
}

/// TypedTask は `T` 用に登録されたタスクのハンドル（`trigger` は `T` しか受け取らない）
pub struct TypedTask<T: TaskCall> {
    task: Arc<Task>,
    _marker: PhantomData<fn(T)>,
}

impl<T: TaskCall> TypedTask<T> {
    pub(crate) fn new(task: Arc<Task>) -> Self {
        Self {
            task,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub async fn trigger(&self, call: &T) -> Result<MessageId, TasqError> {
        self.task.trigger_call(call).await
    }

    pub fn check_health(&self) -> bool {
        self.task.check_health()
    }

    /// 裏にある型なしの Task
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }
}

impl<T: TaskCall> Clone for TypedTask<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.task))
    }
}
