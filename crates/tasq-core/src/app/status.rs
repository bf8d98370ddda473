//! Status - Task の状態とカウンタの参照用ビュー
//!
//! `TaskStats` は worker loop が更新するカウンタ（atomic）。
//! 外に出すときは `TaskStatsSnapshot` にコピーしてから serialize する。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::{TaskId, TaskState};

#[derive(Debug, Default)]
pub struct TaskStats {
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    deleted: AtomicU64,
    dead_lettered: AtomicU64,
    receive_errors: AtomicU64,
}

impl TaskStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TaskStatsSnapshot {
        TaskStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

/// TaskStatsSnapshot はカウンタのある時点のコピー
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatsSnapshot {
    pub received: u64,
    pub succeeded: u64,
    /// 全試行を使い切っても失敗したメッセージ数
    pub failed: u64,
    pub deleted: u64,
    pub dead_lettered: u64,
    pub receive_errors: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub queue: String,
    pub lazy: bool,
    pub state: TaskState,
    pub healthy: bool,
    pub stats: TaskStatsSnapshot,
}

/// HealthReport はレジストリ全体のヘルス（全タスクが healthy なら healthy、空なら true）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub tasks: Vec<TaskStatus>,
}

impl HealthReport {
    pub fn from_tasks(tasks: Vec<TaskStatus>) -> Self {
        Self {
            healthy: tasks.iter().all(|t| t.healthy),
            tasks,
        }
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &TaskStatus> {
        self.tasks.iter().filter(|t| !t.healthy)
    }
}
