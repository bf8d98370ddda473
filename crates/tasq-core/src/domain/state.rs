//! State - Task の状態
//!
//! # 状態遷移
//! - created: 登録直後（worker 起動前）
//! - running: worker がポーリング中
//! - stopped: `stop()` による停止
//! - failed: キューアドレスが解決できず worker が終了

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    Running,
    Stopped,
    Failed,
}

impl TaskState {
    /// 終端状態からは遷移しない
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
