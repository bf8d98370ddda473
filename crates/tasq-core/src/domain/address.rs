//! QueueAddress - キュー名から解決されたエンドポイント
//!
//! キューサービスはアドレス（SQS なら queue URL）でキューを指定します。
//! 名前との照合は最後のパスセグメントの完全一致で行います。

use serde::{Deserialize, Serialize};
use std::fmt;

/// QueueAddress は解決済みのキューのエンドポイント（SQS ならキュー URL）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueAddress(String);

impl QueueAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// アドレスに含まれるキュー名（最後のパスセグメント）
    pub fn queue_name(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// 完全一致のみ。`prefixQ2` は `Q2` に一致せず、
    /// `Q2` も `Q2-dlq` には一致しない
    pub fn matches_name(&self, queue_name: &str) -> bool {
        !queue_name.is_empty() && self.queue_name() == queue_name
    }
}

impl fmt::Display for QueueAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueueAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl From<&str> for QueueAddress {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}
