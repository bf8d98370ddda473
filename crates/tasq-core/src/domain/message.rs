//! Messages as delivered by the queue service.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 配信回数を表すシステム属性
pub const RECEIVE_COUNT_ATTRIBUTE: &str = "ApproximateReceiveCount";

/// MessageId は送信時にキューサービスが振る ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ReceiptHandle は receive ごとに渡される削除用トークン
///
/// 受信のたびに新しいハンドルが発行され、
/// 確実に delete できるのは最新のものだけ
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ReceivedMessage はキューサービスのネイティブな形のメッセージ
///
/// 非 lazy ハンドラーにはこれがそのまま渡るので、
/// ID・属性・receipt handle にアクセスできる
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    pub message_id: Option<MessageId>,
    pub body: String,
    pub receipt_handle: ReceiptHandle,
    /// システム属性（`SentTimestamp`, `ApproximateReceiveCount` など）
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// ユーザー定義のメッセージ属性（文字列値のみ）
    #[serde(default)]
    pub message_attributes: HashMap<String, String>,
}

impl ReceivedMessage {
    pub fn new(body: impl Into<String>, receipt_handle: ReceiptHandle) -> Self {
        Self {
            message_id: None,
            body: body.into(),
            receipt_handle,
            attributes: HashMap::new(),
            message_attributes: HashMap::new(),
        }
    }

    pub fn with_message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn receipt_handle(&self) -> &ReceiptHandle {
        &self.receipt_handle
    }

    /// このメッセージが配信された回数（サービスが報告していれば）
    pub fn receive_count(&self) -> Option<u32> {
        self.attributes
            .get(RECEIVE_COUNT_ATTRIBUTE)
            .and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_count_reads_system_attribute() {
        let message = ReceivedMessage::new("body", ReceiptHandle::new("rh-1"))
            .with_attribute(RECEIVE_COUNT_ATTRIBUTE, "3");
        assert_eq!(message.receive_count(), Some(3));
    }

    #[test]
    fn receive_count_is_none_when_missing_or_garbled() {
        let message = ReceivedMessage::new("body", ReceiptHandle::new("rh-1"));
        assert_eq!(message.receive_count(), None);

        let message = message.with_attribute(RECEIVE_COUNT_ATTRIBUTE, "many");
        assert_eq!(message.receive_count(), None);
    }
}
