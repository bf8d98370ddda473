//! Errors - エラー型と分類
//!
//! # 分類
//! - `TasqError`: ライブラリ全体のエラー（呼び出し元に返るもの）
//! - `HandlerError`: ハンドラーが返すエラー（worker loop 内では握りつぶしてログのみ）
//! - `CodecError`: envelope の encode / decode / bind 失敗

use thiserror::Error;

use super::ids::TaskId;

/// ErrorKind は運用上の分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（リトライ無意味）
/// - Infrastructure: キューサービス側の障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum TasqError {
    /// 名前に一致するキューがない。そのキューに対する操作は全部致命的
    #[error("no queue address matches name '{queue_name}'")]
    AddressResolution { queue_name: String },

    /// send / receive / delete / list の RPC が失敗
    #[error("{operation} failed on queue '{queue}': {message}")]
    Transport {
        operation: &'static str,
        queue: String,
        code: Option<String>,
        message: String,
    },

    #[error("handler for {task_id} failed: {source}")]
    HandlerInvocation {
        task_id: TaskId,
        #[source]
        source: HandlerError,
    },

    /// 使い方の誤り（非 lazy タスクへの `trigger` など）
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid option `{field}`: {reason}")]
    InvalidOptions { field: &'static str, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TasqError {
    pub fn address_resolution(queue_name: impl Into<String>) -> Self {
        Self::AddressResolution {
            queue_name: queue_name.into(),
        }
    }

    pub fn transport(
        operation: &'static str,
        queue: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            operation,
            queue: queue.into(),
            code: None,
            message: message.into(),
        }
    }

    /// `Transport` にサービスのエラーコードを付ける（他の variant では何もしない）
    pub fn with_code(mut self, service_code: impl Into<String>) -> Self {
        if let Self::Transport { code, .. } = &mut self {
            *code = Some(service_code.into());
        }
        self
    }

    pub fn invalid_option(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            field,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Infrastructure,
            Self::HandlerInvocation { .. } => ErrorKind::Transient,
            Self::AddressResolution { .. }
            | Self::InvalidOperation(_)
            | Self::InvalidOptions { .. }
            | Self::Codec(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Permanent
    }
}

/// HandlerError はハンドラーが返すエラー
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CodecError> for HandlerError {
    fn from(err: CodecError) -> Self {
        Self::with_source("argument binding failed", err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("json error", err)
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("envelope encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("envelope decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("cannot bind arguments: {0}")]
    Bind(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_code_only_touches_transport() {
        let err = TasqError::transport("receive", "orders", "boom").with_code("Throttling");
        assert!(matches!(
            err,
            TasqError::Transport { code: Some(ref c), .. } if c == "Throttling"
        ));

        let err = TasqError::address_resolution("orders").with_code("ignored");
        assert!(matches!(err, TasqError::AddressResolution { .. }));
    }

    #[test]
    fn classification() {
        assert_eq!(
            TasqError::transport("send", "q", "x").kind(),
            ErrorKind::Infrastructure
        );
        assert!(TasqError::transport("send", "q", "x").is_retryable());
        assert!(!TasqError::address_resolution("q").is_retryable());
        assert!(!TasqError::InvalidOperation("nope".into()).is_retryable());
    }

    #[test]
    fn handler_error_keeps_source() {
        let io = std::io::Error::other("disk full");
        let err = HandlerError::with_source("write failed", io);
        assert_eq!(err.to_string(), "write failed");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk full"));
    }

    #[test]
    fn display_messages_name_the_queue() {
        let msg = TasqError::address_resolution("Q2").to_string();
        assert!(msg.contains("'Q2'"));
        let msg = TasqError::invalid_option("max_messages", "must be 1..=10").to_string();
        assert!(msg.contains("max_messages"));
    }
}
