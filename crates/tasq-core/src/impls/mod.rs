//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryQueueService**: 開発・テスト用のキューサービス
//!
//! # 本番用実装
//! 本番用の実装は別クレートに配置します：
//! - `tasq-sqs`: SqsQueueService

pub mod inmem_queue;

pub use self::inmem_queue::InMemoryQueueService;
