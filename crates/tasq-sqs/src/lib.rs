//! tasq-sqs
//!
//! Amazon SQS implementation of `tasq_core::ports::QueueService`.
//!
//! # 使用例
//! ```ignore
//! let service = SqsQueueService::connect(&SqsConfig::from_env()).await;
//! let registry = TaskRegistry::builder(Arc::new(service))
//!     .expect_queues(&["orders"])
//!     .build()
//!     .await?;
//! ```

pub mod config;
pub mod service;

pub use self::config::SqsConfig;
pub use self::service::SqsQueueService;
