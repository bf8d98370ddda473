//! tasq-core
//!
//! Task-queue building blocks on top of a managed message queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, address, message, envelope, options, policy, state, errors）
//! - **ports**: 抽象化レイヤー（QueueService, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（registry, builder, task, worker_loop, publisher, gateway）
//! - **typed**: ハンドラーと型付き Task API（Handler trait, TaskCall, codec）
//! - **impls**: 実装（InMemoryQueueService など開発用）
//! - **config**: 環境変数からの設定
//! - **observability**: tracing の初期化
//!
//! # 使用例
//! ```ignore
//! let service = Arc::new(InMemoryQueueService::with_queues(&["greetings"]));
//! let registry = TaskRegistry::new(service);
//! let task = registry.register_task(
//!     "greetings",
//!     TaskOptions::default(),
//!     TaskHandler::lazy(lazy_fn(|args, _kwargs| async move {
//!         println!("hello {:?}", args);
//!         Ok(())
//!     })),
//! )?;
//! task.trigger(Envelope::new().with_arg("world")).await?;
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;

pub use app::{
    BuildError, HealthReport, Publisher, QueueGateway, RegistryBuilder, Task, TaskRegistry,
    TaskStatus,
};
pub use config::RegistryConfig;
pub use domain::{
    Envelope, FailurePolicy, HandlerError, QueueAddress, ReceivedMessage, RetryPolicy, TaskId,
    TaskOptions, TaskState, TasqError,
};
pub use impls::InMemoryQueueService;
pub use ports::QueueService;
pub use typed::{Handler, Invocation, TaskCall, TaskHandler, TypedTask, lazy_fn, message_fn};
