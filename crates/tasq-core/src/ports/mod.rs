//! Ports - 抽象化レイヤー
//!
//! 外部システム（キューサービス）と環境（時刻・ID 生成）への
//! インターフェースを trait で定義します。

pub mod clock;
pub mod id_generator;
pub mod queue_service;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue_service::{QueueService, ReceiveRequest};
