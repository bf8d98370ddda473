//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **TaskRegistry / RegistryBuilder**: Task の登録と起動時検証
//! - **Task**: キューに紐づいたハンドラー + worker
//! - **WorkerLoop**: 受信ループ（receive→invoke→policy→delete）
//! - **Publisher**: 1 キューへの送信口
//! - **QueueGateway / AddressCache**: キュー名ベースの RPC とアドレス解決
//! - **Status**: Task の状態・カウンタ・ヘルスのビュー

pub mod address_cache;
pub mod builder;
pub mod gateway;
pub mod publisher;
pub mod registry;
pub mod status;
pub mod task;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::address_cache::AddressCache;
pub use self::builder::{BuildError, RegistryBuilder};
pub use self::gateway::QueueGateway;
pub use self::publisher::Publisher;
pub use self::registry::TaskRegistry;
pub use self::status::{HealthReport, TaskStats, TaskStatsSnapshot, TaskStatus};
pub use self::task::Task;
pub use self::worker_loop::WorkerLoop;
