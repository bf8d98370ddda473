//! Observability - tracing subscriber の初期化
//!
//! ライブラリ自体は `tracing` のイベントを出すだけ。
//! subscriber を持っていないアプリ向けに `init_tracing()` を用意しています。

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` が未設定か不正なときのフィルタ
pub const DEFAULT_FILTER: &str = "info";

static TRACING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// `RUST_LOG`（デフォルト `info`）でフィルタした fmt subscriber を設定
///
/// 別のグローバル subscriber が設定済みなら `false`。
/// 何度呼んでもよい
pub fn init_tracing() -> bool {
    *TRACING_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!("tracing subscriber installed");
        }
        installed
    })
}
