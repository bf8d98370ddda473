//! Config - レジストリ全体の設定
//!
//! デフォルト値 -> 環境変数で上書き、の順に組み立てます。
//! パースできない値は警告を出してデフォルトのまま使います。
//!
//! | 変数 | 意味 |
//! |------|------|
//! | `TASQ_ADDRESS_CACHE_TTL_SECS` | アドレスキャッシュの TTL（未設定なら無期限） |
//! | `TASQ_RECEIVE_BACKOFF_BASE_MS` | receive 失敗時の初回待ち時間 |
//! | `TASQ_RECEIVE_BACKOFF_MULTIPLIER` | 待ち時間の倍率 |
//! | `TASQ_RECEIVE_BACKOFF_MAX_MS` | 待ち時間の上限 |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// `None` なら invalidate されるまで保持
    pub address_cache_ttl_secs: Option<u64>,
    pub receive_backoff: RetryPolicy,
}

impl RegistryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の変数ソースから構築（テスト用）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ttl) = parse_var::<u64>(&lookup, "TASQ_ADDRESS_CACHE_TTL_SECS") {
            config.address_cache_ttl_secs = Some(ttl);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TASQ_RECEIVE_BACKOFF_BASE_MS") {
            config.receive_backoff.base_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = parse_var::<f64>(&lookup, "TASQ_RECEIVE_BACKOFF_MULTIPLIER") {
            config.receive_backoff.multiplier = multiplier;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TASQ_RECEIVE_BACKOFF_MAX_MS") {
            config.receive_backoff.max_delay = Duration::from_millis(ms);
        }

        config
    }

    pub fn address_cache_ttl(&self) -> Option<chrono::Duration> {
        self.address_cache_ttl_secs
            .map(|secs| chrono::Duration::seconds(secs.min(i64::MAX as u64) as i64))
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparsable config value");
            None
        }
    }
}
