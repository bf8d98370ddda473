//! Failure and backoff policies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// RetryPolicy は指数バックオフ: `base_delay * multiplier^(attempt - 1)`、
/// 上限は `max_delay`
///
/// 例: base_delay=1s, multiplier=2.0, max_delay=30s の場合
/// - attempt 1: 1s
/// - attempt 2: 2s
/// - attempt 3: 4s
/// - attempt 6: 30s (capped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(with = "millis")]
    pub base_delay: Duration,
    pub multiplier: f64,
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// receive 失敗後に worker loop が使うバックオフ
    pub fn receive_default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(30))
    }

    /// `attempts` は 1 始まり（0 は 1 扱い）
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::receive_default()
    }
}

/// FailurePolicy はハンドラーが失敗したメッセージの扱い
///
/// ハンドラー実行後は必ず delete する。例外は dead-letter への転送に
/// 失敗したときだけで、その場合はキューに残して
/// visibility timeout 後の再配信に任せる
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// ログを出して delete
    #[default]
    Suppress,
    /// 元の本文を `queue_name` に転送してから delete
    DeadLetter { queue_name: String },
    /// その場で合計 `max_attempts` 回までハンドラーを再実行し、
    /// 結果に関係なく delete
    ///
    /// 待ち時間の合計が visibility timeout に届くと二重配信になるので
    /// `TaskOptions::validate` で弾く
    RetryWithBackoff {
        max_attempts: u32,
        backoff: RetryPolicy,
    },
}

impl FailurePolicy {
    pub fn dead_letter(queue_name: impl Into<String>) -> Self {
        Self::DeadLetter {
            queue_name: queue_name.into(),
        }
    }

    pub fn retry(max_attempts: u32, backoff: RetryPolicy) -> Self {
        Self::RetryWithBackoff {
            max_attempts,
            backoff,
        }
    }

    /// 1 メッセージあたりのハンドラー試行回数の上限
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::RetryWithBackoff { max_attempts, .. } => (*max_attempts).max(1),
            _ => 1,
        }
    }

    /// `attempt` 回目の失敗のあと、次の試行までに待つ時間
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::RetryWithBackoff { backoff, .. } => backoff.next_delay(attempt),
            _ => Duration::ZERO,
        }
    }

    /// 1 メッセージあたりのリトライ待ち時間の合計（ハンドラーの実行時間は含まない）
    pub fn total_retry_delay(&self) -> Duration {
        let retries = self.max_attempts() - 1;
        let mut total = Duration::ZERO;
        let mut previous = None;
        for attempt in 1..=retries {
            let delay = self.retry_delay(attempt);
            if previous == Some(delay) {
                // 上限に張り付いたので残りは掛け算で済ませる
                let remaining = retries - attempt + 1;
                return total.saturating_add(delay.saturating_mul(remaining));
            }
            total = total.saturating_add(delay);
            previous = Some(delay);
        }
        total
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
