//! Task registration options.
//!
//! Defaults follow the queue service's own defaults: one message per
//! receive, 30s visibility, 20s long poll, no delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::TasqError;
use super::policy::FailurePolicy;

pub const MAX_MESSAGES_RANGE: (u32, u32) = (1, 10);
pub const MAX_VISIBILITY_TIMEOUT_SECS: u32 = 43_200;
pub const MAX_WAIT_TIME_SECS: u32 = 20;
pub const MAX_DELAY_SECS: u32 = 900;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    /// 1 回の receive で受け取る件数（1..=10）
    pub max_messages: u32,

    /// 受信したメッセージが他の受信者から見えなくなる秒数
    pub visibility_timeout: u32,

    /// receive 1 回のロングポーリング秒数（0..=20）
    pub wait_time_seconds: u32,

    /// `trigger` で送るメッセージの遅延秒数（0..=900）
    pub delay_seconds: u32,

    pub failure_policy: FailurePolicy,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            max_messages: 1,
            visibility_timeout: 30,
            wait_time_seconds: 20,
            delay_seconds: 0,
            failure_policy: FailurePolicy::Suppress,
        }
    }
}

impl TaskOptions {
    pub fn max_messages(mut self, n: u32) -> Self {
        self.max_messages = n;
        self
    }

    pub fn visibility_timeout(mut self, secs: u32) -> Self {
        self.visibility_timeout = secs;
        self
    }

    pub fn wait_time_seconds(mut self, secs: u32) -> Self {
        self.wait_time_seconds = secs;
        self
    }

    pub fn delay_seconds(mut self, secs: u32) -> Self {
        self.delay_seconds = secs;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), TasqError> {
        let (lo, hi) = MAX_MESSAGES_RANGE;
        if !(lo..=hi).contains(&self.max_messages) {
            return Err(TasqError::invalid_option(
                "max_messages",
                format!("{} is outside {lo}..={hi}", self.max_messages),
            ));
        }
        if self.visibility_timeout > MAX_VISIBILITY_TIMEOUT_SECS {
            return Err(TasqError::invalid_option(
                "visibility_timeout",
                format!(
                    "{} exceeds {MAX_VISIBILITY_TIMEOUT_SECS}",
                    self.visibility_timeout
                ),
            ));
        }
        if self.wait_time_seconds > MAX_WAIT_TIME_SECS {
            return Err(TasqError::invalid_option(
                "wait_time_seconds",
                format!("{} exceeds {MAX_WAIT_TIME_SECS}", self.wait_time_seconds),
            ));
        }
        validate_delay_seconds(self.delay_seconds)?;
        match &self.failure_policy {
            FailurePolicy::DeadLetter { queue_name } if queue_name.is_empty() => Err(
                TasqError::invalid_option("failure_policy", "dead-letter queue name is empty"),
            ),
            FailurePolicy::RetryWithBackoff { .. } if self.failure_policy.max_attempts() > 1 => {
                // リトライ中にメッセージが再び見えるようになると二重処理 + 古い receipt で delete
                let waited = self.failure_policy.total_retry_delay();
                let visibility = Duration::from_secs(u64::from(self.visibility_timeout));
                if waited >= visibility {
                    return Err(TasqError::invalid_option(
                        "failure_policy",
                        format!(
                            "retry backoff totals {}ms, not below visibility_timeout {}s",
                            waited.as_millis(),
                            self.visibility_timeout
                        ),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// publish 系はキューに触れる前にこれで delay を検証する
pub fn validate_delay_seconds(delay_seconds: u32) -> Result<(), TasqError> {
    if delay_seconds > MAX_DELAY_SECS {
        return Err(TasqError::invalid_option(
            "delay_seconds",
            format!("{delay_seconds} exceeds {MAX_DELAY_SECS}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RetryPolicy;
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        let options = TaskOptions::default();
        assert_eq!(options.max_messages, 1);
        assert_eq!(options.visibility_timeout, 30);
        assert_eq!(options.wait_time_seconds, 20);
        assert_eq!(options.delay_seconds, 0);
        assert!(options.validate().is_ok());
    }

    #[rstest]
    #[case::no_messages(TaskOptions::default().max_messages(0), "max_messages")]
    #[case::too_many_messages(TaskOptions::default().max_messages(11), "max_messages")]
    #[case::long_wait(TaskOptions::default().wait_time_seconds(21), "wait_time_seconds")]
    #[case::long_visibility(TaskOptions::default().visibility_timeout(43_201), "visibility_timeout")]
    #[case::long_delay(TaskOptions::default().delay_seconds(901), "delay_seconds")]
    #[case::nameless_dlq(
        TaskOptions::default().failure_policy(FailurePolicy::dead_letter("")),
        "failure_policy"
    )]
    #[case::retries_outlast_visibility(
        TaskOptions::default().failure_policy(FailurePolicy::retry(
            4,
            RetryPolicy::new(Duration::from_secs(10), 2.0, Duration::from_secs(60)),
        )),
        "failure_policy"
    )]
    #[case::retries_with_zero_visibility(
        TaskOptions::default()
            .visibility_timeout(0)
            .failure_policy(FailurePolicy::retry(2, RetryPolicy::default())),
        "failure_policy"
    )]
    fn out_of_range_options_are_rejected(#[case] options: TaskOptions, #[case] field: &str) {
        let err = options.validate().unwrap_err();
        assert!(matches!(err, TasqError::InvalidOptions { field: f, .. } if f == field));
    }

    #[rstest]
    #[case(TaskOptions::default().max_messages(10).wait_time_seconds(0))]
    #[case(TaskOptions::default().visibility_timeout(0))]
    #[case(TaskOptions::default().delay_seconds(900).wait_time_seconds(20))]
    #[case(TaskOptions::default().failure_policy(FailurePolicy::retry(
        3,
        RetryPolicy::new(Duration::from_millis(100), 2.0, Duration::from_secs(1)),
    )))]
    #[case(TaskOptions::default()
        .visibility_timeout(0)
        .failure_policy(FailurePolicy::retry(1, RetryPolicy::default())))]
    fn boundary_options_are_accepted(#[case] options: TaskOptions) {
        assert!(options.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let options: TaskOptions = serde_json::from_str(r#"{"max_messages": 5}"#).unwrap();
        assert_eq!(options.max_messages, 5);
        assert_eq!(options.wait_time_seconds, 20);
        assert_eq!(options.failure_policy, FailurePolicy::Suppress);
    }
}
