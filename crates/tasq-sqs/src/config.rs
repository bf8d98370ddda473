//! SqsConfig - SQS クライアントの接続設定
//!
//! 全部省略可能。省略したものは AWS SDK の既定チェーン
//! （環境変数・プロファイル・IMDS など）に任せます。
//!
//! | 変数 | フィールド |
//! |------|-----------|
//! | `AWS_REGION` / `AWS_DEFAULT_REGION` | `region` |
//! | `TASQ_SQS_ENDPOINT_URL` | `endpoint_url`（LocalStack / ElasticMQ 向け） |
//! | `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN` | 静的クレデンシャル |
//! | `TASQ_SQS_MAX_ATTEMPTS` | SDK のリトライ回数 |

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqsConfig {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// RPC 1 回あたりの試行回数（初回を含む、SDK のリトライ層が担当）
    pub max_attempts: u32,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SqsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let max_attempts = match var("TASQ_SQS_MAX_ATTEMPTS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(variable = "TASQ_SQS_MAX_ATTEMPTS", value = %raw, "ignoring unparsable config value");
                DEFAULT_MAX_ATTEMPTS
            }),
            None => DEFAULT_MAX_ATTEMPTS,
        };

        Self {
            region: var("AWS_REGION").or_else(|| var("AWS_DEFAULT_REGION")),
            endpoint_url: var("TASQ_SQS_ENDPOINT_URL"),
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            session_token: var("AWS_SESSION_TOKEN"),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_static_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// 静的キーペアが両方そろっていれば返す
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

// secret は出さない
impl std::fmt::Debug for SqsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsConfig")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}
