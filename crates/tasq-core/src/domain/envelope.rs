//! Envelope - lazy モードのペイロード
//!
//! `trigger(...)` の引数をそのままメッセージ本文に詰めて、受信側で
//! ハンドラーに再適用します。
//!
//! # ワイヤ形式
//! ```json
//! {"args": [...], "kwargs": {...}}
//! ```
//! 両方のキーが必須です（片方でも欠けていれば decode エラー）。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::CodecError;

/// Envelope は後でハンドラーに渡す位置引数と名前付き引数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// 位置引数を追加
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// 名前付き引数を設定（同名は後勝ち）
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    pub fn encode(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Encode)
    }

    pub fn decode(body: &str) -> Result<Self, CodecError> {
        serde_json::from_str(body).map_err(CodecError::Decode)
    }

    /// `index` 番目の位置引数を `T` として decode
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, CodecError> {
        let value = self
            .args
            .get(index)
            .ok_or_else(|| CodecError::Bind(format!("missing positional argument {index}")))?;
        T::deserialize(value)
            .map_err(|e| CodecError::Bind(format!("positional argument {index}: {e}")))
    }

    /// 名前付き引数 `name` を `T` として decode
    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<T, CodecError> {
        let value = self
            .kwargs
            .get(name)
            .ok_or_else(|| CodecError::Bind(format!("missing keyword argument `{name}`")))?;
        T::deserialize(value).map_err(|e| CodecError::Bind(format!("keyword argument `{name}`: {e}")))
    }

    pub fn into_parts(self) -> (Vec<Value>, Map<String, Value>) {
        (self.args, self.kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_format_has_both_keys() {
        let body = Envelope::new().encode().unwrap();
        assert_eq!(body, r#"{"args":[],"kwargs":{}}"#);
    }

    #[test]
    fn mixed_arguments_survive_the_wire() {
        let envelope = Envelope::new()
            .with_arg("hello")
            .with_arg(json!({"nested": [1, 2.5, null, true]}))
            .with_kwarg("abc", 1)
            .with_kwarg("unicode", "こんにちは \u{1F600}");

        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.args[0], json!("hello"));
        assert_eq!(decoded.kwargs["abc"], json!(1));
    }

    #[test]
    fn foreign_bodies_are_reencoded_verbatim() {
        // 他の producer が書いた本文: u64 を超える整数、ソートされていないキー
        let bodies = [
            r#"{"args":[123456789012345678901234567890,-98765432109876543210],"kwargs":{}}"#,
            r#"{"args":[{"b":1,"a":2}],"kwargs":{"z":1,"y":2}}"#,
            r#"{"args":[0.1,-0.0],"kwargs":{"ratio":3.141592653589793238462643383279}}"#,
        ];
        for body in bodies {
            let envelope = Envelope::decode(body).unwrap();
            assert_eq!(envelope.encode().unwrap(), body);
        }

        let envelope = Envelope::decode(bodies[1]).unwrap();
        let keys: Vec<&str> = envelope.kwargs.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "y"]);
    }

    #[test]
    fn decode_rejects_missing_keys_and_garbage() {
        assert!(matches!(
            Envelope::decode(r#"{"args": []}"#),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            Envelope::decode(r#"{"kwargs": {}}"#),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            Envelope::decode("plain text"),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn typed_accessors() {
        let envelope = Envelope::new().with_arg(7).with_kwarg("name", "ada");
        assert_eq!(envelope.arg::<u32>(0).unwrap(), 7);
        assert_eq!(envelope.kwarg::<String>("name").unwrap(), "ada");
        assert!(matches!(envelope.arg::<u32>(1), Err(CodecError::Bind(_))));
        assert!(matches!(envelope.kwarg::<u32>("name"), Err(CodecError::Bind(_))));
    }
}
