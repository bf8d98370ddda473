//! Handler traits - メッセージを処理するハンドラーの定義
//!
//! # 二種類のハンドラー
//! - `MessageHandler`: 受信メッセージをそのまま受け取る（非 lazy）
//! - `LazyHandler`: envelope を展開した `args` / `kwargs` を受け取る（lazy）
//!
//! どちらを登録したかで Task の lazy モードが決まるので、
//! 「lazy フラグとハンドラーの形が食い違う」状態は作れません。
//!
//! # 型付き API
//! `Handler<T: TaskCall>` を `TypedHandler<T, H>` で包むと `LazyHandler` として
//! 登録できます（type erasure）。

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::codec::decode_call;
use super::task::TaskCall;
use crate::domain::{CodecError, Envelope, HandlerError, ReceivedMessage};

/// MessageHandler は受信したメッセージをそのまま処理
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: ReceivedMessage) -> Result<(), HandlerError>;
}

/// LazyHandler は再適用された呼び出し（位置引数 `args` と名前付き `kwargs`）を処理
#[async_trait]
pub trait LazyHandler: Send + Sync {
    async fn call(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<(), HandlerError>;
}

/// Handler は `TaskCall` を受け取る型付きハンドラー
///
/// ```ignore
/// struct SendEmailHandler;
///
/// #[async_trait]
/// impl Handler<SendEmail> for SendEmailHandler {
///     async fn handle(&self, call: SendEmail) -> Result<(), HandlerError> {
///         mailer::send(&call.to, &call.subject).await.map_err(|e| HandlerError::with_source("smtp", e))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: TaskCall>: Send + Sync {
    async fn handle(&self, call: T) -> Result<(), HandlerError>;
}

/// TypedHandler は envelope を `T` に bind して `Handler<T>` を `LazyHandler` に型消去
pub struct TypedHandler<T: TaskCall, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TaskCall, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TaskCall, H: Handler<T>> LazyHandler for TypedHandler<T, H> {
    async fn call(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<(), HandlerError> {
        let call: T = decode_call(Envelope::from_parts(args, kwargs))?;
        self.handler.handle(call).await
    }
}

/// クロージャを `MessageHandler` として使うアダプタ
pub struct MessageFn<F>(F);

pub fn message_fn<F, Fut>(f: F) -> MessageFn<F>
where
    F: Fn(ReceivedMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    MessageFn(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for MessageFn<F>
where
    F: Fn(ReceivedMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, message: ReceivedMessage) -> Result<(), HandlerError> {
        (self.0)(message).await
    }
}

/// クロージャを `LazyHandler` として使うアダプタ
pub struct LazyFn<F>(F);

pub fn lazy_fn<F, Fut>(f: F) -> LazyFn<F>
where
    F: Fn(Vec<Value>, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    LazyFn(f)
}

#[async_trait]
impl<F, Fut> LazyHandler for LazyFn<F>
where
    F: Fn(Vec<Value>, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn call(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<(), HandlerError> {
        (self.0)(args, kwargs).await
    }
}

/// Invocation はハンドラーに渡す入力
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// 非 lazy タスク: 受信メッセージそのもの
    Message(ReceivedMessage),
    /// lazy タスク: decode 済みの envelope
    Call(Envelope),
}

/// TaskHandler は Task が持つハンドラー。variant がそのままタスクのモード
#[derive(Clone)]
pub enum TaskHandler {
    Message(Arc<dyn MessageHandler>),
    Lazy(Arc<dyn LazyHandler>),
}

impl TaskHandler {
    pub fn message<H: MessageHandler + 'static>(handler: H) -> Self {
        Self::Message(Arc::new(handler))
    }

    pub fn lazy<H: LazyHandler + 'static>(handler: H) -> Self {
        Self::Lazy(Arc::new(handler))
    }

    pub fn typed<T: TaskCall, H: Handler<T> + 'static>(handler: H) -> Self {
        Self::lazy(TypedHandler::<T, H>::new(handler))
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    pub fn accepts(&self, invocation: &Invocation) -> bool {
        matches!(
            (self, invocation),
            (Self::Message(_), Invocation::Message(_)) | (Self::Lazy(_), Invocation::Call(_))
        )
    }

    /// 受信メッセージから Invocation を作る
    /// （非 lazy はそのまま、lazy は envelope を decode）
    pub fn prepare(&self, message: ReceivedMessage) -> Result<Invocation, CodecError> {
        match self {
            Self::Message(_) => Ok(Invocation::Message(message)),
            Self::Lazy(_) => Envelope::decode(message.body()).map(Invocation::Call),
        }
    }

    pub async fn invoke(&self, invocation: Invocation) -> Result<(), HandlerError> {
        match (self, invocation) {
            (Self::Message(handler), Invocation::Message(message)) => handler.handle(message).await,
            (Self::Lazy(handler), Invocation::Call(envelope)) => {
                let (args, kwargs) = envelope.into_parts();
                handler.call(args, kwargs).await
            }
            (Self::Message(_), Invocation::Call(_)) => Err(HandlerError::new(
                "message handler cannot take an argument envelope",
            )),
            (Self::Lazy(_), Invocation::Message(_)) => Err(HandlerError::new(
                "lazy handler cannot take a raw message",
            )),
        }
    }
}

impl std::fmt::Debug for TaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(_) => f.write_str("TaskHandler::Message"),
            Self::Lazy(_) => f.write_str("TaskHandler::Lazy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReceiptHandle;
    use crate::typed::task::tests::Greeting;
    use serde_json::json;
    use std::sync::Mutex;

    struct GreetingHandler {
        seen: Mutex<Vec<Greeting>>,
    }

    #[async_trait]
    impl Handler<Greeting> for GreetingHandler {
        async fn handle(&self, call: Greeting) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(call);
            Ok(())
        }
    }

    #[tokio::test]
    async fn typed_handler_binds_kwargs() {
        let handler = GreetingHandler {
            seen: Mutex::new(vec![]),
        };
        let typed = TypedHandler::<Greeting, _>::new(handler);

        let envelope = Envelope::new().with_kwarg("name", "ada").with_kwarg("times", 2);
        let (args, kwargs) = envelope.into_parts();
        typed.call(args, kwargs).await.unwrap();

        let seen = typed.handler.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![Greeting {
                name: "ada".into(),
                times: 2
            }]
        );
    }

    #[tokio::test]
    async fn typed_handler_reports_binding_failure() {
        let typed = TypedHandler::<Greeting, _>::new(GreetingHandler {
            seen: Mutex::new(vec![]),
        });
        let err = typed
            .call(vec![], Map::from_iter([("name".to_string(), json!(42))]))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "argument binding failed");
    }

    #[tokio::test]
    async fn lazy_strategy_decodes_body() {
        let handler = TaskHandler::lazy(lazy_fn(|args, kwargs| async move {
            assert_eq!(args, vec![json!("hello")]);
            assert!(kwargs.is_empty());
            Ok::<(), HandlerError>(())
        }));
        let message = ReceivedMessage::new(
            r#"{"args":["hello"],"kwargs":{}}"#,
            ReceiptHandle::new("rh"),
        );
        let invocation = handler.prepare(message).unwrap();
        assert!(handler.accepts(&invocation));
        handler.invoke(invocation).await.unwrap();
    }

    #[tokio::test]
    async fn message_strategy_passes_message_through() {
        let handler = TaskHandler::message(message_fn(|message: ReceivedMessage| async move {
            assert_eq!(message.body(), "not json at all");
            assert_eq!(message.receipt_handle().as_str(), "rh-7");
            Ok::<(), HandlerError>(())
        }));
        let message = ReceivedMessage::new("not json at all", ReceiptHandle::new("rh-7"));
        let invocation = handler.prepare(message.clone()).unwrap();
        assert_eq!(invocation, Invocation::Message(message));
        handler.invoke(invocation).await.unwrap();
    }

    #[test]
    fn lazy_strategy_rejects_non_envelope_body() {
        let handler = TaskHandler::lazy(lazy_fn(|_, _| async { Ok::<(), HandlerError>(()) }));
        let message = ReceivedMessage::new("plain", ReceiptHandle::new("rh"));
        assert!(matches!(handler.prepare(message), Err(CodecError::Decode(_))));
    }

    #[tokio::test]
    async fn mismatched_invocation_is_an_error() {
        let handler = TaskHandler::message(message_fn(|_| async { Ok::<(), HandlerError>(()) }));
        let invocation = Invocation::Call(Envelope::new());
        assert!(!handler.accepts(&invocation));
        assert!(handler.invoke(invocation).await.is_err());
    }
}
