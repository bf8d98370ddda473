//! Typed - ハンドラーと型付き Task API
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskCall` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `MessageHandler` / `LazyHandler` trait - object-safe, type erasure

pub mod codec;
pub mod handler;
pub mod task;

pub use self::codec::{decode_call, encode_call};
pub use self::handler::{
    Handler, Invocation, LazyFn, LazyHandler, MessageFn, MessageHandler, TaskHandler,
    TypedHandler, lazy_fn, message_fn,
};
pub use self::task::{TaskCall, TypedTask};
