//! Domain model (ids, addresses, messages, envelope, options, policies, errors).

pub mod address;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod message;
pub mod options;
pub mod policy;
pub mod state;

pub use self::address::QueueAddress;
pub use self::envelope::Envelope;
pub use self::errors::{CodecError, ErrorKind, HandlerError, TasqError};
pub use self::ids::TaskId;
pub use self::message::{MessageId, ReceiptHandle, ReceivedMessage};
pub use self::options::{TaskOptions, validate_delay_seconds};
pub use self::policy::{FailurePolicy, RetryPolicy};
pub use self::state::TaskState;
