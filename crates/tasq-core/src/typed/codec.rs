//! Typed call <-> Envelope mapping.
//!
//! # encode
//! - object -> `kwargs`
//! - array -> `args`
//! - null -> empty envelope
//! - other scalar -> single positional argument
//!
//! # decode
//! args-only or kwargs-only envelopes bind; a mix of both cannot be mapped
//! onto a single Rust value and is rejected.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{CodecError, Envelope};

pub fn encode_call<T: Serialize>(call: &T) -> Result<Envelope, CodecError> {
    let value = serde_json::to_value(call).map_err(CodecError::Encode)?;
    Ok(match value {
        Value::Object(kwargs) => Envelope::from_parts(Vec::new(), kwargs),
        Value::Array(args) => Envelope::from_parts(args, Default::default()),
        Value::Null => Envelope::new(),
        scalar => Envelope::new().with_arg(scalar),
    })
}

pub fn decode_call<T: DeserializeOwned>(envelope: Envelope) -> Result<T, CodecError> {
    let (args, kwargs) = envelope.into_parts();
    let bind = |e: serde_json::Error| CodecError::Bind(e.to_string());

    match (args.is_empty(), kwargs.is_empty()) {
        (true, true) => T::deserialize(Value::Null)
            .or_else(|_| serde_json::from_value(Value::Object(kwargs)))
            .map_err(bind),
        (true, false) => serde_json::from_value(Value::Object(kwargs)).map_err(bind),
        (false, true) => {
            if let [only] = args.as_slice() {
                if let Ok(call) = T::deserialize(only) {
                    return Ok(call);
                }
                // a one-element tuple still binds from the array form below
            }
            serde_json::from_value(Value::Array(args)).map_err(bind)
        }
        (false, false) => Err(CodecError::Bind(format!(
            "{} positional and {} keyword arguments cannot bind to one value",
            args.len(),
            kwargs.len()
        ))),
    }
}
