//! Handler module - typed method adapters, binding, and the registry.
//!
//! Provides:
//! - [`Handler`] - the capability a registered callable must satisfy
//! - [`FromParam`]/[`FromParams`] - wire-value to argument coercion
//! - [`IntoOutcome`] - normalization of handler return shapes
//! - [`MethodRegistry`] - maps method names to erased adapters
//!
//! # Example
//!
//! ```
//! use kvmlink::handler::{MethodError, MethodRegistry};
//!
//! struct Ctx;
//!
//! fn ping(_ctx: &Ctx) -> Result<&'static str, MethodError> {
//!     Ok("pong")
//! }
//!
//! fn keyboard_report(_ctx: &Ctx, modifier: u8, keys: Vec<u8>) -> Result<(), MethodError> {
//!     let _ = (modifier, keys);
//!     Ok(())
//! }
//!
//! let mut registry = MethodRegistry::new();
//! registry.register("ping", [], ping);
//! registry.register("keyboardReport", ["modifier", "keys"], keyboard_report);
//! assert!(registry.lookup("ping").is_some());
//! ```

mod params;
mod registry;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use params::{
    json_type_name, BindError, FromParam, FromParams, ParamMap, SliceElement,
};
pub use registry::{ErasedMethod, MethodRegistry};

/// A failure reported by a handler itself (a business error, not a
/// protocol fault). Its message travels verbatim in the response's
/// `error.data` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MethodError {
    message: String,
}

impl MethodError {
    /// Create a handler error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The handler's message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for MethodError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for MethodError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Why a looked-up method failed to produce a success value.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The parameter bag could not be bound to the handler's arguments.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The handler ran and reported failure.
    #[error(transparent)]
    Method(#[from] MethodError),

    /// The handler's success value could not be serialized. Unreportable
    /// to the client; the dispatcher logs it and drops the message.
    #[error("failed to encode handler result: {0}")]
    Encode(serde_json::Error),
}

/// Normalization of handler return shapes into one adapter result.
///
/// The original return-arity contract (zero values, a lone optional
/// error, or a value-plus-optional-error pair) maps onto Rust types:
///
/// - `()` - nothing returned, result is `null`
/// - `Result<(), MethodError>` - error-only: `Ok` means result `null`
/// - `Result<T, MethodError>` - value or error; an error discards the value
///
/// Any other return type is rejected by the compiler at registration,
/// so a malformed return shape cannot exist at runtime.
pub trait IntoOutcome {
    /// Produce the normalized outcome.
    fn into_outcome(self) -> Result<Value, DispatchError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<Value, DispatchError> {
        Ok(Value::Null)
    }
}

impl<T: Serialize> IntoOutcome for Result<T, MethodError> {
    fn into_outcome(self) -> Result<Value, DispatchError> {
        match self {
            Ok(value) => serde_json::to_value(value).map_err(DispatchError::Encode),
            Err(e) => Err(DispatchError::Method(e)),
        }
    }
}

/// The capability a registered callable must satisfy.
///
/// Implemented for plain functions and closures taking a shared context
/// reference followed by zero to three [`FromParam`] arguments, returning
/// any [`IntoOutcome`] shape. `Args` is the bound argument tuple.
pub trait Handler<C, Args>: Send + Sync + 'static {
    /// The handler's declared return shape.
    type Out: IntoOutcome;

    /// Invoke with an already-bound argument tuple.
    fn call(&self, ctx: &C, args: Args) -> Self::Out;
}

impl<C, F, R> Handler<C, ()> for F
where
    F: Fn(&C) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    type Out = R;

    fn call(&self, ctx: &C, _args: ()) -> R {
        self(ctx)
    }
}

impl<C, F, A, R> Handler<C, (A,)> for F
where
    F: Fn(&C, A) -> R + Send + Sync + 'static,
    A: FromParam,
    R: IntoOutcome,
{
    type Out = R;

    fn call(&self, ctx: &C, (a,): (A,)) -> R {
        self(ctx, a)
    }
}

impl<C, F, A, B, R> Handler<C, (A, B)> for F
where
    F: Fn(&C, A, B) -> R + Send + Sync + 'static,
    A: FromParam,
    B: FromParam,
    R: IntoOutcome,
{
    type Out = R;

    fn call(&self, ctx: &C, (a, b): (A, B)) -> R {
        self(ctx, a, b)
    }
}

impl<C, F, A, B, D, R> Handler<C, (A, B, D)> for F
where
    F: Fn(&C, A, B, D) -> R + Send + Sync + 'static,
    A: FromParam,
    B: FromParam,
    D: FromParam,
    R: IntoOutcome,
{
    type Out = R;

    fn call(&self, ctx: &C, (a, b, d): (A, B, D)) -> R {
        self(ctx, a, b, d)
    }
}
