//! Method registry for dispatching requests by name.
//!
//! The registry maps method names to erased, typed adapters. It is built
//! once at startup from the device layer's registration table and never
//! mutated afterwards, so lookups need no locking.
//!
//! # Example
//!
//! ```
//! use kvmlink::handler::{MethodError, MethodRegistry};
//!
//! struct Ctx;
//!
//! fn set_factor(_ctx: &Ctx, factor: f64) -> Result<(), MethodError> {
//!     let _ = factor;
//!     Ok(())
//! }
//!
//! let mut registry = MethodRegistry::new();
//! registry.register("setStreamQualityFactor", ["factor"], set_factor);
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;

use serde_json::Value;

use super::params::{FromParams, ParamMap};
use super::{DispatchError, Handler, IntoOutcome};

/// Object-safe view of a registered method: bind arguments, invoke,
/// shape the result.
pub trait ErasedMethod<C>: Send + Sync {
    /// Bind `params` onto the handler's arguments and invoke it.
    fn invoke(&self, ctx: &C, params: &ParamMap) -> Result<Value, DispatchError>;
}

/// Adapter pairing one handler with its declared parameter names.
struct MethodAdapter<H, Args: FromParams> {
    handler: H,
    names: Args::Names,
    _args: PhantomData<fn(Args)>,
}

impl<C, H, Args> ErasedMethod<C> for MethodAdapter<H, Args>
where
    Args: FromParams,
    H: Handler<C, Args>,
{
    fn invoke(&self, ctx: &C, params: &ParamMap) -> Result<Value, DispatchError> {
        let args = Args::bind(&self.names, params)?;
        self.handler.call(ctx, args).into_outcome()
    }
}

/// Entry for a registered method.
struct MethodEntry<C> {
    /// The erased adapter.
    adapter: Box<dyn ErasedMethod<C>>,
    /// Declared parameter names, kept for introspection.
    params: Vec<&'static str>,
}

/// Registry mapping method names to handlers, generic over the context
/// type passed to every handler call.
pub struct MethodRegistry<C> {
    methods: HashMap<&'static str, MethodEntry<C>>,
}

impl<C> MethodRegistry<C> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register a method handler.
    ///
    /// `params` is the ordered parameter-name list; its length is tied to
    /// the handler's argument tuple in the type system, so an arity
    /// mismatch does not compile.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered. Registration happens once
    /// at startup; a duplicate is a defect in the registration table, not
    /// a runtime condition.
    pub fn register<Args, H>(&mut self, name: &'static str, params: Args::Names, handler: H)
    where
        Args: FromParams + 'static,
        H: Handler<C, Args>,
    {
        assert!(
            !self.methods.contains_key(name),
            "duplicate method registration: {name}"
        );

        let recorded = params.as_ref().to_vec();
        self.methods.insert(
            name,
            MethodEntry {
                adapter: Box::new(MethodAdapter::<H, Args> {
                    handler,
                    names: params,
                    _args: PhantomData,
                }),
                params: recorded,
            },
        );
    }

    /// Look up a method by name.
    pub fn lookup(&self, name: &str) -> Option<&dyn ErasedMethod<C>> {
        self.methods.get(name).map(|e| e.adapter.as_ref())
    }

    /// Declared parameter names of a method, if registered.
    pub fn param_names(&self, name: &str) -> Option<&[&'static str]> {
        self.methods.get(name).map(|e| e.params.as_slice())
    }

    /// Whether a method is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered method names, unordered.
    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }
}

impl<C> Default for MethodRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BindError, MethodError};
    use serde_json::json;

    struct Ctx;

    fn ping(_ctx: &Ctx) -> Result<&'static str, MethodError> {
        Ok("pong")
    }

    fn echo_sum(_ctx: &Ctx, a: i64, b: i64) -> Result<i64, MethodError> {
        Ok(a + b)
    }

    fn always_fails(_ctx: &Ctx) -> Result<(), MethodError> {
        Err(MethodError::new("device unavailable"))
    }

    fn as_map(v: serde_json::Value) -> ParamMap {
        match v {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = MethodRegistry::new();
        registry.register("ping", [], ping);

        assert!(registry.lookup("ping").is_some());
        assert!(registry.lookup("Ping").is_none()); // case-sensitive
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invoke_through_erased_adapter() {
        let mut registry = MethodRegistry::new();
        registry.register("sum", ["a", "b"], echo_sum);

        let params = as_map(json!({"a": 2, "b": 40}));
        let result = registry
            .lookup("sum")
            .unwrap()
            .invoke(&Ctx, &params)
            .unwrap();

        assert_eq!(result, json!(42));
    }

    #[test]
    fn test_invoke_surfaces_bind_error() {
        let mut registry = MethodRegistry::new();
        registry.register("sum", ["a", "b"], echo_sum);

        let params = as_map(json!({"a": 2}));
        let err = registry
            .lookup("sum")
            .unwrap()
            .invoke(&Ctx, &params)
            .unwrap_err();

        match err {
            DispatchError::Bind(e) => assert_eq!(e, BindError::MissingParameter("b")),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[test]
    fn test_invoke_surfaces_method_error() {
        let mut registry = MethodRegistry::new();
        registry.register("fail", [], always_fails);

        let err = registry
            .lookup("fail")
            .unwrap()
            .invoke(&Ctx, &ParamMap::new())
            .unwrap_err();

        match err {
            DispatchError::Method(e) => assert_eq!(e.message(), "device unavailable"),
            other => panic!("expected method error, got {other:?}"),
        }
    }

    #[test]
    fn test_param_names_recorded() {
        let mut registry = MethodRegistry::new();
        registry.register("sum", ["a", "b"], echo_sum);

        assert_eq!(registry.param_names("sum"), Some(&["a", "b"][..]));
        assert_eq!(registry.param_names("ping"), None);
    }

    #[test]
    #[should_panic(expected = "duplicate method registration: ping")]
    fn test_duplicate_registration_panics() {
        let mut registry = MethodRegistry::new();
        registry.register("ping", [], ping);
        registry.register("ping", [], ping);
    }
}
