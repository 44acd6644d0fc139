//! Parameter binding: named, untyped wire parameters onto typed argument
//! tuples.
//!
//! A request carries `params` as a JSON object. Each registered method
//! declares an ordered list of parameter names matched to its handler's
//! argument types; binding walks that list in declaration order and, per
//! parameter:
//!
//! 1. requires the key to be present ([`BindError::MissingParameter`]),
//! 2. applies direct coercion via [`FromParam`] (bool, string identity,
//!    floats, integers accepting any integral in-range JSON number),
//! 3. for `Vec<T>` applies element-wise coercion via [`SliceElement`],
//!    with the f64 -> u8 range-checked special case,
//! 4. for record types reconstructs through the wire deserializer
//!    (declared with [`record_param!`]),
//! 5. fails with [`BindError::InvalidParameterType`] otherwise.
//!
//! Binding is all-or-nothing: the first failing parameter aborts the whole
//! call and no partial argument tuple ever reaches a handler. Keys in
//! `params` that no declared parameter names are ignored.

use serde_json::Value;
use thiserror::Error;

/// The named-parameter bag of a request.
pub type ParamMap = serde_json::Map<String, Value>;

/// A parameter binding failure. `Display` output becomes the `data` field
/// of the resulting `-32603` response, so it must name the parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A declared parameter is absent from the incoming map.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// The incoming value is not coercible to the declared type.
    #[error("invalid parameter type for: {0}")]
    InvalidParameterType(&'static str),

    /// A slice element is not coercible to the declared element type.
    #[error("invalid element type in slice for parameter {param}: from {from} to {to}")]
    InvalidElementType {
        /// The declared parameter name.
        param: &'static str,
        /// JSON type of the offending element.
        from: &'static str,
        /// Declared element type.
        to: &'static str,
    },

    /// A numeric slice element whose integral value falls outside the
    /// target type's range.
    #[error("value out of range for {target}: {value}")]
    ValueOutOfRange {
        /// Declared element type.
        target: &'static str,
        /// The truncated integral value that failed the range check.
        value: i64,
    },
}

/// JSON type name of a value, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Direct coercion of a single named parameter value.
pub trait FromParam: Sized {
    /// Type name used in binding error messages.
    const EXPECTED: &'static str;

    /// Coerce `value` into `Self`, or fail naming `name`.
    fn from_param(name: &'static str, value: &Value) -> Result<Self, BindError>;
}

/// The integral value of a JSON number, if it has one.
///
/// Wire numbers may arrive as doubles even when the handler declares an
/// integer (JSON has a single number type), so `3.0` binds to an integer
/// target while `3.5` does not.
fn as_integral(value: &Value) -> Option<i128> {
    let n = value.as_number()?;
    if let Some(u) = n.as_u64() {
        Some(i128::from(u))
    } else if let Some(i) = n.as_i64() {
        Some(i128::from(i))
    } else {
        let f = n.as_f64()?;
        (f.is_finite() && f.fract() == 0.0 && f.abs() < 2f64.powi(96)).then(|| f as i128)
    }
}

macro_rules! int_from_param {
    ($($ty:ty),+ $(,)?) => {$(
        impl FromParam for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_param(name: &'static str, value: &Value) -> Result<Self, BindError> {
                as_integral(value)
                    .and_then(|i| <$ty>::try_from(i).ok())
                    .ok_or(BindError::InvalidParameterType(name))
            }
        }
    )+};
}

int_from_param!(u8, u16, u32, u64, i8, i16, i32, i64);

impl FromParam for f64 {
    const EXPECTED: &'static str = "f64";

    fn from_param(name: &'static str, value: &Value) -> Result<Self, BindError> {
        value.as_f64().ok_or(BindError::InvalidParameterType(name))
    }
}

impl FromParam for bool {
    const EXPECTED: &'static str = "bool";

    fn from_param(name: &'static str, value: &Value) -> Result<Self, BindError> {
        value.as_bool().ok_or(BindError::InvalidParameterType(name))
    }
}

impl FromParam for String {
    const EXPECTED: &'static str = "string";

    fn from_param(name: &'static str, value: &Value) -> Result<Self, BindError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or(BindError::InvalidParameterType(name))
    }
}

/// Element-wise coercion inside a declared `Vec<T>` parameter.
///
/// Separate from [`FromParam`] because element failures carry different
/// error shapes: a non-convertible element reports
/// [`BindError::InvalidElementType`], and the f64 -> u8 case reports
/// [`BindError::ValueOutOfRange`] instead of a plain type mismatch.
pub trait SliceElement: Sized {
    /// Element type name used in binding error messages.
    const EXPECTED: &'static str;

    /// Coerce one element of the slice bound to parameter `param`.
    fn from_element(param: &'static str, value: &Value) -> Result<Self, BindError>;
}

impl SliceElement for u8 {
    const EXPECTED: &'static str = "u8";

    // Wire numbers targeting a byte are truncated toward zero and then
    // range-checked: 254.7 binds as 254, 256 and -1 are out of range.
    fn from_element(param: &'static str, value: &Value) -> Result<Self, BindError> {
        let Some(f) = value.as_f64() else {
            return Err(BindError::InvalidElementType {
                param,
                from: json_type_name(value),
                to: <Self as SliceElement>::EXPECTED,
            });
        };
        let truncated = f as i64;
        u8::try_from(truncated).map_err(|_| BindError::ValueOutOfRange {
            target: <Self as SliceElement>::EXPECTED,
            value: truncated,
        })
    }
}

macro_rules! element_via_from_param {
    ($($ty:ty),+ $(,)?) => {$(
        impl SliceElement for $ty {
            const EXPECTED: &'static str = <$ty as FromParam>::EXPECTED;

            fn from_element(param: &'static str, value: &Value) -> Result<Self, BindError> {
                <$ty as FromParam>::from_param(param, value).map_err(|_| {
                    BindError::InvalidElementType {
                        param,
                        from: json_type_name(value),
                        to: <Self as SliceElement>::EXPECTED,
                    }
                })
            }
        }
    )+};
}

element_via_from_param!(u16, i64, f64, String);

impl<T: SliceElement> FromParam for Vec<T> {
    const EXPECTED: &'static str = "array";

    fn from_param(name: &'static str, value: &Value) -> Result<Self, BindError> {
        let items = value
            .as_array()
            .ok_or(BindError::InvalidParameterType(name))?;
        items.iter().map(|v| T::from_element(name, v)).collect()
    }
}

/// Declare structured-record parameter types.
///
/// A record parameter is reconstructed by round-tripping the incoming
/// mapping through the wire deserializer: unknown keys are tolerated and
/// missing fields take their defaults. For that leniency the record type
/// must carry `#[derive(Default)]` and `#[serde(default)]`.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// #[serde(default, rename_all = "camelCase")]
/// struct MountRequest {
///     filename: String,
///     size: u64,
/// }
///
/// kvmlink::record_param!(MountRequest);
/// ```
#[macro_export]
macro_rules! record_param {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::handler::FromParam for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_param(
                name: &'static str,
                value: &::serde_json::Value,
            ) -> ::std::result::Result<Self, $crate::handler::BindError> {
                match value {
                    ::serde_json::Value::Object(_) => ::serde_json::from_value(value.clone())
                        .map_err(|_| $crate::handler::BindError::InvalidParameterType(name)),
                    _ => Err($crate::handler::BindError::InvalidParameterType(name)),
                }
            }
        }
    )+};
}

/// Binding of a whole argument tuple from the parameter map.
///
/// Implemented for tuples of [`FromParam`] types up to arity 3. The
/// `Names` associated type fixes the parameter-name array length to the
/// tuple arity, so a descriptor whose name list does not match its
/// handler's parameter count cannot be registered at all.
pub trait FromParams: Sized {
    /// Ordered parameter names; a fixed-size array matching the arity.
    type Names: AsRef<[&'static str]> + Copy + Send + Sync + 'static;

    /// Bind all declared parameters, in declaration order, first failure
    /// aborting the whole call.
    fn bind(names: &Self::Names, params: &ParamMap) -> Result<Self, BindError>;
}

fn take<T: FromParam>(name: &'static str, params: &ParamMap) -> Result<T, BindError> {
    let value = params
        .get(name)
        .ok_or(BindError::MissingParameter(name))?;
    T::from_param(name, value)
}

impl FromParams for () {
    type Names = [&'static str; 0];

    fn bind(_names: &Self::Names, _params: &ParamMap) -> Result<Self, BindError> {
        Ok(())
    }
}

impl<A: FromParam> FromParams for (A,) {
    type Names = [&'static str; 1];

    fn bind(names: &Self::Names, params: &ParamMap) -> Result<Self, BindError> {
        Ok((take(names[0], params)?,))
    }
}

impl<A: FromParam, B: FromParam> FromParams for (A, B) {
    type Names = [&'static str; 2];

    fn bind(names: &Self::Names, params: &ParamMap) -> Result<Self, BindError> {
        Ok((take(names[0], params)?, take(names[1], params)?))
    }
}

impl<A: FromParam, B: FromParam, C: FromParam> FromParams for (A, B, C) {
    type Names = [&'static str; 3];

    fn bind(names: &Self::Names, params: &ParamMap) -> Result<Self, BindError> {
        Ok((
            take(names[0], params)?,
            take(names[1], params)?,
            take(names[2], params)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    fn params(v: Value) -> ParamMap {
        match v {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_missing_parameter() {
        let p = params(json!({"modifier": 0}));
        let err = <(u8, Vec<u8>)>::bind(&["modifier", "keys"], &p).unwrap_err();

        assert_eq!(err, BindError::MissingParameter("keys"));
        assert!(err.to_string().contains("keys"));
    }

    #[test]
    fn test_first_failure_wins_in_declaration_order() {
        // Both parameters are bad; the error must name the first.
        let p = params(json!({"x": "no", "y": "also no"}));
        let err = <(i64, i64)>::bind(&["x", "y"], &p).unwrap_err();

        assert_eq!(err, BindError::InvalidParameterType("x"));
    }

    #[test]
    fn test_integer_accepts_integral_double() {
        let p = params(json!({"modifier": 3.0}));
        let (m,) = <(u8,)>::bind(&["modifier"], &p).unwrap();
        assert_eq!(m, 3);
    }

    #[test]
    fn test_integer_rejects_fractional_double() {
        let p = params(json!({"modifier": 3.5}));
        let err = <(u8,)>::bind(&["modifier"], &p).unwrap_err();
        assert_eq!(err, BindError::InvalidParameterType("modifier"));
    }

    #[test]
    fn test_scalar_out_of_range_is_type_error() {
        let p = params(json!({"modifier": 300}));
        let err = <(u8,)>::bind(&["modifier"], &p).unwrap_err();
        assert_eq!(err, BindError::InvalidParameterType("modifier"));
    }

    #[test]
    fn test_signed_parameter() {
        let p = params(json!({"wheelY": -3}));
        let (w,) = <(i8,)>::bind(&["wheelY"], &p).unwrap();
        assert_eq!(w, -3);
    }

    #[test]
    fn test_string_identity_only() {
        let p = params(json!({"mode": "cdrom"}));
        let (mode,) = <(String,)>::bind(&["mode"], &p).unwrap();
        assert_eq!(mode, "cdrom");

        let p = params(json!({"mode": 1}));
        let err = <(String,)>::bind(&["mode"], &p).unwrap_err();
        assert_eq!(err, BindError::InvalidParameterType("mode"));
    }

    #[test]
    fn test_byte_slice_boundaries() {
        let p = params(json!({"keys": [0, 4, 255]}));
        let (keys,): (Vec<u8>,) = FromParams::bind(&["keys"], &p).unwrap();
        assert_eq!(keys, vec![0, 4, 255]);

        let p = params(json!({"keys": [1, 2, 300]}));
        let err = <(Vec<u8>,)>::bind(&["keys"], &p).unwrap_err();
        assert_eq!(
            err,
            BindError::ValueOutOfRange {
                target: "u8",
                value: 300
            }
        );

        let p = params(json!({"keys": [-1]}));
        let err = <(Vec<u8>,)>::bind(&["keys"], &p).unwrap_err();
        assert_eq!(
            err,
            BindError::ValueOutOfRange {
                target: "u8",
                value: -1
            }
        );
    }

    #[test]
    fn test_byte_slice_truncates_doubles() {
        let p = params(json!({"keys": [254.7, 255.0]}));
        let (keys,): (Vec<u8>,) = FromParams::bind(&["keys"], &p).unwrap();
        assert_eq!(keys, vec![254, 255]);
    }

    #[test]
    fn test_byte_slice_element_type_error() {
        let p = params(json!({"keys": [1, "x"]}));
        let err = <(Vec<u8>,)>::bind(&["keys"], &p).unwrap_err();

        assert_eq!(
            err,
            BindError::InvalidElementType {
                param: "keys",
                from: "string",
                to: "u8"
            }
        );
    }

    #[test]
    fn test_non_array_for_slice_parameter() {
        let p = params(json!({"keys": "abc"}));
        let err = <(Vec<u8>,)>::bind(&["keys"], &p).unwrap_err();
        assert_eq!(err, BindError::InvalidParameterType("keys"));
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct MountRequest {
        filename: String,
        size: u64,
        read_only: bool,
    }

    record_param!(MountRequest);

    #[test]
    fn test_record_binds_partial_mapping_with_defaults() {
        let p = params(json!({"params": {"filename": "boot.iso"}}));
        let (req,): (MountRequest,) = FromParams::bind(&["params"], &p).unwrap();

        assert_eq!(req.filename, "boot.iso");
        assert_eq!(req.size, 0);
        assert!(!req.read_only);
    }

    #[test]
    fn test_record_tolerates_unknown_keys() {
        let p = params(json!({"params": {"filename": "a", "bogus": 1}}));
        let (req,): (MountRequest,) = FromParams::bind(&["params"], &p).unwrap();
        assert_eq!(req.filename, "a");
    }

    #[test]
    fn test_record_rejects_non_mapping() {
        let p = params(json!({"params": "not a mapping"}));
        let err = <(MountRequest,)>::bind(&["params"], &p).unwrap_err();
        assert_eq!(err, BindError::InvalidParameterType("params"));
    }

    #[test]
    fn test_undeclared_keys_are_ignored() {
        let p = params(json!({"factor": 0.5, "extra": "ignored"}));
        let (f,): (f64,) = FromParams::bind(&["factor"], &p).unwrap();
        assert_eq!(f, 0.5);
    }

    #[test]
    fn test_zero_arity_ignores_params_entirely() {
        let p = params(json!({"anything": 1}));
        <()>::bind(&[], &p).unwrap();
    }

    #[test]
    fn test_three_parameters_in_order() {
        let p = params(json!({"x": 100, "y": 200, "buttons": 1}));
        let (x, y, b): (i64, i64, u8) =
            FromParams::bind(&["x", "y", "buttons"], &p).unwrap();

        assert_eq!((x, y, b), (100, 200, 1));
    }

    #[test]
    fn test_json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!(true)), "bool");
        assert_eq!(json_type_name(&json!(1)), "number");
        assert_eq!(json_type_name(&json!("s")), "string");
        assert_eq!(json_type_name(&json!([])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }
}
