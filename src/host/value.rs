//! Host-side values and the conversions between them and WebAssembly values.

use super::bigint::{parse_digits, split_radix_prefix, to_host64, to_native64, trim_host_whitespace};
use super::module::WasmModule;
use super::HostError;
use crate::parser::module::ValueType;
use crate::runtime::Value;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::fmt;
use std::sync::Arc;

/// A dynamically typed host value.
///
/// `Number` is the finite-precision numeric type and `BigInt` the
/// arbitrary-precision integer type; the two never convert implicitly at the
/// 64-bit boundary.
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(BigInt),
    String(String),
    /// A symbol with an optional description
    Symbol(Option<String>),
    /// A plain object; properties in insertion order
    Object(Vec<(String, HostValue)>),
    Array(Vec<HostValue>),
    /// A compiled module handle, the only value accepted by reflection
    Module(Arc<WasmModule>),
    /// The module type itself
    ModuleConstructor,
    /// The prototype object of the module type
    ModulePrototype,
}

impl HostValue {
    pub fn bigint(value: impl Into<BigInt>) -> HostValue {
        HostValue::BigInt(value.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Boolean(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::BigInt(_) => "bigint",
            HostValue::String(_) => "string",
            HostValue::Symbol(_) => "symbol",
            HostValue::Object(_) => "object",
            HostValue::Array(_) => "array",
            HostValue::Module(_) => "WebAssembly.Module",
            HostValue::ModuleConstructor => "function",
            HostValue::ModulePrototype => "object",
        }
    }

    /// Property lookup on a plain object.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            HostValue::Object(properties) => properties.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (ModuleConstructor, ModuleConstructor) | (ModulePrototype, ModulePrototype) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (BigInt(a), BigInt(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Module(a), Module(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Null => write!(f, "null"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Number(n) => write!(f, "{}", n),
            HostValue::BigInt(n) => write!(f, "{}n", n),
            HostValue::String(s) => write!(f, "{:?}", s),
            HostValue::Symbol(Some(d)) => write!(f, "Symbol({})", d),
            HostValue::Symbol(None) => write!(f, "Symbol()"),
            HostValue::Object(properties) => {
                let body: Vec<std::string::String> =
                    properties.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", body.join(", "))
            }
            HostValue::Array(items) => {
                let body: Vec<std::string::String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", body.join(", "))
            }
            HostValue::Module(_) => write!(f, "[object WebAssembly.Module]"),
            HostValue::ModuleConstructor => write!(f, "WebAssembly.Module"),
            HostValue::ModulePrototype => write!(f, "WebAssembly.Module.prototype"),
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<BigInt> for HostValue {
    fn from(n: BigInt) -> Self {
        HostValue::BigInt(n)
    }
}

impl From<Arc<WasmModule>> for HostValue {
    fn from(module: Arc<WasmModule>) -> Self {
        HostValue::Module(module)
    }
}

/// Host number coercion. BigInts and symbols are refused; objects become NaN.
pub fn to_number(value: &HostValue) -> Result<f64, HostError> {
    match value {
        HostValue::Undefined => Ok(f64::NAN),
        HostValue::Null => Ok(0.0),
        HostValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        HostValue::Number(n) => Ok(*n),
        HostValue::String(s) => Ok(string_to_number(s)),
        HostValue::BigInt(_) | HostValue::Symbol(_) => Err(HostError::TypeConversion(format!(
            "cannot convert a {} to a number",
            value.type_name()
        ))),
        _ => Ok(f64::NAN),
    }
}

/// String-to-number with the host grammar: radix prefixes are unsigned,
/// `Infinity` is the only spelling of infinity, and anything else that is not
/// a plain decimal literal is NaN.
fn string_to_number(text: &str) -> f64 {
    let text = trim_host_whitespace(text);
    if text.is_empty() {
        return 0.0;
    }
    if let Some((digits, radix)) = split_radix_prefix(text) {
        return parse_digits(digits, radix)
            .and_then(|n| n.to_f64())
            .unwrap_or(f64::NAN);
    }

    let (sign, unsigned) = match text.as_bytes()[0] {
        b'-' => (-1.0, &text[1..]),
        b'+' => (1.0, &text[1..]),
        _ => (1.0, text),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    if !is_decimal_literal(unsigned) {
        return f64::NAN;
    }
    unsigned.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

/// `digits [. digits] [e [sign] digits]` with at least one mantissa digit.
fn is_decimal_literal(text: &str) -> bool {
    let (mantissa, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
        Some(at) => (&text[..at], Some(&text[at + 1..])),
        None => (text, None),
    };

    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if whole.len() + fraction.len() == 0 || !all_digits(whole) || !all_digits(fraction) {
        return false;
    }

    match exponent {
        None => true,
        Some(exponent) => {
            let digits = exponent.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(exponent);
            !digits.is_empty() && all_digits(digits)
        }
    }
}

/// Wrap a number into the signed 32-bit range, modulo 2^32.
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc().rem_euclid(4294967296.0);
    if wrapped >= 2147483648.0 {
        (wrapped - 4294967296.0) as i32
    } else {
        wrapped as i32
    }
}

/// Convert a host value into a WebAssembly value of `value_type`.
pub fn to_wasm_value(value: &HostValue, value_type: ValueType) -> Result<Value, HostError> {
    match value_type {
        ValueType::I32 => Ok(Value::I32(to_int32(to_number(value)?))),
        ValueType::I64 => Ok(Value::I64(to_native64(value)?)),
        ValueType::F32 => Ok(Value::F32(to_number(value)? as f32)),
        ValueType::F64 => Ok(Value::F64(to_number(value)?)),
        other => Err(HostError::TypeConversion(format!(
            "{} values cannot cross the host boundary",
            other
        ))),
    }
}

/// Convert a WebAssembly value into a host value. Never fails.
pub fn to_host_value(value: Value) -> HostValue {
    match value {
        Value::I32(v) => HostValue::Number(v as f64),
        Value::I64(v) => to_host64(v),
        Value::F32(v) => HostValue::Number(v as f64),
        Value::F64(v) => HostValue::Number(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_to_int32() {
        assert_eq!(to_int32(1.9), 1);
        assert_eq!(to_int32(-1.9), -1);
        assert_eq!(to_int32(2147483648.0), i32::MIN);
        assert_eq!(to_int32(4294967297.0), 1);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn test_to_number() {
        assert!(to_number(&HostValue::Undefined).unwrap().is_nan());
        assert_eq!(to_number(&HostValue::Null).unwrap(), 0.0);
        assert_eq!(to_number(&HostValue::from(" 7 ")).unwrap(), 7.0);
        assert!(to_number(&HostValue::bigint(1)).is_err());
    }

    #[rstest]
    #[case("", 0.0)]
    #[case("\u{feff}7", 7.0)]
    #[case("0x10", 16.0)]
    #[case("0b11", 3.0)]
    #[case("0O17", 15.0)]
    #[case("1e3", 1000.0)]
    #[case("-2.5E-1", -0.25)]
    #[case(".5", 0.5)]
    #[case("5.", 5.0)]
    #[case("+12", 12.0)]
    #[case("Infinity", f64::INFINITY)]
    #[case("-Infinity", f64::NEG_INFINITY)]
    fn test_string_to_number(#[case] text: &str, #[case] expected: f64) {
        assert_eq!(to_number(&HostValue::from(text)).unwrap(), expected);
    }

    #[rstest]
    #[case("inf")]
    #[case("infinity")]
    #[case("nan")]
    #[case("NaN")]
    #[case("-0x10")]
    #[case("0x")]
    #[case(".")]
    #[case("1e")]
    #[case("1_000")]
    #[case("-")]
    fn test_string_to_number_nan(#[case] text: &str) {
        assert!(to_number(&HostValue::from(text)).unwrap().is_nan(), "{text}");
    }

    #[test]
    fn test_to_wasm_value() {
        assert_eq!(to_wasm_value(&HostValue::from(7.0), ValueType::I32).unwrap(), Value::I32(7));
        assert_eq!(
            to_wasm_value(&HostValue::bigint(-1), ValueType::I64).unwrap(),
            Value::I64(-1)
        );
        assert_eq!(to_wasm_value(&HostValue::from(1.2), ValueType::F64).unwrap(), Value::F64(1.2));
        assert!(matches!(
            to_wasm_value(&HostValue::from(5.0), ValueType::I64),
            Err(HostError::TypeConversion(_))
        ));
        assert!(matches!(
            to_wasm_value(&HostValue::Null, ValueType::V128),
            Err(HostError::TypeConversion(_))
        ));
    }

    #[test]
    fn test_to_host_value() {
        assert_eq!(to_host_value(Value::I32(-1)), HostValue::Number(-1.0));
        assert_eq!(to_host_value(Value::I64(i64::MIN)), HostValue::bigint(i64::MIN));
    }

    #[test]
    fn test_object_get() {
        let object = HostValue::Object(vec![("a".to_string(), HostValue::Null)]);
        assert_eq!(object.get("a"), Some(&HostValue::Null));
        assert_eq!(object.get("b"), None);
        assert_eq!(HostValue::Null.get("a"), None);
    }
}
