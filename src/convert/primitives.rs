use super::{mismatch, Convertible};
use crate::core::{BindingError, BindingResult};
use crate::value::{ScriptFunction, Value};

/// Integral numbers only; fractional or out-of-range values are rejected
/// instead of truncated.
fn integral_number(value: &Value, min: f64, max: f64) -> Option<f64> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && *n >= min && *n <= max => Some(*n),
        _ => None,
    }
}

fn out_of_range<T: Convertible>(value: &Value) -> BindingError {
    match value {
        Value::Number(n) => BindingError::type_mismatch(T::type_name(), format!("number {n}")),
        Value::BigInt(n) => BindingError::type_mismatch(T::type_name(), format!("bigint {n}")),
        other => mismatch::<T>(other),
    }
}

impl Convertible for i32 {
    fn type_name() -> String {
        "int32".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match integral_number(&value, f64::from(i32::MIN), f64::from(i32::MAX)) {
            Some(n) => Ok(n as i32),
            None => Err(out_of_range::<Self>(&value)),
        }
    }

    fn into_value(self) -> Value {
        Value::Number(f64::from(self))
    }
}

impl Convertible for f64 {
    fn type_name() -> String {
        "double".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Number(self)
    }
}

impl Convertible for f32 {
    fn type_name() -> String {
        "float".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            // 有限值超出 f32 范围时拒绝，不饱和为无穷大
            Value::Number(n) if n.is_finite() && n.abs() > f64::from(f32::MAX) => {
                Err(out_of_range::<Self>(&Value::Number(n)))
            }
            Value::Number(n) => Ok(n as f32),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Number(f64::from(self))
    }
}

impl Convertible for i64 {
    fn type_name() -> String {
        "int64".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::BigInt(n) => i64::try_from(n).map_err(|_| out_of_range::<Self>(&value)),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::BigInt(i128::from(self))
    }
}

impl Convertible for u64 {
    fn type_name() -> String {
        "uint64".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::BigInt(n) => u64::try_from(n).map_err(|_| out_of_range::<Self>(&value)),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::BigInt(i128::from(self))
    }
}

impl Convertible for bool {
    fn type_name() -> String {
        "boolean".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl Convertible for String {
    fn type_name() -> String {
        "string".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl Convertible for () {
    fn type_name() -> String {
        "void".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Undefined => Ok(()),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Undefined
    }
}

impl Convertible for Value {
    fn type_name() -> String {
        "any".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        Ok(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

impl Convertible for ScriptFunction {
    fn type_name() -> String {
        "function".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Function(function) => Ok(function),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Function(self)
    }
}
