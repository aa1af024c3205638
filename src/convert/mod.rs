//! Type Marshaling
//!
//! Bidirectional conversion between [`Value`] and statically-typed native
//! values. Every marshaled type implements [`Convertible`]; a bound method
//! whose parameter or return type has no implementation does not compile, so
//! an unsupported type can never reach a script call.
//!
//! | Native type | Script value |
//! |-------------|--------------|
//! | `i32`, `f32`, `f64` | `Number` |
//! | `i64`, `u64` | `BigInt` (exact) |
//! | `bool` | `Bool` |
//! | `String` | `String` |
//! | `Vec<T>` | `Array`, element by element |
//! | `HashMap<String, T>` | `Object`, key by key |
//! | `Option<T>` | `T` or `Null`/`Undefined` |
//! | `HostRef<T>` | `HostObject` whose native type is `T` |
//! | `ScriptFunction` | `Function` |
//! | `Value` | passed through unchanged |
//! | `()` | `Undefined` |

mod containers;
mod host;
mod primitives;


use crate::core::{BindingError, BindingResult};
use crate::value::Value;

/// Conversion entry for one native type.
///
/// Implement this for a domain type to make it usable as a bound method
/// parameter or return value.
pub trait Convertible: Sized + Send + 'static {
    /// Semantic type name used in descriptors and type-mismatch errors.
    fn type_name() -> String;

    /// Script value to native value.
    fn from_value(value: Value) -> BindingResult<Self>;

    /// Native value to script value.
    fn into_value(self) -> Value;
}

/// Builds the type-mismatch error for `T` given the offending value.
pub fn mismatch<T: Convertible>(received: &Value) -> BindingError {
    BindingError::type_mismatch(T::type_name(), received.type_name())
}

/// Values a bound function can hand back immediately.
///
/// Every [`Convertible`] type qualifies, and so does `Result<T, E>`: an `Err`
/// becomes the error thrown at the script call site with its message intact.
pub trait IntoValue: Send + 'static {
    fn value_type() -> String;

    fn into_script_value(self) -> BindingResult<Value>;
}

impl<T: Convertible> IntoValue for T {
    fn value_type() -> String {
        T::type_name()
    }

    fn into_script_value(self) -> BindingResult<Value> {
        Ok(self.into_value())
    }
}

impl<T, E> IntoValue for Result<T, E>
where
    T: Convertible,
    E: Into<BindingError> + Send + 'static,
{
    fn value_type() -> String {
        T::type_name()
    }

    fn into_script_value(self) -> BindingResult<Value> {
        self.map(Convertible::into_value).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NativeError;

    #[test]
    fn test_result_return_preserves_native_message() {
        let ok: Result<i32, NativeError> = Ok(7);
        assert_eq!(ok.into_script_value().unwrap(), Value::Number(7.0));

        let failed: Result<i32, NativeError> = Err(NativeError::new("asset missing"));
        let err = failed.into_script_value().unwrap_err();
        assert_eq!(err.to_string(), "asset missing");
        assert_eq!(<Result<i32, NativeError>>::value_type(), "int32");
    }
}
