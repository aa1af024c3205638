use std::collections::HashMap;

use super::{mismatch, Convertible};
use crate::core::BindingResult;
use crate::value::Value;

impl<T: Convertible> Convertible for Vec<T> {
    fn type_name() -> String {
        format!("Array<{}>", T::type_name())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(T::into_value).collect())
    }
}

impl<T: Convertible> Convertible for HashMap<String, T> {
    fn type_name() -> String {
        format!("Record<string, {}>", T::type_name())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Object(entries) => entries
                .into_iter()
                .map(|(key, value)| Ok((key, T::from_value(value)?)))
                .collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Object(
            self.into_iter()
                .map(|(key, value)| (key, value.into_value()))
                .collect(),
        )
    }
}

/// `null` and `undefined` both map to `None`; `None` goes out as `null`.
impl<T: Convertible> Convertible for Option<T> {
    fn type_name() -> String {
        format!("{}?", T::type_name())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        if value.is_nullish() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Null,
        }
    }
}
