//! Host object references
//!
//! A reference argument is recognized by downcasting the wrapped object, not
//! by registration: any `HostRef<T>` with `T: Bindable` converts.

use std::sync::Arc;

use super::{mismatch, Convertible};
use crate::binding::{Bindable, HostObject, Hybrid};
use crate::core::{BindingError, BindingResult};
use crate::value::Value;

impl<T: Bindable> Convertible for Arc<Hybrid<T>> {
    fn type_name() -> String {
        T::TYPE_NAME.to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::HostObject(object) => {
                let received = object.type_name().to_string();
                object
                    .into_any()
                    .downcast::<Hybrid<T>>()
                    .map_err(|_| BindingError::type_mismatch(T::TYPE_NAME, received))
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::HostObject(self)
    }
}

/// Any host object, whatever its native type.
impl Convertible for Arc<dyn HostObject> {
    fn type_name() -> String {
        "HostObject".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::HostObject(object) => Ok(object),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn into_value(self) -> Value {
        Value::HostObject(self)
    }
}
