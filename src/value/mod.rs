//! Script value space
//!
//! [`Value`] is the dynamically-typed value exchanged across the binding
//! boundary. Host objects travel as shared references; script functions are
//! runtime-tracked callables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::binding::HostObject;
use crate::core::{BindingResult, DispatchResult};
use crate::dispatch::{Dispatcher, DispatcherExt};
use crate::runtime::{RuntimeRef, ScriptRuntime};

/// A dynamically-typed script value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// Arbitrary-precision integer; wide enough for every `i64` and `u64`.
    BigInt(i128),
    String(String),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
    HostObject(Arc<dyn HostObject>),
    Function(ScriptFunction),
}

impl Value {
    /// Describes the value's type for error messages.
    ///
    /// Host objects report their native type name.
    pub fn type_name(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::BigInt(_) => "bigint".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(_) => "object".to_string(),
            Value::HostObject(object) => object.type_name().to_string(),
            Value::Function(_) => "function".to_string(),
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_host_object(&self) -> Option<&Arc<dyn HostObject>> {
        match self {
            Value::HostObject(object) => Some(object),
            _ => None,
        }
    }

    /// Property lookup on plain objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::HostObject(a), Value::HostObject(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}n"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map).finish(),
            Value::HostObject(object) => write!(f, "[HostObject {}]", object.type_name()),
            Value::Function(function) => write!(f, "[Function {}]", function.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

type FunctionBody = dyn Fn(&[Value]) -> BindingResult<Value> + Send + Sync;

/// A callable owned by the script runtime.
///
/// Functions are created while attached to their runtime and may only be
/// invoked from an attached thread; [`schedule`](Self::schedule) hops through a
/// dispatcher first. The body is a [`RuntimeRef`], so the last clone may be
/// dropped on any thread.
#[derive(Clone)]
pub struct ScriptFunction {
    inner: Arc<FunctionInner>,
}

struct FunctionInner {
    name: String,
    body: RuntimeRef<Box<FunctionBody>>,
}

impl ScriptFunction {
    pub fn new<F>(runtime: &Arc<ScriptRuntime>, name: impl Into<String>, body: F) -> BindingResult<Self>
    where
        F: Fn(&[Value]) -> BindingResult<Value> + Send + Sync + 'static,
    {
        let body: Box<FunctionBody> = Box::new(body);
        Ok(Self {
            inner: Arc::new(FunctionInner {
                name: name.into(),
                body: RuntimeRef::new(runtime, "function", body)?,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn runtime(&self) -> &Arc<ScriptRuntime> {
        self.inner.body.runtime()
    }

    /// Invokes the function on the current thread, which must be attached.
    pub fn call(&self, args: &[Value]) -> BindingResult<Value> {
        self.runtime().ensure_attached()?;
        (**self.inner.body)(args)
    }

    /// Queues an invocation on `dispatcher`.
    ///
    /// Failures raised by the function are logged; there is no result channel.
    pub fn schedule(&self, dispatcher: &dyn Dispatcher, args: Vec<Value>) -> DispatchResult<()> {
        let function = self.clone();
        dispatcher.run_async(move || {
            if let Err(err) = function.call(&args) {
                tracing::error!(target: "runtime", function = %function.name(), "script callback failed: {err}");
            }
        })
    }

    pub fn ptr_eq(&self, other: &ScriptFunction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("name", &self.inner.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BindingError;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::from(1).type_name(), "number");
        assert_eq!(Value::BigInt(1).type_name(), "bigint");
        assert_eq!(Value::from("hi").type_name(), "string");
        assert_eq!(Value::Array(vec![]).type_name(), "array");
        assert_eq!(Value::default().type_name(), "undefined");
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::Array(vec![Value::from(1), Value::from("x")]);
        let b = Value::Array(vec![Value::from(1), Value::from("x")]);
        assert_eq!(a, b);
        assert_ne!(Value::Null, Value::Undefined);
        assert_ne!(Value::Number(1.0), Value::BigInt(1));
    }

    #[test]
    fn test_function_call_requires_attachment() {
        let runtime = ScriptRuntime::new();
        let function = {
            let _scope = runtime.attach();
            ScriptFunction::new(&runtime, "double", |args| {
                let n = args.first().and_then(Value::as_number).unwrap_or_default();
                Ok(Value::Number(n * 2.0))
            })
            .unwrap()
        };

        let err = function.call(&[Value::from(2)]).unwrap_err();
        assert!(matches!(err, BindingError::Detached { .. }));

        let _scope = runtime.attach();
        assert_eq!(function.call(&[Value::from(2)]).unwrap(), Value::Number(4.0));
        assert_eq!(format!("{:?}", Value::Function(function)), "[Function double]");
    }
}
