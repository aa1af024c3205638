use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::builder::{BindingTable, Member};
use super::{Bindable, BindingBuilder, CallContext, CallOutcome, HostObject, MemberSignature, Returned};
use crate::core::{BindingError, BindingResult, PropertyAccess};
use crate::value::Value;

/// Shared reference to a bound native object.
pub type HostRef<T> = Arc<Hybrid<T>>;

/// A native value paired with its member table.
///
/// The table is built once in [`Hybrid::new`] and never changes, so concurrent
/// calls read it without locking. Mutable native state is the native type's
/// own business (e.g. a `Mutex` field).
pub struct Hybrid<T: Bindable> {
    native: T,
    table: BindingTable<T>,
}

impl<T: Bindable> Hybrid<T> {
    /// Builds the member table and wraps `native`.
    ///
    /// Fails if `load_bindings` registers a name twice.
    pub fn new(native: T) -> BindingResult<HostRef<T>> {
        let mut builder = BindingBuilder::new(T::TYPE_NAME);
        T::load_bindings(&mut builder)?;
        let table = builder.finish();
        tracing::debug!(target: "binding", object = T::TYPE_NAME, members = table.members.len(), "host object created");
        Ok(Arc::new(Self { native, table }))
    }

    pub fn native(&self) -> &T {
        &self.native
    }

    /// Script value referring to this object.
    pub fn to_value(self: &Arc<Self>) -> Value {
        Value::HostObject(Arc::clone(self) as Arc<dyn HostObject>)
    }

    pub fn signature(&self, name: &str) -> Option<MemberSignature> {
        self.table.signature(name)
    }

    fn unknown(&self, name: &str) -> BindingError {
        BindingError::UnknownMember {
            object: T::TYPE_NAME.to_string(),
            member: name.to_string(),
        }
    }

    fn denied(&self, name: &str, access: PropertyAccess) -> BindingError {
        BindingError::PropertyAccess {
            object: T::TYPE_NAME.to_string(),
            member: name.to_string(),
            access,
        }
    }
}

impl<T: Bindable> Deref for Hybrid<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.native
    }
}

impl<T: Bindable> HostObject for Hybrid<T> {
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn member_names(&self) -> Vec<String> {
        self.table.members.keys().cloned().collect()
    }

    fn call(&self, cx: &CallContext, name: &str, args: Vec<Value>) -> BindingResult<CallOutcome> {
        cx.runtime().ensure_attached()?;

        let method = match self.table.members.get(name) {
            Some(Member::Method(method)) => method,
            _ => return Err(self.unknown(name)),
        };

        let expected = method.param_types.len();
        if args.len() != expected {
            return Err(BindingError::ArityMismatch {
                object: T::TYPE_NAME.to_string(),
                member: name.to_string(),
                expected,
                actual: args.len(),
            });
        }

        match (method.invoke)(&self.native, args)? {
            Returned::Immediate(value) => Ok(CallOutcome::Immediate(value)),
            Returned::Deferred(start) => Ok(CallOutcome::Pending(start(cx))),
        }
    }

    fn get(&self, cx: &CallContext, name: &str) -> BindingResult<Value> {
        cx.runtime().ensure_attached()?;

        match self.table.members.get(name) {
            Some(Member::Property(property)) => match &property.getter {
                Some(getter) => getter(&self.native),
                None => Err(self.denied(name, PropertyAccess::Read)),
            },
            _ => Err(self.unknown(name)),
        }
    }

    fn set(&self, cx: &CallContext, name: &str, value: Value) -> BindingResult<()> {
        cx.runtime().ensure_attached()?;

        match self.table.members.get(name) {
            Some(Member::Property(property)) => match &property.setter {
                Some(setter) => setter(&self.native, value),
                None => Err(self.denied(name, PropertyAccess::Written)),
            },
            _ => Err(self.unknown(name)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<T: Bindable + fmt::Debug> fmt::Debug for Hybrid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hybrid")
            .field("type", &T::TYPE_NAME)
            .field("native", &self.native)
            .finish()
    }
}
