//! Host Object Binding
//!
//! Surfaces native objects to the script value space. A native type declares
//! its script-visible members once, in [`Bindable::load_bindings`]; wrapping a
//! value in [`Hybrid::new`] builds the member table and yields a shared
//! [`HostRef`] the script can hold.
//!
//! Architecture:
//! ```text
//! script call (name, args[])
//!        │
//!        v
//! ┌──────────────────────┐  unknown name   ┌──────────────────┐
//! │  member table lookup │ ──────────────> │  UnknownMember   │
//! └──────────┬───────────┘                 └──────────────────┘
//!            │ arity check ─── mismatch ──> ArityMismatch
//!            v
//! ┌──────────────────────┐  any failure    ┌──────────────────┐
//! │ convert every arg    │ ──────────────> │  TypeMismatch    │
//! └──────────┬───────────┘                 └──────────────────┘
//!            v
//! ┌──────────────────────┐
//! │ native fn(&T, ..)    │ ── Err ──> Native
//! └──────────┬───────────┘
//!            v
//!   Immediate(value) | Pending(Promise)
//! ```
//!
//! # 示例
//!
//! ```rust
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use host_bridge::binding::{Bindable, BindingBuilder, HostObject, Hybrid};
//! use host_bridge::core::BindingResult;
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: AtomicI32,
//! }
//!
//! impl Bindable for Counter {
//!     const TYPE_NAME: &'static str = "Counter";
//!
//!     fn load_bindings(builder: &mut BindingBuilder<Self>) -> BindingResult<()> {
//!         builder
//!             .method("add", |this: &Counter, n: i32| this.value.fetch_add(n, Ordering::SeqCst) + n)?
//!             .getter("value", |this: &Counter| this.value.load(Ordering::SeqCst))?;
//!         Ok(())
//!     }
//! }
//!
//! let counter = Hybrid::new(Counter::default()).unwrap();
//! assert_eq!(counter.member_names(), vec!["add", "value"]);
//! ```

mod builder;
mod deferred;
mod hybrid;
mod method;

pub use builder::{BindingBuilder, MemberKind, MemberSignature};
pub use deferred::{Deferred, IntoReturn, Promise, Resolver, Returned};
pub use hybrid::{HostRef, Hybrid};
pub use method::NativeMethod;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::BindingResult;
use crate::dispatch::Dispatcher;
use crate::runtime::ScriptRuntime;
use crate::value::Value;

/// A native type that can be exposed to scripts.
pub trait Bindable: Send + Sync + Sized + 'static {
    /// Name reported to scripts and used in type-mismatch errors.
    const TYPE_NAME: &'static str;

    /// Registers every script-visible member. Called once per object, before
    /// it becomes reachable from script.
    fn load_bindings(builder: &mut BindingBuilder<Self>) -> BindingResult<()>;
}

/// Type-erased, script-facing view of a bound native object.
///
/// Implementations must already be attached to `cx.runtime()`; calls from an
/// unattached thread fail with `Detached`.
pub trait HostObject: Send + Sync + 'static {
    fn type_name(&self) -> &str;

    /// Methods and properties, sorted by name.
    fn member_names(&self) -> Vec<String>;

    fn call(&self, cx: &CallContext, name: &str, args: Vec<Value>) -> BindingResult<CallOutcome>;

    fn get(&self, cx: &CallContext, name: &str) -> BindingResult<Value>;

    fn set(&self, cx: &CallContext, name: &str, value: Value) -> BindingResult<()>;

    fn as_any(&self) -> &dyn Any;

    /// Used to recover the concrete native type of a reference argument.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Result of a dynamic call.
#[derive(Debug)]
pub enum CallOutcome {
    Immediate(Value),
    Pending(Promise),
}

impl CallOutcome {
    /// The immediate value, if the call did not defer.
    pub fn into_immediate(self) -> Option<Value> {
        match self {
            CallOutcome::Immediate(value) => Some(value),
            CallOutcome::Pending(_) => None,
        }
    }

    pub fn into_promise(self) -> Option<Promise> {
        match self {
            CallOutcome::Pending(promise) => Some(promise),
            CallOutcome::Immediate(_) => None,
        }
    }
}

/// Everything a dynamic call needs from its surroundings: the runtime the
/// calling thread is attached to, the scripting dispatcher that settles
/// promises, and the background pool deferred work runs on.
#[derive(Clone)]
pub struct CallContext {
    runtime: Arc<ScriptRuntime>,
    script: Arc<dyn Dispatcher>,
    background: Arc<dyn Dispatcher>,
}

impl CallContext {
    pub fn new(
        runtime: Arc<ScriptRuntime>,
        script: Arc<dyn Dispatcher>,
        background: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            runtime,
            script,
            background,
        }
    }

    pub fn runtime(&self) -> &Arc<ScriptRuntime> {
        &self.runtime
    }

    pub fn script(&self) -> &Arc<dyn Dispatcher> {
        &self.script
    }

    pub fn background(&self) -> &Arc<dyn Dispatcher> {
        &self.background
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("runtime", &self.runtime.id())
            .field("script", &self.script.kind())
            .field("background", &self.background.kind())
            .finish()
    }
}
