//! # Host Bridge
//!
//! A runtime for surfacing native objects to a dynamically-typed script host
//! and for moving native work between execution contexts.
//!
//! ## Features
//!
//! - **Host Objects**: declare script-visible methods and properties once per type
//! - **Type Marshaling**: automatic conversion between script values and native types
//! - **Deferred Results**: methods can return promises settled on the script thread
//! - **Dispatchers**: FIFO task queues for the script, UI, render and background contexts
//! - **Frame Scheduling**: vsync-paced callback lists with start/stop/dispose lifecycle
//!
//! ## Architecture Design
//!
//! Everything that touches script-visible state runs on the script context.
//! Native code reaches other contexts only through a [`dispatch::Dispatcher`],
//! and script-owned references are released while attached to their runtime,
//! regardless of which thread drops them.
//!
//! ### Example
//!
//! ```rust
//! use host_bridge::binding::{Bindable, BindingBuilder, HostObject, Hybrid};
//! use host_bridge::config::BridgeConfig;
//! use host_bridge::core::BindingResult;
//! use host_bridge::dispatch::DispatcherExt;
//! use host_bridge::proxy::{HeadlessProxy, PlatformProxy};
//! use host_bridge::Value;
//!
//! struct Greeter;
//!
//! impl Bindable for Greeter {
//!     const TYPE_NAME: &'static str = "Greeter";
//!
//!     fn load_bindings(builder: &mut BindingBuilder<Self>) -> BindingResult<()> {
//!         builder.method("greet", |_: &Greeter, name: String| format!("Hello, {name}!"))?;
//!         Ok(())
//!     }
//! }
//!
//! let proxy = HeadlessProxy::new(&BridgeConfig::default()).unwrap();
//! let cx = proxy.call_context();
//! let reply = proxy
//!     .script()
//!     .run_sync(move || -> BindingResult<Option<Value>> {
//!         let greeter = Hybrid::new(Greeter)?;
//!         let outcome = greeter.call(&cx, "greet", vec![Value::from("script")])?;
//!         Ok(outcome.into_immediate())
//!     })
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(reply, Some(Value::from("Hello, script!")));
//! ```
//!
//! ## Modules
//!
//! - [`binding`]: host objects and member tables
//! - [`convert`]: script value conversions
//! - [`dispatch`]: execution contexts
//! - [`frame`]: frame scheduling
//! - [`proxy`]: platform collaborators

/// Error types and shared macros
pub mod core;
/// Script value space
pub mod value;
/// Script runtime handle and thread attachment
pub mod runtime;
/// Conversions between script values and native types
pub mod convert;
/// Host object binding and dynamic dispatch
pub mod binding;
/// Execution contexts and task dispatch
pub mod dispatch;
/// Vsync-paced frame callbacks
pub mod frame;
/// Platform proxy abstraction
pub mod proxy;
/// Configuration system
pub mod config;
/// Logging setup
pub mod logging;

pub use binding::{Bindable, CallContext, CallOutcome, HostObject, HostRef, Hybrid};
pub use convert::Convertible;
pub use core::{BindingError, BindingResult};
pub use dispatch::{Dispatcher, DispatcherExt, DispatcherKind};
pub use runtime::ScriptRuntime;
pub use value::{ScriptFunction, Value};
