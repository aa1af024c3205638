//! Deferred results
//!
//! A bound method returning [`Deferred<T>`] hands the script a [`Promise`]
//! immediately. The work runs elsewhere (usually the background pool) and
//! settles the promise through a [`Resolver`]; settlement is always delivered
//! on the scripting dispatcher, so converting the result touches script state
//! only from the script thread.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::channel::oneshot;

use super::CallContext;
use crate::convert::IntoValue;
use crate::core::{BindingError, BindingResult};
use crate::dispatch::{Dispatcher, DispatcherExt};
use crate::value::Value;

type Settlement = BindingResult<Value>;
type StartFn<T> = Box<dyn FnOnce(&CallContext, Resolver<T>) + Send>;
type PendingStart = Box<dyn FnOnce(&CallContext) -> Promise + Send>;

/// What a bound method produced.
pub enum Returned {
    Immediate(Value),
    /// Started once the call context is known.
    Deferred(PendingStart),
}

impl fmt::Debug for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Returned::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Returned::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Return types accepted from bound methods: any [`IntoValue`] or a
/// [`Deferred`] of one.
pub trait IntoReturn: Send + 'static {
    fn return_type() -> String;

    fn into_return(self) -> BindingResult<Returned>;
}

impl<T: IntoValue> IntoReturn for T {
    fn return_type() -> String {
        T::value_type()
    }

    fn into_return(self) -> BindingResult<Returned> {
        self.into_script_value().map(Returned::Immediate)
    }
}

/// An asynchronous result of type `T`.
///
/// # 示例
///
/// ```rust
/// use host_bridge::binding::Deferred;
/// use host_bridge::core::NativeError;
///
/// fn load_asset(path: String) -> Deferred<Vec<i32>> {
///     Deferred::background(move || {
///         if path.is_empty() {
///             return Err(NativeError::new("empty path"));
///         }
///         Ok(vec![1, 2, 3])
///     })
/// }
/// ```
pub struct Deferred<T> {
    start: StartFn<T>,
}

impl<T: IntoValue> Deferred<T> {
    /// Custom start: `start` receives the call context and must eventually
    /// settle (or drop) the resolver.
    pub fn new<F>(start: F) -> Self
    where
        F: FnOnce(&CallContext, Resolver<T>) + Send + 'static,
    {
        Self {
            start: Box::new(start),
        }
    }

    /// Runs `work` on the background dispatcher.
    pub fn background<F, E>(work: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<BindingError> + Send + 'static,
    {
        Self::new(move |cx, resolver| {
            let fallback = resolver.share();
            let submitted = cx.background().run_async(move || match work() {
                Ok(value) => resolver.resolve(value),
                Err(err) => resolver.reject(err),
            });
            if let Err(err) = submitted {
                fallback.reject(err);
            }
        })
    }

    /// An already-known value, delivered through the promise path.
    pub fn ready(value: T) -> Self {
        Self::new(move |_, resolver| resolver.resolve(value))
    }
}

impl<T: IntoValue> IntoReturn for Deferred<T> {
    fn return_type() -> String {
        format!("Promise<{}>", T::value_type())
    }

    fn into_return(self) -> BindingResult<Returned> {
        let start = self.start;
        Ok(Returned::Deferred(Box::new(move |cx: &CallContext| {
            let (resolver, promise) = Resolver::channel(Arc::clone(cx.script()));
            start(cx, resolver);
            promise
        })))
    }
}

/// Settles one [`Promise`].
///
/// Dropping every resolver without settling rejects the promise with
/// [`BindingError::Abandoned`].
pub struct Resolver<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<Settlement>>>>,
    script: Arc<dyn Dispatcher>,
    _result: PhantomData<fn(T)>,
}

impl<T: IntoValue> Resolver<T> {
    fn channel(script: Arc<dyn Dispatcher>) -> (Self, Promise) {
        let (tx, rx) = oneshot::channel();
        let resolver = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            script,
            _result: PhantomData,
        };
        (resolver, Promise { receiver: rx })
    }

    /// Second handle on the same settlement; whichever settles first wins.
    fn share(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
            script: Arc::clone(&self.script),
            _result: PhantomData,
        }
    }

    pub fn resolve(self, value: T) {
        self.settle(move || value.into_script_value());
    }

    pub fn reject(self, err: impl Into<BindingError>) {
        let err = err.into();
        self.settle(move || Err(err));
    }

    fn settle<F>(self, produce: F)
    where
        F: FnOnce() -> Settlement + Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            tracing::debug!(target: "binding", "promise already settled");
            return;
        };

        // 结果转换必须在脚本线程上进行
        let slot = Arc::new(Mutex::new(Some(sender)));
        let queued = Arc::clone(&slot);
        let delivered = self.script.run_async(move || {
            let sender = queued.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(sender) = sender {
                let _ = sender.send(produce());
            }
        });

        // 脚本调度器已关闭：直接以调度错误拒绝，不做任何值转换
        if let Err(err) = delivered {
            tracing::warn!(target: "binding", "script dispatcher refused promise settlement: {err}");
            let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(sender) = sender {
                let _ = sender.send(Err(BindingError::Dispatch(err)));
            }
        }
    }
}

/// Pending handle returned to the script for a deferred call.
///
/// Awaiting it yields the settled value or the rejection error.
#[must_use = "a promise does nothing unless awaited or polled"]
pub struct Promise {
    receiver: oneshot::Receiver<Settlement>,
}

impl Promise {
    /// Non-blocking check; `None` while still pending.
    pub fn try_take(&mut self) -> Option<Settlement> {
        match self.receiver.try_recv() {
            Ok(Some(settlement)) => Some(settlement),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(BindingError::Abandoned)),
        }
    }
}

impl Future for Promise {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(BindingError::Abandoned)))
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DispatchError, NativeError};
    use crate::dispatch::{DispatcherKind, LoopDispatcher};
    use crate::runtime::ScriptRuntime;
    use futures::executor::block_on;

    fn context() -> (CallContext, Arc<LoopDispatcher>, Arc<LoopDispatcher>) {
        let script = LoopDispatcher::new(DispatcherKind::Script);
        let background = LoopDispatcher::new(DispatcherKind::Background);
        let cx = CallContext::new(
            ScriptRuntime::new(),
            Arc::clone(&script) as Arc<dyn Dispatcher>,
            Arc::clone(&background) as Arc<dyn Dispatcher>,
        );
        (cx, script, background)
    }

    fn start<T: IntoValue>(deferred: Deferred<T>, cx: &CallContext) -> Promise {
        match deferred.into_return().unwrap() {
            Returned::Deferred(start) => start(cx),
            Returned::Immediate(value) => panic!("expected deferred, got {value:?}"),
        }
    }

    #[test]
    fn test_settles_only_after_script_pump() {
        let (cx, script, background) = context();
        let mut promise = start(Deferred::background(|| Ok::<_, NativeError>(42)), &cx);

        assert!(promise.try_take().is_none());
        assert_eq!(background.run_pending(), 1);
        // 后台完成后仍需脚本线程投递结果
        assert!(promise.try_take().is_none());
        assert_eq!(script.run_pending(), 1);

        assert_eq!(promise.try_take().unwrap().unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_rejection_keeps_native_message() {
        let (cx, script, background) = context();
        let promise = start(
            Deferred::<i32>::background(|| Err(NativeError::new("decode failed"))),
            &cx,
        );
        background.run_pending();
        script.run_pending();

        let err = block_on(promise).unwrap_err();
        assert_eq!(err, BindingError::Native(NativeError::new("decode failed")));
    }

    #[test]
    fn test_dropped_resolver_abandons() {
        let (cx, _script, _background) = context();
        let promise = start(Deferred::<i32>::new(|_, resolver| drop(resolver)), &cx);
        assert_eq!(block_on(promise), Err(BindingError::Abandoned));
    }

    #[test]
    fn test_closed_background_rejects() {
        let (cx, script, background) = context();
        background.shutdown();

        let promise = start(Deferred::background(|| Ok::<_, NativeError>(1)), &cx);
        script.run_pending();

        assert_eq!(
            block_on(promise),
            Err(BindingError::Dispatch(DispatchError::Closed {
                kind: DispatcherKind::Background
            }))
        );
    }

    #[test]
    fn test_closed_script_rejects_with_dispatch_error() {
        let (cx, script, background) = context();
        let promise = start(Deferred::background(|| Ok::<_, NativeError>(5)), &cx);
        script.shutdown();
        background.run_pending();

        assert_eq!(
            block_on(promise),
            Err(BindingError::Dispatch(DispatchError::Closed {
                kind: DispatcherKind::Script
            }))
        );
    }

    #[test]
    fn test_return_type_names() {
        assert_eq!(<Deferred<String>>::return_type(), "Promise<string>");
        assert_eq!(<Vec<i64>>::return_type(), "Array<int64>");
    }
}
