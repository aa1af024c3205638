//! 脚本运行时句柄与线程附加
//!
//! 脚本运行时的内部状态（值的创建、引用簿记）只能在已附加到该运行时的线程上访问。
//! 编译器无法检查这一点，因此这里用显式的附加作用域来建模：
//!
//! - [`ScriptRuntime::attach`] 返回一个 [`AttachGuard`]，在其存活期间当前线程视为已附加
//! - [`RuntimeRef`] 包装一个由运行时跟踪的资源；无论在哪个线程上被丢弃，
//!   都会先附加、再释放、最后分离
//!
//! 脚本线程的调度器在整个工作循环期间保持附加。

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::{BindingError, BindingResult};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ATTACHED: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// 脚本运行时句柄
///
/// 负责跟踪脚本侧也持有的原生引用，并记录来自未附加线程的非法访问。
pub struct ScriptRuntime {
    id: u64,
    /// 句柄 ID -> 标签
    tracked: Mutex<HashMap<u64, &'static str>>,
    next_handle: AtomicU64,
    released: AtomicU64,
    violations: AtomicU64,
}

impl ScriptRuntime {
    pub fn new() -> Arc<Self> {
        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "runtime", runtime = id, "script runtime created");
        Arc::new(Self {
            id,
            tracked: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            released: AtomicU64::new(0),
            violations: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// 将当前线程附加到运行时，返回的守卫被丢弃时分离
    ///
    /// 附加可以嵌套；守卫不能跨线程移动。
    pub fn attach(self: &Arc<Self>) -> AttachGuard {
        ATTACHED.with(|attached| attached.borrow_mut().push(self.id));
        AttachGuard {
            runtime: Arc::clone(self),
            _not_send: PhantomData,
        }
    }

    /// 当前线程是否已附加
    pub fn is_attached(&self) -> bool {
        ATTACHED.with(|attached| attached.borrow().contains(&self.id))
    }

    /// 要求当前线程已附加，否则记录一次违规并返回 `Detached`
    pub fn ensure_attached(&self) -> BindingResult<()> {
        if self.is_attached() {
            Ok(())
        } else {
            self.violations.fetch_add(1, Ordering::SeqCst);
            tracing::error!(target: "runtime", runtime = self.id, "runtime accessed from unattached thread");
            Err(BindingError::Detached { runtime: self.id })
        }
    }

    /// 登记一个由运行时跟踪的引用
    pub(crate) fn track(&self, label: &'static str) -> BindingResult<u64> {
        self.ensure_attached()?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.lock_tracked().insert(handle, label);
        Ok(handle)
    }

    /// 释放一个引用；未附加时拒绝修改簿记
    pub(crate) fn release(&self, handle: u64) -> BindingResult<()> {
        self.ensure_attached()?;
        if self.lock_tracked().remove(&handle).is_some() {
            self.released.fetch_add(1, Ordering::SeqCst);
        } else {
            tracing::warn!(target: "runtime", runtime = self.id, handle, "release of unknown handle");
        }
        Ok(())
    }

    /// 当前仍被跟踪的引用数
    pub fn live_handles(&self) -> usize {
        self.lock_tracked().len()
    }

    /// 累计释放次数
    pub fn released_handles(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// 累计的未附加访问次数
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::SeqCst)
    }

    fn lock_tracked(&self) -> std::sync::MutexGuard<'_, HashMap<u64, &'static str>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("id", &self.id)
            .field("live_handles", &self.live_handles())
            .finish()
    }
}

/// 附加作用域守卫
pub struct AttachGuard {
    runtime: Arc<ScriptRuntime>,
    _not_send: PhantomData<*const ()>,
}

impl AttachGuard {
    pub fn runtime(&self) -> &Arc<ScriptRuntime> {
        &self.runtime
    }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        let id = self.runtime.id;
        ATTACHED.with(|attached| {
            let mut attached = attached.borrow_mut();
            if let Some(pos) = attached.iter().rposition(|&entry| entry == id) {
                attached.remove(pos);
            }
        });
    }
}

/// 由运行时跟踪的资源
///
/// 丢弃时在附加作用域内释放内部值并注销句柄，因此可以在任意线程上丢弃。
pub struct RuntimeRef<T> {
    runtime: Arc<ScriptRuntime>,
    handle: u64,
    /// 只在 drop 中被取走
    value: Option<T>,
}

impl<T> RuntimeRef<T> {
    /// 在运行时中登记 `value`，当前线程必须已附加
    pub fn new(runtime: &Arc<ScriptRuntime>, label: &'static str, value: T) -> BindingResult<Self> {
        let handle = runtime.track(label)?;
        Ok(Self {
            runtime: Arc::clone(runtime),
            handle,
            value: Some(value),
        })
    }

    pub fn runtime(&self) -> &Arc<ScriptRuntime> {
        &self.runtime
    }
}

impl<T> Deref for RuntimeRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("runtime reference used after release"),
        }
    }
}

impl<T> Drop for RuntimeRef<T> {
    fn drop(&mut self) {
        let _scope = self.runtime.attach();
        drop(self.value.take());
        if let Err(err) = self.runtime.release(self.handle) {
            tracing::error!(target: "runtime", "failed to release runtime reference: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_attach_scope() {
        let runtime = ScriptRuntime::new();
        assert!(!runtime.is_attached());
        {
            let _outer = runtime.attach();
            {
                let _inner = runtime.attach();
                assert!(runtime.is_attached());
            }
            assert!(runtime.is_attached());
        }
        assert!(!runtime.is_attached());
    }

    #[test]
    fn test_attach_is_per_runtime() {
        let a = ScriptRuntime::new();
        let b = ScriptRuntime::new();
        let _scope = a.attach();
        assert!(a.is_attached());
        assert!(!b.is_attached());
    }

    #[test]
    fn test_track_requires_attachment() {
        let runtime = ScriptRuntime::new();
        let err = RuntimeRef::new(&runtime, "buffer", 1u32).err().unwrap();
        assert_eq!(err, BindingError::Detached { runtime: runtime.id() });
        assert_eq!(runtime.violations(), 1);
    }

    #[test]
    fn test_unattached_release_is_refused() {
        let runtime = ScriptRuntime::new();
        let handle = {
            let _scope = runtime.attach();
            runtime.track("raw").unwrap()
        };
        assert!(runtime.release(handle).is_err());
        assert_eq!(runtime.live_handles(), 1);
        assert_eq!(runtime.violations(), 1);
    }

    #[test]
    fn test_runtime_ref_released_from_foreign_thread() {
        let runtime = ScriptRuntime::new();
        let reference = {
            let _scope = runtime.attach();
            RuntimeRef::new(&runtime, "callback", String::from("payload")).unwrap()
        };
        assert_eq!(*reference, "payload");
        assert_eq!(runtime.live_handles(), 1);

        thread::spawn(move || drop(reference)).join().unwrap();

        assert_eq!(runtime.live_handles(), 0);
        assert_eq!(runtime.released_handles(), 1);
        assert_eq!(runtime.violations(), 0);
    }
}
