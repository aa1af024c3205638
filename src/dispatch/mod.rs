//! 任务调度系统
//!
//! 把原生工作投递到指定的执行上下文（脚本线程、UI 线程、渲染线程、后台线程池），
//! 并在上下文之间安全地传回结果。
//!
//! ## 功能特性
//!
//! - 每个调度器一个 FIFO 任务队列，同一线程提交的任务按提交顺序执行
//! - 提交只做入队，不阻塞
//! - 调度器关闭后提交返回 [`DispatchError::Closed`]，任务不会被静默丢弃
//! - 任务 panic 被捕获，交给回退处理器或记录日志，工作线程继续运行
//!
//! ## 实现
//!
//! - [`ThreadDispatcher`]: 独占一个线程（脚本 / UI / 渲染上下文）
//! - [`PoolDispatcher`]: 多个工作线程共享一个队列（后台上下文）
//! - [`LoopDispatcher`]: 在创建者线程上由宿主循环驱动（主线程任务队列）

mod main_loop;
mod pool;
mod thread;

pub use main_loop::LoopDispatcher;
pub use pool::PoolDispatcher;
pub use thread::ThreadDispatcher;

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::core::{DispatchError, DispatchResult};

/// 调度器中排队的任务
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// 任务 panic 时的回退处理器，参数为调度器类型和 panic 消息
pub type PanicHandler = Arc<dyn Fn(DispatcherKind, &str) + Send + Sync>;

/// 执行上下文类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherKind {
    /// 脚本线程，可以安全访问脚本可见状态
    Script,
    /// UI 线程
    Ui,
    /// 渲染线程
    Render,
    /// 后台线程池，不得直接访问脚本状态
    Background,
}

impl fmt::Display for DispatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatcherKind::Script => "script",
            DispatcherKind::Ui => "UI",
            DispatcherKind::Render => "render",
            DispatcherKind::Background => "background",
        };
        f.write_str(name)
    }
}

/// 执行上下文抽象
///
/// 对象安全的核心接口；泛型便捷方法见 [`DispatcherExt`]。
pub trait Dispatcher: Send + Sync {
    /// 上下文类型
    fn kind(&self) -> DispatcherKind;

    /// 将任务加入队列并立即返回
    fn dispatch(&self, task: Task) -> DispatchResult<()>;

    /// 当前线程是否就是该调度器的执行上下文
    fn is_current(&self) -> bool;

    /// 关闭调度器
    ///
    /// 已入队的任务仍会执行完毕；之后的提交返回 `Closed`。
    fn shutdown(&self);

    fn is_closed(&self) -> bool;

    /// 安装任务 panic 的回退处理器
    fn set_panic_handler(&self, handler: PanicHandler);
}

/// 调度器的泛型便捷方法
pub trait DispatcherExt: Dispatcher {
    /// 异步执行闭包
    ///
    /// # 示例
    ///
    /// ```rust
    /// use host_bridge::dispatch::{DispatcherExt, DispatcherKind, ThreadDispatcher};
    ///
    /// let render = ThreadDispatcher::spawn(DispatcherKind::Render, "render").unwrap();
    /// render.run_async(|| {
    ///     // 渲染线程上的工作
    /// }).unwrap();
    /// ```
    fn run_async<F>(&self, f: F) -> DispatchResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Box::new(f))
    }

    /// 同步执行闭包并返回结果
    ///
    /// 已经在该上下文上时直接内联执行，否则入队并阻塞等待结果。
    ///
    /// # 警告
    ///
    /// 在另一个调度器的任务里等待当前调度器可能造成死锁，应优先使用 `run_async`。
    fn run_sync<F, R>(&self, f: F) -> DispatchResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let kind = self.kind();
        if self.is_current() {
            return catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
                DispatchError::Panicked {
                    kind,
                    message: panic_message(payload.as_ref()),
                }
            });
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        self.dispatch(Box::new(move || {
            let _ = tx.send(catch_unwind(AssertUnwindSafe(f)));
        }))?;

        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(DispatchError::Panicked {
                kind,
                message: panic_message(payload.as_ref()),
            }),
            // 任务在执行前被丢弃（调度器被销毁）
            Err(_) => Err(DispatchError::Closed { kind }),
        }
    }
}

impl<D: Dispatcher + ?Sized> DispatcherExt for D {}

static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_DISPATCHER: Cell<u64> = const { Cell::new(0) };
}

pub(crate) fn next_dispatcher_id() -> u64 {
    NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed)
}

/// 标记当前线程属于某个调度器
pub(crate) fn enter_dispatcher(id: u64) {
    CURRENT_DISPATCHER.with(|current| current.set(id));
}

pub(crate) fn current_dispatcher() -> u64 {
    CURRENT_DISPATCHER.with(|current| current.get())
}

/// 任务 panic 处理策略
///
/// 没有结果通道的任务 panic 时：有回退处理器则交给它，否则记录错误日志。
/// 两种情况下工作线程都继续处理后续任务。
#[derive(Default)]
pub(crate) struct PanicPolicy {
    handler: RwLock<Option<PanicHandler>>,
}

impl PanicPolicy {
    pub(crate) fn set_handler(&self, handler: PanicHandler) {
        if let Ok(mut slot) = self.handler.write() {
            *slot = Some(handler);
        }
    }

    pub(crate) fn run(&self, kind: DispatcherKind, task: Task) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            let message = panic_message(payload.as_ref());
            let handler = self.handler.read().ok().and_then(|slot| slot.clone());
            match handler {
                Some(handler) => handler(kind, &message),
                None => tracing::error!(target: "dispatch", %kind, "task panicked: {message}"),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(DispatcherKind::Script.to_string(), "script");
        assert_eq!(DispatcherKind::Ui.to_string(), "UI");
        assert_eq!(DispatcherKind::Background.to_string(), "background");
    }

    #[test]
    fn test_panic_policy_uses_handler() {
        let policy = PanicPolicy::default();
        let (tx, rx) = crossbeam_channel::unbounded();
        policy.set_handler(Arc::new(move |kind, message: &str| {
            let _ = tx.send((kind, message.to_string()));
        }));

        policy.run(DispatcherKind::Render, Box::new(|| panic!("boom")));

        let (kind, message) = rx.try_recv().unwrap();
        assert_eq!(kind, DispatcherKind::Render);
        assert_eq!(message, "boom");
    }

    #[test]
    fn test_panic_policy_without_handler_continues() {
        let policy = PanicPolicy::default();
        policy.run(DispatcherKind::Background, Box::new(|| panic!("ignored")));

        let (tx, rx) = crossbeam_channel::unbounded();
        policy.run(
            DispatcherKind::Background,
            Box::new(move || {
                let _ = tx.send(1);
            }),
        );
        assert_eq!(rx.try_recv().unwrap(), 1);
    }
}
