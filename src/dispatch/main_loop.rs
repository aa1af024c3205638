use std::sync::{Arc, RwLock};
use std::thread::{self, ThreadId};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{Dispatcher, DispatcherKind, PanicHandler, PanicPolicy, Task};
use crate::core::{DispatchError, DispatchResult};

/// 由宿主循环驱动的调度器
///
/// 任务在创建者线程上执行：宿主（例如平台 UI 循环）需要周期性调用
/// [`run_pending`](Self::run_pending) 处理队列。
///
/// # 示例
///
/// ```rust
/// use host_bridge::dispatch::{DispatcherExt, DispatcherKind, LoopDispatcher};
///
/// let ui = LoopDispatcher::new(DispatcherKind::Ui);
/// ui.run_async(|| {
///     // 必须在 UI 线程执行的操作
/// }).unwrap();
///
/// // 在主循环中处理任务
/// assert_eq!(ui.run_pending(), 1);
/// ```
pub struct LoopDispatcher {
    kind: DispatcherKind,
    owner: ThreadId,
    sender: RwLock<Option<Sender<Task>>>,
    receiver: Receiver<Task>,
    policy: Arc<PanicPolicy>,
}

impl LoopDispatcher {
    /// 以当前线程为执行上下文创建调度器
    pub fn new(kind: DispatcherKind) -> Arc<Self> {
        let (tx, rx) = unbounded();
        Arc::new(Self {
            kind,
            owner: thread::current().id(),
            sender: RwLock::new(Some(tx)),
            receiver: rx,
            policy: Arc::new(PanicPolicy::default()),
        })
    }

    /// 处理队列中的所有任务，直到队列为空
    ///
    /// 返回执行的任务数量。只能在创建者线程上调用，否则不执行任何任务。
    pub fn run_pending(&self) -> usize {
        self.run_pending_limited(usize::MAX)
    }

    /// 处理指定数量的任务
    ///
    /// 适用于需要限制每帧处理任务数量的场景，避免单帧处理时间过长。
    pub fn run_pending_limited(&self, max_tasks: usize) -> usize {
        if !self.is_current() {
            tracing::warn!(target: "dispatch", kind = %self.kind, "run_pending called off the owner thread");
            return 0;
        }

        let mut executed = 0;
        while executed < max_tasks {
            match self.receiver.try_recv() {
                Ok(task) => {
                    self.policy.run(self.kind, task);
                    executed += 1;
                }
                Err(_) => break,
            }
        }
        executed
    }

    /// 队列中等待执行的任务数
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Dispatcher for LoopDispatcher {
    fn kind(&self) -> DispatcherKind {
        self.kind
    }

    fn dispatch(&self, task: Task) -> DispatchResult<()> {
        let closed = DispatchError::Closed { kind: self.kind };
        let sender = self.sender.read().map_err(|_| closed.clone())?;
        match sender.as_ref() {
            Some(tx) => tx.send(task).map_err(|_| closed),
            None => Err(closed),
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// 关闭后不再接受新任务；已入队的任务仍可通过 `run_pending` 执行
    fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.write() {
            sender.take();
        }
    }

    fn is_closed(&self) -> bool {
        self.sender
            .read()
            .map(|sender| sender.is_none())
            .unwrap_or(true)
    }

    fn set_panic_handler(&self, handler: PanicHandler) {
        self.policy.set_handler(handler);
    }
}

impl Drop for LoopDispatcher {
    fn drop(&mut self) {
        let remaining = self.receiver.len();
        if remaining > 0 {
            tracing::warn!(target: "dispatch", kind = %self.kind, remaining, "loop dispatcher dropped with pending tasks");
        }
    }
}
