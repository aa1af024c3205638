use std::io;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{
    current_dispatcher, enter_dispatcher, next_dispatcher_id, Dispatcher, DispatcherKind,
    PanicHandler, PanicPolicy, Task,
};
use crate::core::{DispatchError, DispatchResult};

/// 独占线程的调度器
///
/// 一个工作线程按 FIFO 顺序执行队列中的任务，用于脚本、UI、渲染上下文。
pub struct ThreadDispatcher {
    id: u64,
    kind: DispatcherKind,
    name: String,
    /// 任务发送器，关闭后为 `None`
    sender: RwLock<Option<Sender<Task>>>,
    /// 工作线程句柄
    worker: Mutex<Option<JoinHandle<()>>>,
    policy: Arc<PanicPolicy>,
}

impl ThreadDispatcher {
    /// 启动一个新的调度线程
    pub fn spawn(kind: DispatcherKind, name: impl Into<String>) -> io::Result<Arc<Self>> {
        Self::spawn_with_setup(kind, name, || ())
    }

    /// 启动调度线程，并在线程上先执行 `setup`
    ///
    /// `setup` 的返回值在整个工作循环期间保持存活，线程退出时才释放。
    /// 脚本线程用它来持续附加到脚本运行时：
    ///
    /// ```rust
    /// use host_bridge::dispatch::{DispatcherKind, ThreadDispatcher};
    /// use host_bridge::runtime::ScriptRuntime;
    ///
    /// let runtime = ScriptRuntime::new();
    /// let rt = runtime.clone();
    /// let js = ThreadDispatcher::spawn_with_setup(DispatcherKind::Script, "js", move || rt.attach())
    ///     .unwrap();
    /// ```
    pub fn spawn_with_setup<S, G>(
        kind: DispatcherKind,
        name: impl Into<String>,
        setup: S,
    ) -> io::Result<Arc<Self>>
    where
        S: FnOnce() -> G + Send + 'static,
        G: 'static,
    {
        let name = name.into();
        let id = next_dispatcher_id();
        let (tx, rx) = unbounded::<Task>();
        let policy = Arc::new(PanicPolicy::default());

        let worker_policy = Arc::clone(&policy);
        let worker = thread::Builder::new().name(name.clone()).spawn(move || {
            enter_dispatcher(id);
            let _scope = setup();
            Self::worker_loop(kind, rx, &worker_policy);
        })?;

        tracing::debug!(target: "dispatch", %kind, name = %name, "dispatcher thread started");

        Ok(Arc::new(Self {
            id,
            kind,
            name,
            sender: RwLock::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            policy,
        }))
    }

    /// 调度线程主循环
    fn worker_loop(kind: DispatcherKind, rx: Receiver<Task>, policy: &PanicPolicy) {
        // 通道断开（发送器被丢弃）且队列为空时退出
        while let Ok(task) = rx.recv() {
            policy.run(kind, task);
        }
        tracing::debug!(target: "dispatch", %kind, "dispatcher thread exiting");
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Dispatcher for ThreadDispatcher {
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
        current_dispatcher() == self.id
    }

    fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.write() {
            sender.take();
        }

        // 在自己的任务里关闭时不能等待自己
        if self.is_current() {
            return;
        }

        let worker = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = worker {
            if handle.join().is_err() {
                tracing::error!(target: "dispatch", kind = %self.kind, "dispatcher thread panicked");
            }
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

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatcherExt;
    use std::time::Duration;

    #[test]
    fn test_tasks_run_in_submission_order() {
        let dispatcher = ThreadDispatcher::spawn(DispatcherKind::Render, "render-test").unwrap();
        let (tx, rx) = unbounded();

        for i in 1..=3 {
            let tx = tx.clone();
            dispatcher.run_async(move || tx.send(i).unwrap()).unwrap();
        }

        let order: Vec<i32> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_run_sync_returns_value() {
        let dispatcher = ThreadDispatcher::spawn(DispatcherKind::Ui, "ui-test").unwrap();
        let on_worker = dispatcher.run_sync(|| thread::current().name().map(str::to_string));
        assert_eq!(on_worker.unwrap().as_deref(), Some("ui-test"));
        assert!(!dispatcher.is_current());
    }

    #[test]
    fn test_run_sync_inline_when_current() {
        let dispatcher = ThreadDispatcher::spawn(DispatcherKind::Script, "js-test").unwrap();
        let inner = Arc::clone(&dispatcher);
        // 嵌套的 run_sync 必须内联执行，否则会自锁
        let value = dispatcher
            .run_sync(move || inner.run_sync(|| 7).unwrap())
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let dispatcher = ThreadDispatcher::spawn(DispatcherKind::Render, "closed-test").unwrap();
        dispatcher.shutdown();
        assert!(dispatcher.is_closed());

        let err = dispatcher.run_async(|| {}).unwrap_err();
        assert_eq!(
            err,
            DispatchError::Closed {
                kind: DispatcherKind::Render
            }
        );
    }

    #[test]
    fn test_shutdown_drains_queued_tasks() {
        let dispatcher = ThreadDispatcher::spawn(DispatcherKind::Ui, "drain-test").unwrap();
        let (tx, rx) = unbounded();
        for i in 0..10 {
            let tx = tx.clone();
            dispatcher
                .run_async(move || {
                    thread::sleep(Duration::from_millis(1));
                    tx.send(i).unwrap();
                })
                .unwrap();
        }
        dispatcher.shutdown();
        assert_eq!(rx.try_iter().count(), 10);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let dispatcher = ThreadDispatcher::spawn(DispatcherKind::Render, "panic-test").unwrap();
        let (panic_tx, panic_rx) = unbounded();
        dispatcher.set_panic_handler(Arc::new(move |_, message: &str| {
            let _ = panic_tx.send(message.to_string());
        }));

        dispatcher.run_async(|| panic!("render failed")).unwrap();
        assert_eq!(dispatcher.run_sync(|| 1 + 1).unwrap(), 2);
        assert_eq!(
            panic_rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            "render failed"
        );
    }

    #[test]
    fn test_run_sync_reports_panic() {
        let dispatcher = ThreadDispatcher::spawn(DispatcherKind::Ui, "sync-panic").unwrap();
        let err = dispatcher.run_sync(|| -> i32 { panic!("bad") }).unwrap_err();
        assert!(matches!(err, DispatchError::Panicked { .. }));
    }
}
