use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;

use super::{
    current_dispatcher, enter_dispatcher, next_dispatcher_id, Dispatcher, DispatcherKind,
    PanicHandler, PanicPolicy, Task,
};
use crate::core::{DispatchError, DispatchResult};

/// 关闭时等待运行时回收线程的上限
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// 后台线程池调度器
///
/// 基于 tokio 多线程运行时，每个任务经 `spawn_blocking` 进入阻塞线程池。
/// 阻塞线程数与工作线程数相同，任务按提交顺序出队；
/// 只有一个工作线程时，执行顺序与提交顺序完全一致。
///
/// 池中的任务不得直接访问脚本状态，需要时应通过脚本调度器跳回。
pub struct PoolDispatcher {
    id: u64,
    handle: RwLock<Option<Handle>>,
    runtime: Mutex<Option<Runtime>>,
    pending: Arc<watch::Sender<usize>>,
    worker_count: usize,
    policy: Arc<PanicPolicy>,
}

/// 已入队但尚未结束的任务计数，任务执行完或被丢弃时减一
struct PendingGuard(Arc<watch::Sender<usize>>);

impl PendingGuard {
    fn enter(pending: &Arc<watch::Sender<usize>>) -> Self {
        pending.send_modify(|count| *count += 1);
        Self(Arc::clone(pending))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}

impl PoolDispatcher {
    /// 创建后台线程池
    ///
    /// # 参数
    /// - `worker_threads`: 工作线程数量，0 表示使用 CPU 核心数
    /// - `name_prefix`: 线程名前缀，线程名为 `{prefix}-{index}`
    pub fn new(worker_threads: usize, name_prefix: &str) -> io::Result<Arc<Self>> {
        let workers = if worker_threads == 0 {
            num_cpus::get()
        } else {
            worker_threads
        };

        let id = next_dispatcher_id();
        let prefix = name_prefix.to_string();
        let index = AtomicUsize::new(0);

        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name_fn(move || format!("{prefix}-{}", index.fetch_add(1, Ordering::Relaxed)))
            .on_thread_start(move || enter_dispatcher(id))
            .enable_all()
            .build()?;

        tracing::debug!(target: "dispatch", workers, "background pool started");

        let (pending, _) = watch::channel(0usize);
        Ok(Arc::new(Self {
            id,
            handle: RwLock::new(Some(runtime.handle().clone())),
            runtime: Mutex::new(Some(runtime)),
            pending: Arc::new(pending),
            worker_count: workers,
            policy: Arc::new(PanicPolicy::default()),
        }))
    }

    /// 获取工作线程数
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// 等待已入队的任务全部结束
    fn drain(&self) {
        let mut pending = self.pending.subscribe();
        let _ = futures::executor::block_on(pending.wait_for(|count| *count == 0));
    }

    fn stop_runtime(&self, graceful: bool) {
        let runtime = self
            .runtime
            .lock()
            .ok()
            .and_then(|mut runtime| runtime.take());
        let Some(runtime) = runtime else {
            return;
        };

        // 在其他运行时内部不能阻塞等待
        if graceful && Handle::try_current().is_err() {
            runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
        } else {
            runtime.shutdown_background();
        }
        tracing::debug!(target: "dispatch", "background pool stopped");
    }
}

impl Dispatcher for PoolDispatcher {
    fn kind(&self) -> DispatcherKind {
        DispatcherKind::Background
    }

    fn dispatch(&self, task: Task) -> DispatchResult<()> {
        let closed = DispatchError::Closed {
            kind: DispatcherKind::Background,
        };
        let handle = self.handle.read().map_err(|_| closed.clone())?;
        let Some(handle) = handle.as_ref() else {
            return Err(closed);
        };

        let guard = PendingGuard::enter(&self.pending);
        let policy = Arc::clone(&self.policy);
        handle.spawn_blocking(move || {
            let _guard = guard;
            policy.run(DispatcherKind::Background, task);
        });
        Ok(())
    }

    fn is_current(&self) -> bool {
        current_dispatcher() == self.id
    }

    fn shutdown(&self) {
        if let Ok(mut handle) = self.handle.write() {
            handle.take();
        }
        // 工作线程上关闭时只关闭入口，剩余任务继续执行，运行时在 drop 时回收
        if self.is_current() {
            return;
        }

        self.drain();
        self.stop_runtime(true);
    }

    fn is_closed(&self) -> bool {
        self.handle
            .read()
            .map(|handle| handle.is_none())
            .unwrap_or(true)
    }

    fn set_panic_handler(&self, handler: PanicHandler) {
        self.policy.set_handler(handler);
    }
}

impl Drop for PoolDispatcher {
    fn drop(&mut self) {
        self.shutdown();
        self.stop_runtime(false);
    }
}
