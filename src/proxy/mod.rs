//! 平台代理
//!
//! 平台层向运行时提供的全部外部依赖：脚本运行时句柄、四个执行上下文的调度器、
//! 显示参数以及帧调度器工厂。
//!
//! [`HeadlessProxy`] 是不依赖任何窗口系统的参考实现，脚本、UI、渲染上下文各占一个线程，
//! 后台上下文是一个线程池。

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::binding::CallContext;
use crate::config::{BridgeConfig, ConfigError, DisplayConfig};
use crate::core::FrameResult;
use crate::dispatch::{Dispatcher, DispatcherKind, PoolDispatcher, ThreadDispatcher};
use crate::frame::{Choreographer, TimerVsync};
use crate::runtime::ScriptRuntime;

/// 代理构建错误
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] io::Error),
}

/// 平台代理抽象
pub trait PlatformProxy: Send + Sync {
    /// 脚本运行时句柄
    fn runtime(&self) -> &Arc<ScriptRuntime>;

    /// 脚本线程调度器
    fn script(&self) -> Arc<dyn Dispatcher>;

    /// UI 线程调度器
    fn ui(&self) -> Arc<dyn Dispatcher>;

    /// 渲染线程调度器
    fn render(&self) -> Arc<dyn Dispatcher>;

    /// 后台调度器
    fn background(&self) -> Arc<dyn Dispatcher>;

    /// 显示刷新率（Hz）
    fn display_refresh_rate(&self) -> f32;

    /// 显示像素密度比
    fn density_pixel_ratio(&self) -> f32;

    /// 创建一个按显示刷新节奏驱动的帧调度器
    fn create_choreographer(&self) -> FrameResult<Choreographer>;

    /// 按类型取调度器
    fn dispatcher(&self, kind: DispatcherKind) -> Arc<dyn Dispatcher> {
        match kind {
            DispatcherKind::Script => self.script(),
            DispatcherKind::Ui => self.ui(),
            DispatcherKind::Render => self.render(),
            DispatcherKind::Background => self.background(),
        }
    }

    /// 宿主对象调用所需的上下文
    fn call_context(&self) -> CallContext {
        CallContext::new(Arc::clone(self.runtime()), self.script(), self.background())
    }
}

/// 无头平台代理
///
/// # 示例
///
/// ```rust
/// use host_bridge::config::BridgeConfig;
/// use host_bridge::dispatch::DispatcherExt;
/// use host_bridge::proxy::{HeadlessProxy, PlatformProxy};
///
/// let proxy = HeadlessProxy::new(&BridgeConfig::default()).unwrap();
/// let runtime = proxy.runtime().clone();
/// let attached = proxy.script().run_sync(move || runtime.is_attached()).unwrap();
/// assert!(attached);
/// proxy.shutdown();
/// ```
pub struct HeadlessProxy {
    runtime: Arc<ScriptRuntime>,
    script: Arc<ThreadDispatcher>,
    ui: Arc<ThreadDispatcher>,
    render: Arc<ThreadDispatcher>,
    background: Arc<PoolDispatcher>,
    display: DisplayConfig,
}

impl HeadlessProxy {
    /// 按配置创建代理并启动全部调度线程
    ///
    /// 脚本线程在整个生命周期内保持附加到运行时。
    pub fn new(config: &BridgeConfig) -> Result<Self, ProxyError> {
        config.validate()?;

        let dispatch = &config.dispatch;
        let runtime = ScriptRuntime::new();

        let rt = Arc::clone(&runtime);
        let script = ThreadDispatcher::spawn_with_setup(
            DispatcherKind::Script,
            dispatch.thread_name("js"),
            move || rt.attach(),
        )?;
        let ui = ThreadDispatcher::spawn(DispatcherKind::Ui, dispatch.thread_name("ui"))?;
        let render =
            ThreadDispatcher::spawn(DispatcherKind::Render, dispatch.thread_name("render"))?;
        let background = PoolDispatcher::new(
            dispatch.effective_background_workers(),
            &dispatch.thread_name("worker"),
        )?;

        tracing::info!(
            runtime = runtime.id(),
            workers = background.worker_count(),
            refresh_rate = config.display.refresh_rate,
            "headless proxy ready"
        );

        Ok(Self {
            runtime,
            script,
            ui,
            render,
            background,
            display: config.display.clone(),
        })
    }

    /// 关闭全部调度器
    ///
    /// 已入队的任务仍会执行完毕。
    pub fn shutdown(&self) {
        self.background.shutdown();
        self.render.shutdown();
        self.ui.shutdown();
        self.script.shutdown();
    }
}

impl PlatformProxy for HeadlessProxy {
    fn runtime(&self) -> &Arc<ScriptRuntime> {
        &self.runtime
    }

    fn script(&self) -> Arc<dyn Dispatcher> {
        self.script.clone()
    }

    fn ui(&self) -> Arc<dyn Dispatcher> {
        self.ui.clone()
    }

    fn render(&self) -> Arc<dyn Dispatcher> {
        self.render.clone()
    }

    fn background(&self) -> Arc<dyn Dispatcher> {
        self.background.clone()
    }

    fn display_refresh_rate(&self) -> f32 {
        self.display.refresh_rate
    }

    fn density_pixel_ratio(&self) -> f32 {
        self.display.density_pixel_ratio
    }

    fn create_choreographer(&self) -> FrameResult<Choreographer> {
        let vsync = TimerVsync::new(self.display.refresh_rate, self.render())?;
        Ok(Choreographer::new(Arc::new(vsync)))
    }
}

impl Drop for HeadlessProxy {
    fn drop(&mut self) {
        self.shutdown();
    }
}
