//! 帧调度系统
//!
//! 以显示刷新率驱动周期性工作：[`Choreographer`] 订阅一个 [`VsyncSource`]，
//! 每次垂直同步时按注册顺序调用所有帧回调，并传入同一个单调时间戳（纳秒）。
//!
//! ## 组成
//!
//! - [`Choreographer`]: 回调列表与生命周期（start / stop / dispose）
//! - [`ManualVsync`] / [`TimerVsync`]: 手动驱动与定时器驱动的垂直同步源
//! - [`ChoreographerObject`] / [`FrameCallbackListener`]: 暴露给脚本的宿主对象

mod bindings;
mod choreographer;
mod vsync;

pub use bindings::{ChoreographerObject, FrameCallbackListener};
pub use choreographer::{Choreographer, FrameCallback, FrameCallbackToken, FrameInfo};
pub use vsync::{FrameTick, ManualVsync, TimerVsync, VsyncSink, VsyncSource, VsyncSubscription};
