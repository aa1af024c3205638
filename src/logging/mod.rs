//! 日志初始化

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 构建日志过滤器
///
/// `RUST_LOG` 优先；未设置或无法解析时使用配置中的级别和额外指令。
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(config)))
}

fn directives(config: &LoggingConfig) -> String {
    match config.filter.as_deref().map(str::trim) {
        Some(extra) if !extra.is_empty() => format!("{},{}", config.level, extra),
        _ => config.level.to_string(),
    }
}

/// 初始化日志系统
///
/// 安装 `tracing_subscriber::fmt` 订阅者。可以重复调用；
/// 已经安装过全局订阅者时返回 `false`。
pub fn init_logging(config: &LoggingConfig) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config))
        .with_thread_names(true)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(level = %config.level, "logging initialized");
    }
    installed
}
