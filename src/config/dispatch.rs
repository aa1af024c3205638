use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 调度器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// 后台线程池的工作线程数，0 表示使用 CPU 核心数
    pub background_workers: usize,

    /// 工作线程名前缀
    pub thread_name_prefix: String,
}

impl_default!(DispatchConfig {
    background_workers: 0,
    thread_name_prefix: "bridge".to_string(),
});

impl DispatchConfig {
    /// 实际使用的后台线程数
    pub fn effective_background_workers(&self) -> usize {
        if self.background_workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.background_workers
        }
    }

    /// 按上下文名称生成线程名
    pub fn thread_name(&self, context: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, context)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.background_workers > 1024 {
            return Err(ConfigError::ValidationError(format!(
                "Too many background workers: {}",
                self.background_workers
            )));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Thread name prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
