//! 统一配置系统
//!
//! 提供TOML/JSON配置文件和环境变量覆盖

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub mod dispatch;
pub mod display;

pub use dispatch::DispatchConfig;
pub use display::DisplayConfig;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 运行时主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 调度器配置
    pub dispatch: DispatchConfig,

    /// 显示参数
    pub display: DisplayConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

use crate::{impl_default, impl_default_and_new};

impl_default_and_new!(BridgeConfig {
    dispatch: DispatchConfig::default(),
    display: DisplayConfig::default(),
    logging: LoggingConfig::default(),
});

impl BridgeConfig {
    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    ///
    /// 无法解析的值被忽略并记录警告。
    pub fn apply_env_overrides(&mut self) {
        override_from_env("BRIDGE_BACKGROUND_WORKERS", &mut self.dispatch.background_workers);
        override_from_env("BRIDGE_REFRESH_RATE", &mut self.display.refresh_rate);
        override_from_env("BRIDGE_PIXEL_RATIO", &mut self.display.density_pixel_ratio);
        override_from_env("BRIDGE_LOG_LEVEL", &mut self.logging.level);
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.dispatch.validate()?;
        self.display.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./bridge.toml
    /// 2. ./bridge.json
    /// 3. 用户配置目录下的 host_bridge/config.toml
    /// 4. 使用默认配置
    ///
    /// 找到的配置随后应用环境变量覆盖。
    pub fn load_or_default() -> Self {
        let mut config = Self::find().unwrap_or_else(|| {
            tracing::info!(target: "config", "Using default configuration");
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    fn find() -> Option<Self> {
        if let Ok(config) = Self::from_toml_file("bridge.toml") {
            tracing::info!(target: "config", "Loaded config from bridge.toml");
            return Some(config);
        }

        if let Ok(config) = Self::from_json_file("bridge.json") {
            tracing::info!(target: "config", "Loaded config from bridge.json");
            return Some(config);
        }

        let config_path = user_config_path()?;
        match Self::from_toml_file(&config_path) {
            Ok(config) => {
                tracing::info!(target: "config", "Loaded config from {:?}", config_path);
                Some(config)
            }
            Err(_) => None,
        }
    }
}

/// 用户级配置文件路径
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("host_bridge").join("config.toml"))
}

fn override_from_env<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = env::var(key) {
        match val.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(target: "config", "Ignoring invalid {key}={val}"),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 额外的过滤指令，例如 `"frame=trace"`（事件使用 `frame`、`dispatch` 等显式 target）
    pub filter: Option<String>,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    filter: None,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::ParseError(format!("Unknown log level: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.display.refresh_rate, 60.0);
        assert_eq!(config.display.density_pixel_ratio, 1.0);
    }

    #[test]
    fn test_toml_serialization() {
        let config = BridgeConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [display]
            refresh_rate = 120.0

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.display.refresh_rate, 120.0);
        assert_eq!(config.display.density_pixel_ratio, 1.0);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.dispatch, DispatchConfig::default());
    }

    #[test]
    fn test_json_serialization() {
        let config = BridgeConfig::from_json_str(r#"{"dispatch": {"background_workers": 3}}"#).unwrap();
        assert_eq!(config.dispatch.background_workers, 3);
        assert_eq!(config.dispatch.effective_background_workers(), 3);
        assert_eq!(config.dispatch.thread_name("render"), "bridge-render");
    }

    #[test]
    fn test_validation() {
        let mut config = BridgeConfig::default();
        config.display.refresh_rate = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = BridgeConfig::default();
        config.display.density_pixel_ratio = -1.0;
        assert!(config.validate().is_err());

        assert!(BridgeConfig::from_toml_str("display = 5").is_err());
    }

    #[test]
    fn test_env_overrides() {
        // 只在本测试中使用这些变量名
        env::set_var("BRIDGE_REFRESH_RATE", "90");
        env::set_var("BRIDGE_LOG_LEVEL", "WARN");
        env::set_var("BRIDGE_BACKGROUND_WORKERS", "not-a-number");

        let mut config = BridgeConfig::default();
        config.apply_env_overrides();

        env::remove_var("BRIDGE_REFRESH_RATE");
        env::remove_var("BRIDGE_LOG_LEVEL");
        env::remove_var("BRIDGE_BACKGROUND_WORKERS");

        assert_eq!(config.display.refresh_rate, 90.0);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.dispatch.background_workers, 0);
    }

    #[test]
    fn test_save_and_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");

        let mut config = BridgeConfig::new();
        config.dispatch.thread_name_prefix = "host".to_string();
        config.logging.filter = Some("frame=trace".to_string());
        config.save_toml(&path).unwrap();

        let loaded = BridgeConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(BridgeConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("Info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}
