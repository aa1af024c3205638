use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 显示参数
///
/// 没有真实显示设备时（无头宿主）由配置提供。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// 刷新率（Hz）
    pub refresh_rate: f32,

    /// 像素密度比
    pub density_pixel_ratio: f32,
}

impl_default!(DisplayConfig {
    refresh_rate: 60.0,
    density_pixel_ratio: 1.0,
});

impl DisplayConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.refresh_rate > 0.0 && self.refresh_rate <= 1000.0) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid refresh rate: {}",
                self.refresh_rate
            )));
        }
        if !(self.density_pixel_ratio > 0.0 && self.density_pixel_ratio.is_finite()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid pixel ratio: {}",
                self.density_pixel_ratio
            )));
        }
        Ok(())
    }
}
