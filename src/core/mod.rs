//! 核心模块
//!
//! 包含运行时的核心定义：
//! - `error` - 错误类型定义
//! - `macros` - 配置默认值宏

pub mod error;
pub mod macros;

// 重新导出错误类型
pub use error::{
    BindingError, BindingResult, DispatchError, DispatchResult, FrameError, FrameResult,
    NativeError, NativeResult, PropertyAccess,
};
