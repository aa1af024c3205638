//! 统一错误处理模块
//!
//! 提供绑定运行时范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **绑定层错误** (`BindingError`): 脚本调用边界上的查找、参数数量、类型转换错误
//! - **调度层错误** (`DispatchError`): 向已关闭的调度器提交任务等
//! - **原生错误** (`NativeError`): 被绑定的原生代码抛出的错误，保留原始消息
//! - **帧调度错误** (`FrameError`): Choreographer 生命周期错误
//!
//! 类型未注册（无转换条目）的错误在编译期由 trait 约束拒绝，因此这里没有对应的运行时变体。

use std::fmt;

use thiserror::Error;

use crate::dispatch::DispatcherKind;

/// 绑定层错误
///
/// 所有变体最终都会以脚本可见的异常或 Promise 拒绝的形式交还给脚本调用方。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("{object}.{member} is already registered")]
    DuplicateMember { object: String, member: String },

    #[error("{object} has no member named '{member}'")]
    UnknownMember { object: String, member: String },

    #[error("{object}.{member} expected {expected} argument(s), but received {actual}")]
    ArityMismatch {
        object: String,
        member: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch: expected {expected}, but received {received}")]
    TypeMismatch { expected: String, received: String },

    #[error("{object}.{member} cannot be {access}")]
    PropertyAccess {
        object: String,
        member: String,
        access: PropertyAccess,
    },

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("{0}")]
    Native(#[from] NativeError),

    #[error("Deferred result was dropped before it completed")]
    Abandoned,

    #[error("Runtime #{runtime} was accessed from a thread that is not attached to it")]
    Detached { runtime: u64 },
}

impl BindingError {
    pub fn type_mismatch(expected: impl Into<String>, received: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            received: received.into(),
        }
    }
}

/// 属性访问方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccess {
    Read,
    Written,
}

impl fmt::Display for PropertyAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyAccess::Read => f.write_str("read"),
            PropertyAccess::Written => f.write_str("written"),
        }
    }
}

/// 调度器错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("{kind} dispatcher is closed")]
    Closed { kind: DispatcherKind },

    #[error("Task panicked on {kind} dispatcher: {message}")]
    Panicked {
        kind: DispatcherKind,
        message: String,
    },
}

/// 原生代码错误
///
/// 由被绑定的原生函数返回，消息原样传递给脚本调用方。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NativeError {
    message: String,
}

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// 从任意错误类型构造，保留其 `Display` 文本
    pub fn from_err<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for NativeError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for NativeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// 帧调度错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Choreographer has been disposed")]
    Disposed,

    #[error("Vsync source error: {0}")]
    Vsync(String),
}

/// 脚本调用 Choreographer 方法失败时按原生错误抛出
impl From<FrameError> for BindingError {
    fn from(err: FrameError) -> Self {
        BindingError::Native(NativeError::from_err(&err))
    }
}

/// 结果类型别名
pub type BindingResult<T> = Result<T, BindingError>;
pub type DispatchResult<T> = Result<T, DispatchError>;
pub type NativeResult<T> = Result<T, NativeError>;
pub type FrameResult<T> = Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let dispatch_err = DispatchError::Closed {
            kind: DispatcherKind::Background,
        };
        let binding_err: BindingError = dispatch_err.into();
        assert!(matches!(binding_err, BindingError::Dispatch(_)));

        let native: BindingError = NativeError::new("surface lost").into();
        assert_eq!(native.to_string(), "surface lost");
    }

    #[test]
    fn test_error_display() {
        let err = BindingError::ArityMismatch {
            object: "Renderer".to_string(),
            member: "render".to_string(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Renderer.render expected 1 argument(s), but received 2"
        );

        let err = BindingError::type_mismatch("Material", "Camera");
        assert_eq!(
            err.to_string(),
            "Type mismatch: expected Material, but received Camera"
        );

        let err = BindingError::PropertyAccess {
            object: "Test".to_string(),
            member: "id".to_string(),
            access: PropertyAccess::Written,
        };
        assert_eq!(err.to_string(), "Test.id cannot be written");
    }

    #[test]
    fn test_native_error_from_std_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "asset missing");
        assert_eq!(NativeError::from_err(&io).message(), "asset missing");
    }
}
