//! 核心宏定义
//!
//! 配置结构体的默认值声明

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// use host_bridge::impl_default;
///
/// struct Viewport {
///     width: u32,
///     scale: f32,
/// }
///
/// impl_default!(Viewport {
///     width: 800,
///     scale: 1.0,
/// });
///
/// assert_eq!(Viewport::default().width, 800);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

/// 同时实现Default和new()的宏
#[macro_export]
macro_rules! impl_default_and_new {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        $crate::impl_default!($struct_name {
            $($field: $value),*
        });

        impl $struct_name {
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    struct Limits {
        max_tasks: usize,
        label: String,
    }

    impl_default_and_new!(Limits {
        max_tasks: 64,
        label: String::from("pool"),
    });

    #[test]
    fn test_impl_default_and_new() {
        let a = Limits::default();
        let b = Limits::new();

        assert_eq!(a.max_tasks, 64);
        assert_eq!(a.label, "pool");
        assert_eq!(b.max_tasks, 64);
    }
}
