//! 内部宏定义

/// 为配置结构体实现 `Default`
///
/// 使用示例:
/// ```rust
/// use game_engine_animation::impl_default;
///
/// struct PlaybackDefaults {
///     fps: f32,
///     looping: bool,
/// }
///
/// impl_default!(PlaybackDefaults {
///     fps: 24.0,
///     looping: true,
/// });
///
/// assert_eq!(PlaybackDefaults::default().fps, 24.0);
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
