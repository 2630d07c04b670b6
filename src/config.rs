//! 动画核心配置
//!
//! 提供TOML/JSON配置文件、环境变量覆盖和日志初始化

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::impl_default;
use crate::keyframe::KeySampling;
use crate::player::LoopMode;
use crate::skinning::{NormalSkinning, Winding};

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

/// 动画核心主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// 关键帧采样方式
    #[serde(default)]
    pub sampling: KeySampling,

    /// 是否用骨架根变换的逆补偿导入层级中的全局场景变换
    #[serde(default = "default_true")]
    pub compensate_root_transform: bool,

    /// 三角形环绕方向（决定绑定姿态法线朝向）
    #[serde(default)]
    pub winding: Winding,

    /// CPU 蒙皮时法线的变换方式
    #[serde(default)]
    pub normal_skinning: NormalSkinning,

    /// 播放配置
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

impl_default!(AnimationConfig {
    sampling: KeySampling::default(),
    compensate_root_transform: true,
    winding: Winding::default(),
    normal_skinning: NormalSkinning::default(),
    playback: PlaybackConfig::default(),
    logging: LoggingConfig::default(),
});

impl AnimationConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
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
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("ANIMATION_SAMPLING") {
            match val.to_ascii_lowercase().as_str() {
                "index" => self.sampling = KeySampling::Index,
                "timestamp" => self.sampling = KeySampling::Timestamp,
                other => {
                    tracing::warn!(target: "animation", "Ignoring unknown ANIMATION_SAMPLING value '{}'", other)
                }
            }
        }
        if let Ok(val) = env::var("ANIMATION_DEFAULT_FPS") {
            if let Ok(fps) = val.parse() {
                self.playback.default_frames_per_second = fps;
            }
        }
        if let Ok(val) = env::var("ANIMATION_LOOP_MODE") {
            match val.to_ascii_lowercase().as_str() {
                "wrap" => self.playback.loop_mode = LoopMode::Wrap,
                "clamp" => self.playback.loop_mode = LoopMode::Clamp,
                other => {
                    tracing::warn!(target: "animation", "Ignoring unknown ANIMATION_LOOP_MODE value '{}'", other)
                }
            }
        }
        if let Ok(val) = env::var("ANIMATION_PLAYBACK_SPEED") {
            if let Ok(speed) = val.parse() {
                self.playback.speed = speed;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.playback.validate()
    }
}

/// 播放配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// 导入数据未给出帧率时使用的帧率
    pub default_frames_per_second: f32,

    /// 到达末帧后的行为
    pub loop_mode: LoopMode,

    /// 播放速度 (1.0 = 正常速度)
    pub speed: f32,
}

impl_default!(PlaybackConfig {
    default_frames_per_second: 24.0,
    loop_mode: LoopMode::Wrap,
    speed: 1.0,
});

impl PlaybackConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.default_frames_per_second.is_finite() || self.default_frames_per_second <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Invalid default frames per second".to_string(),
            ));
        }
        if !self.speed.is_finite() || self.speed < 0.0 {
            return Err(ConfigError::ValidationError(
                "Invalid playback speed".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 初始化日志系统
///
/// 配置tracing日志框架。`RUST_LOG` 环境变量优先于配置中的级别；
/// 重复调用是无害的。
pub fn init_logging(config: &LoggingConfig) {
    if !config.log_to_console {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_directive()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    tracing::debug!(target: "animation", "Logging initialized at {:?}", config.level);
}
