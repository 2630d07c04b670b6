//! 动画播放器组件与播放系统

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::clip::AnimationClip;
use crate::config::PlaybackConfig;

/// 到达末帧后的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopMode {
    /// 回到第 0 帧继续播放
    #[default]
    Wrap,
    /// 停在最后一帧
    Clamp,
}

/// 动画播放器组件 (贫血模型 - 纯数据结构)
///
/// 业务逻辑在 `AnimationService` 中：
/// ```rust,ignore
/// use game_engine_animation::{AnimationPlayer, AnimationService};
///
/// let mut player = AnimationPlayer::default();
/// AnimationService::play(&mut player, clip);
/// AnimationService::update(&mut player, delta_time);
/// let pose = AnimationService::current_pose(&player);
/// ```
#[derive(Component, Debug, Clone)]
pub struct AnimationPlayer {
    /// 当前播放的动画片段（与其它播放器共享）
    pub current_clip: Option<Arc<AnimationClip>>,
    /// 当前播放时间 (秒)
    pub current_time: f32,
    /// 当前帧索引，总在 `[0, frame_count)` 内
    pub current_frame: usize,
    /// 播放速度 (1.0 = 正常速度)
    pub speed: f32,
    /// 是否正在播放
    pub playing: bool,
    /// 循环方式
    pub loop_mode: LoopMode,
}

impl Default for AnimationPlayer {
    fn default() -> Self {
        Self {
            current_clip: None,
            current_time: 0.0,
            current_frame: 0,
            speed: 1.0,
            playing: false,
            loop_mode: LoopMode::Wrap,
        }
    }
}

impl AnimationPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用配置中的播放速度与循环方式
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            speed: config.speed,
            loop_mode: config.loop_mode,
            ..Self::default()
        }
    }
}

/// 每次更新推进的时间
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlaybackTime {
    pub delta_seconds: f32,
}

/// 播放系统 - 推进所有动画播放器
///
/// 使用 AnimationService 执行业务逻辑
pub fn animation_playback_system(
    time: Res<PlaybackTime>,
    mut query: Query<&mut AnimationPlayer>,
) {
    for mut player in query.iter_mut() {
        super::service::AnimationService::update(&mut player, time.delta_seconds);
    }
}
