//! 动画播放服务层
//!
//! 遵循贫血模型，将播放逻辑封装在Service中：
//! - AnimationPlayer (Component): 纯数据结构
//! - AnimationService (Service): 封装业务逻辑
//! - animation_playback_system (System): 调度编排

use std::sync::Arc;

use super::clip::AnimationClip;
use super::player::{AnimationPlayer, LoopMode};
use crate::error::{AnimationError, AnimationResult};
use crate::pose::AnimatedPose;

/// 动画播放服务
pub struct AnimationService;

impl AnimationService {
    /// 播放动画片段
    pub fn play(player: &mut AnimationPlayer, clip: Arc<AnimationClip>) {
        tracing::debug!(target: "animation", "Playing clip '{}'", clip.name());
        player.current_clip = Some(clip);
        player.current_time = 0.0;
        player.current_frame = 0;
        player.playing = true;
    }

    /// 暂停播放
    pub fn pause(player: &mut AnimationPlayer) {
        player.playing = false;
    }

    /// 恢复播放
    pub fn resume(player: &mut AnimationPlayer) {
        player.playing = true;
    }

    /// 停止播放并重置
    pub fn stop(player: &mut AnimationPlayer) {
        player.playing = false;
        player.current_time = 0.0;
        player.current_frame = 0;
    }

    /// 设置播放速度（负值按 0 处理）
    pub fn set_speed(player: &mut AnimationPlayer, speed: f32) {
        player.speed = speed.max(0.0);
    }

    /// 跳转到指定帧
    pub fn seek_frame(player: &mut AnimationPlayer, frame: usize) -> AnimationResult<()> {
        let Some(clip) = &player.current_clip else {
            return Err(AnimationError::InvalidClip(
                "no clip is assigned to the player".to_string(),
            ));
        };
        if frame >= clip.frame_count() {
            return Err(AnimationError::FrameIndexOutOfRange {
                frame,
                frame_count: clip.frame_count(),
            });
        }
        player.current_time = frame as f32 / clip.frames_per_second();
        player.current_frame = frame;
        Ok(())
    }

    /// 更新播放状态
    pub fn update(player: &mut AnimationPlayer, delta_time: f32) {
        if !player.playing {
            return;
        }

        let Some(clip) = &player.current_clip else {
            return;
        };

        let duration = clip.duration();
        let last_frame = clip.frame_count() - 1;
        player.current_time += delta_time * player.speed;

        if player.current_time >= duration {
            match player.loop_mode {
                LoopMode::Wrap => {
                    player.current_time %= duration;
                }
                LoopMode::Clamp => {
                    player.current_time = duration;
                    player.current_frame = last_frame;
                    player.playing = false;
                    return;
                }
            }
        }

        let frame = (player.current_time * clip.frames_per_second()).floor() as usize;
        player.current_frame = frame.min(last_frame);
    }

    /// 当前帧的骨骼矩阵
    pub fn current_pose(player: &AnimationPlayer) -> Option<&AnimatedPose> {
        player
            .current_clip
            .as_ref()
            .and_then(|clip| clip.poses().get(player.current_frame))
    }

    /// 获取当前播放进度 (0.0 - 1.0)
    pub fn progress(player: &AnimationPlayer) -> f32 {
        if let Some(clip) = &player.current_clip {
            let duration = clip.duration();
            if duration > 0.0 {
                return player.current_time / duration;
            }
        }
        0.0
    }

    /// 检查动画是否播放完成
    pub fn is_finished(player: &AnimationPlayer) -> bool {
        if let Some(clip) = &player.current_clip {
            if player.loop_mode == LoopMode::Clamp && player.current_time >= clip.duration() {
                return true;
            }
        }
        false
    }
}
