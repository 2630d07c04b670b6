//! 预计算的动画片段

use std::sync::Arc;

use crate::builder::FrameMatrixBuilder;
use crate::channel::AnimationChannelSet;
use crate::config::AnimationConfig;
use crate::error::{AnimationError, AnimationResult};
use crate::node::NodeTree;
use crate::pose::AnimatedPose;
use crate::skeleton::SkeletonModel;

/// 动画片段
///
/// 加载时一次性预计算全部帧，之后不可变；播放只读取帧索引。
/// 内存开销为 `frame_count * joint_count` 个矩阵。
#[derive(Debug, Clone)]
pub struct AnimationClip {
    /// 动画名称
    name: String,
    /// 帧率
    frames_per_second: f32,
    joint_count: usize,
    /// 逐帧姿态，长度至少为 1
    poses: Vec<AnimatedPose>,
}

impl AnimationClip {
    /// 用构建器预计算全部帧
    pub fn build(builder: &FrameMatrixBuilder, frames_per_second: f32) -> AnimationResult<Self> {
        if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
            return Err(AnimationError::InvalidClip(format!(
                "clip '{}' has invalid frame rate {}",
                builder.clip_name(),
                frames_per_second
            )));
        }

        let poses = builder.build_all()?;

        tracing::info!(
            target: "animation",
            "Built clip '{}': {} frames x {} joints at {} fps",
            builder.clip_name(),
            poses.len(),
            builder.joint_count(),
            frames_per_second
        );

        Ok(Self {
            name: builder.clip_name().to_string(),
            frames_per_second,
            joint_count: builder.joint_count(),
            poses,
        })
    }

    /// 从通道集直接构建；未给出帧率时使用配置中的默认帧率
    pub fn from_channels(
        skeleton: Arc<SkeletonModel>,
        nodes: Arc<NodeTree>,
        channels: &AnimationChannelSet,
        config: &AnimationConfig,
    ) -> AnimationResult<Self> {
        let frames_per_second = channels
            .frames_per_second
            .unwrap_or(config.playback.default_frames_per_second);
        let builder = FrameMatrixBuilder::new(skeleton, nodes, channels, config)?;
        Self::build(&builder, frames_per_second)
    }

    /// 只有一帧绑定姿态的片段
    pub fn bind_pose(name: impl Into<String>, joint_count: usize) -> Self {
        Self {
            name: name.into(),
            frames_per_second: 1.0,
            joint_count,
            poses: vec![AnimatedPose::identity(joint_count)],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_count(&self) -> usize {
        self.poses.len()
    }

    pub fn frames_per_second(&self) -> f32 {
        self.frames_per_second
    }

    /// 持续时间 (秒)
    pub fn duration(&self) -> f32 {
        self.poses.len() as f32 / self.frames_per_second
    }

    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    pub fn poses(&self) -> &[AnimatedPose] {
        &self.poses
    }

    /// 获取指定帧的姿态；越界直接报错，不做钳制
    pub fn pose_at(&self, frame: usize) -> AnimationResult<&AnimatedPose> {
        self.poses
            .get(frame)
            .ok_or(AnimationError::FrameIndexOutOfRange {
                frame,
                frame_count: self.poses.len(),
            })
    }
}
