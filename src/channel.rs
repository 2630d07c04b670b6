//! 动画通道
//!
//! 每个动画片段对每个被驱动节点保存三条相互独立的关键帧轨道
//! （平移、旋转、缩放），长度和时间戳可以各不相同。

use glam::{Quat, Vec3};

use crate::error::{AnimationError, AnimationResult};
use crate::import::{AnimationDesc, ChannelDesc};
use crate::keyframe::{is_time_ascending, KeySampling, Keyframe, KeyframeTrack};

/// 单个节点的动画通道
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationChannel {
    /// 目标节点名称
    pub target_node_name: String,
    /// 平移轨道
    pub translation: KeyframeTrack<Vec3>,
    /// 旋转轨道
    pub rotation: KeyframeTrack<Quat>,
    /// 缩放轨道
    pub scale: KeyframeTrack<Vec3>,
}

impl AnimationChannel {
    pub fn new(target_node_name: impl Into<String>) -> Self {
        Self {
            target_node_name: target_node_name.into(),
            translation: KeyframeTrack::new(),
            rotation: KeyframeTrack::new(),
            scale: KeyframeTrack::new(),
        }
    }

    /// 从原始描述构建并校验
    pub fn from_desc(desc: &ChannelDesc) -> AnimationResult<Self> {
        let target = desc.target_node_name.as_str();

        check_keys(target, "translation", &desc.translation_keys, |v| {
            v.is_finite()
        })?;
        check_keys(target, "rotation", &desc.rotation_keys, |q| {
            q.is_finite() && q.length() > 1e-6
        })?;
        check_keys(target, "scale", &desc.scale_keys, |v| v.is_finite())?;

        Ok(Self {
            target_node_name: desc.target_node_name.clone(),
            translation: KeyframeTrack::from_keyframes(desc.translation_keys.clone()),
            rotation: KeyframeTrack::from_keyframes(desc.rotation_keys.clone()),
            scale: KeyframeTrack::from_keyframes(desc.scale_keys.clone()),
        })
    }

    /// 三条轨道中最晚的关键帧时间戳
    pub fn last_key_time(&self) -> Option<f32> {
        [
            self.translation.last_time(),
            self.rotation.last_time(),
            self.scale.last_time(),
        ]
        .into_iter()
        .flatten()
        .reduce(f32::max)
    }

    /// 三条轨道中最长的关键帧数
    pub fn max_key_count(&self) -> usize {
        self.translation
            .len()
            .max(self.rotation.len())
            .max(self.scale.len())
    }
}

fn check_keys<T>(
    target: &str,
    kind: &str,
    keys: &[Keyframe<T>],
    valid: impl Fn(&T) -> bool,
) -> AnimationResult<()> {
    if let Some(bad) = keys.iter().position(|k| !valid(&k.value)) {
        return Err(AnimationError::InvalidKeyframe {
            target: target.to_string(),
            reason: format!("{} key {} has an invalid value", kind, bad),
        });
    }
    if !is_time_ascending(keys) {
        return Err(AnimationError::InvalidKeyframe {
            target: target.to_string(),
            reason: format!("{} keys are not in ascending time order", kind),
        });
    }
    Ok(())
}

/// 一个动画的全部通道
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationChannelSet {
    pub name: String,
    /// 帧率；None 时由配置提供默认值
    pub frames_per_second: Option<f32>,
    /// 显式帧数
    pub frame_count: Option<usize>,
    pub channels: Vec<AnimationChannel>,
}

impl AnimationChannelSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames_per_second: None,
            frame_count: None,
            channels: Vec::new(),
        }
    }

    /// 从原始动画描述构建
    pub fn from_desc(desc: &AnimationDesc) -> AnimationResult<Self> {
        let channels = desc
            .channels
            .iter()
            .map(AnimationChannel::from_desc)
            .collect::<AnimationResult<Vec<_>>>()?;

        Ok(Self {
            name: desc.name.clone(),
            frames_per_second: desc.frame_rate,
            frame_count: desc.frame_count,
            channels,
        })
    }

    pub fn add_channel(&mut self, channel: AnimationChannel) {
        self.channels.push(channel);
    }

    /// 片段帧数，至少为 1
    ///
    /// 显式值（>= 1）优先。否则按索引采样时取最长关键帧列表，
    /// 按时间戳采样时取 `floor(最大时间戳) + 1`，保证最后一个关键帧能被采到。
    pub fn effective_frame_count(&self, sampling: KeySampling) -> usize {
        if let Some(count) = self.frame_count.filter(|&count| count >= 1) {
            return count;
        }
        let derived = match sampling {
            KeySampling::Index => self
                .channels
                .iter()
                .map(AnimationChannel::max_key_count)
                .max()
                .unwrap_or(0),
            KeySampling::Timestamp => self
                .channels
                .iter()
                .filter_map(AnimationChannel::last_key_time)
                .reduce(f32::max)
                .map_or(0, |t| t.max(0.0).floor() as usize + 1),
        };
        derived.max(1)
    }
}
