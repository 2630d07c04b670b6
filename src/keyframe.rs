//! 关键帧与采样

use serde::{Deserialize, Serialize};

/// 关键帧采样方式
///
/// 两种方式都不在关键帧之间插值，超出末帧时钳制到最后一个关键帧。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeySampling {
    /// 关键帧索引等于帧索引
    #[default]
    Index,
    /// 阶梯采样：取时间戳不大于帧索引的最后一个关键帧
    Timestamp,
}

/// 关键帧
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    /// 时间 (帧)
    pub time: f32,
    /// 值
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// 关键帧轨道
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack<T> {
    /// 关键帧列表（按时间升序）
    keyframes: Vec<Keyframe<T>>,
}

impl<T> Default for KeyframeTrack<T> {
    fn default() -> Self {
        Self {
            keyframes: Vec::new(),
        }
    }
}

impl<T: Copy> KeyframeTrack<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接使用已排序的关键帧列表
    pub fn from_keyframes(keyframes: Vec<Keyframe<T>>) -> Self {
        Self { keyframes }
    }

    /// 添加关键帧
    pub fn add_keyframe(&mut self, time: f32, value: T) {
        // 按时间排序插入，同一时间的关键帧保持插入顺序
        let index = self.keyframes.partition_point(|k| k.time <= time);
        self.keyframes.insert(index, Keyframe { time, value });
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    /// 时间戳是否有限且非递减
    pub fn is_time_ascending(&self) -> bool {
        is_time_ascending(&self.keyframes)
    }

    /// 最后一个关键帧的时间戳
    pub fn last_time(&self) -> Option<f32> {
        self.keyframes.last().map(|k| k.time)
    }

    /// 按索引采样，超出末尾时钳制到最后一个关键帧
    pub fn sample_index(&self, frame: usize) -> Option<T> {
        let last = self.keyframes.len().checked_sub(1)?;
        Some(self.keyframes[frame.min(last)].value)
    }

    /// 阶梯采样
    pub fn sample_step(&self, time: f32) -> Option<T> {
        let first = self.keyframes.first()?;
        let index = self.keyframes.partition_point(|k| k.time <= time);
        if index == 0 {
            return Some(first.value);
        }
        Some(self.keyframes[index - 1].value)
    }

    /// 按配置的采样方式取第 `frame` 帧的值
    pub fn sample(&self, frame: usize, sampling: KeySampling) -> Option<T> {
        match sampling {
            KeySampling::Index => self.sample_index(frame),
            KeySampling::Timestamp => self.sample_step(frame as f32),
        }
    }
}

/// 关键帧列表的时间戳是否有限且非递减
pub fn is_time_ascending<T>(keys: &[Keyframe<T>]) -> bool {
    keys.iter().all(|k| k.time.is_finite()) && keys.windows(2).all(|w| w[0].time <= w[1].time)
}
