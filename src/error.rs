//! 骨骼动画错误类型
//!
//! 构建期错误会中止受影响单元（骨骼、动画片段）的整体构建，
//! 不会返回半成品；播放期的越界访问属于调用方违约，直接报错而不是钳制。

use thiserror::Error;

/// 骨骼动画核心错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// 骨骼层级结构不一致或绑定矩阵不可逆（模型加载失败）
    #[error("Malformed skeleton: {0}")]
    MalformedSkeleton(String),

    /// 动画通道引用了层级中不存在的节点（仅该片段加载失败）
    #[error("Unknown animation target '{target}' in clip '{clip}'")]
    UnknownAnimationTarget { clip: String, target: String },

    /// 请求的帧超出 `[0, frame_count)`
    #[error("Frame index {frame} out of range (frame count {frame_count})")]
    FrameIndexOutOfRange { frame: usize, frame_count: usize },

    /// 请求的关节超出 `[0, joint_count)`
    #[error("Joint index {joint} out of range (joint count {joint_count})")]
    JointIndexOutOfRange { joint: usize, joint_count: usize },

    /// 节点树有重名、环或未知父节点
    #[error("Malformed node tree: {0}")]
    MalformedNodeTree(String),

    /// 关键帧数据无效（时间倒序、非有限值、零长度四元数）
    #[error("Invalid keyframe for '{target}': {reason}")]
    InvalidKeyframe { target: String, reason: String },

    /// 顶点权重或三角形输入无效
    #[error("Invalid skinning input: {0}")]
    InvalidSkinningInput(String),

    /// 动画片段参数无效
    #[error("Invalid clip: {0}")]
    InvalidClip(String),

    /// 导入数据解析失败
    #[error("Import error: {0}")]
    Import(String),
}

impl From<serde_json::Error> for AnimationError {
    fn from(err: serde_json::Error) -> Self {
        AnimationError::Import(err.to_string())
    }
}

/// 动画核心结果类型
pub type AnimationResult<T> = Result<T, AnimationError>;

/// 非致命的蒙皮数据问题
///
/// 记录在 [`VertexSkinningData`](crate::skinning::VertexSkinningData) 上，
/// 同时通过 `tracing::warn!` 输出，方便美术修正源资源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinningWarning {
    /// 顶点没有任何有效权重，已回退到单位放置
    DegenerateVertexWeights { vertex_index: usize },
}

impl std::fmt::Display for SkinningWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkinningWarning::DegenerateVertexWeights { vertex_index } => {
                write!(f, "vertex {} has zero total weight", vertex_index)
            }
        }
    }
}
