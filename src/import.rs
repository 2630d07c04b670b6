//! 导入数据记录
//!
//! 与具体文件格式无关的原始输入。解析器（自定义文本格式、通用 3D 导入器等）
//! 负责把各自的格式整理成这些记录，核心只消费这里定义的形状。

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::AnimationResult;
use crate::keyframe::Keyframe;

/// 原始关节描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDesc {
    /// 关节名称
    pub name: String,
    /// 父关节索引（-1 表示根）
    pub parent_index: i32,
    /// 绑定姿态平移（相对父关节）
    pub bind_translation: Vec3,
    /// 绑定姿态旋转（相对父关节）
    pub bind_rotation: Quat,
}

impl JointDesc {
    pub fn new(
        name: impl Into<String>,
        parent_index: i32,
        bind_translation: Vec3,
        bind_rotation: Quat,
    ) -> Self {
        Self {
            name: name.into(),
            parent_index,
            bind_translation,
            bind_rotation,
        }
    }
}

/// 顶点对某个关节的绑定贡献（局部偏移形式）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexContribution {
    pub vertex_index: usize,
    pub bone_index: usize,
    /// 相对关节的局部偏移
    pub local_offset: Vec3,
    pub bias: f32,
}

/// 顶点权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexWeight {
    pub vertex_index: usize,
    pub bone_index: usize,
    pub bias: f32,
}

impl VertexWeight {
    pub fn new(vertex_index: usize, bone_index: usize, bias: f32) -> Self {
        Self {
            vertex_index,
            bone_index,
            bias,
        }
    }
}

/// 顶点绑定数据来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SkinningSource {
    /// 每个贡献携带关节局部偏移，绑定位置由骨架推导
    WeightedOffsets {
        vertex_count: usize,
        contributions: Vec<VertexContribution>,
    },
    /// 直接给出绑定位置，权重单独列出
    BindPositions {
        positions: Vec<Vec3>,
        weights: Vec<VertexWeight>,
    },
}

/// 原始节点描述（嵌套树）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDesc {
    pub name: String,
    /// 扁平列表形式使用；嵌套形式中忽略
    #[serde(default)]
    pub parent_name: Option<String>,
    /// 无动画通道时使用的局部变换
    #[serde(default)]
    pub static_local_transform: Mat4,
    #[serde(default)]
    pub children: Vec<NodeDesc>,
}

impl NodeDesc {
    pub fn new(name: impl Into<String>, static_local_transform: Mat4) -> Self {
        Self {
            name: name.into(),
            parent_name: None,
            static_local_transform,
            children: Vec::new(),
        }
    }

    /// 追加子节点（构建器风格）
    pub fn with_child(mut self, child: NodeDesc) -> Self {
        self.children.push(child);
        self
    }

    /// 设置父节点名称（扁平列表形式）
    pub fn with_parent(mut self, parent_name: impl Into<String>) -> Self {
        self.parent_name = Some(parent_name.into());
        self
    }
}

/// 单个节点的原始动画通道
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDesc {
    pub target_node_name: String,
    #[serde(default)]
    pub translation_keys: Vec<Keyframe<Vec3>>,
    #[serde(default)]
    pub rotation_keys: Vec<Keyframe<Quat>>,
    #[serde(default)]
    pub scale_keys: Vec<Keyframe<Vec3>>,
}

impl ChannelDesc {
    pub fn new(target_node_name: impl Into<String>) -> Self {
        Self {
            target_node_name: target_node_name.into(),
            translation_keys: Vec::new(),
            rotation_keys: Vec::new(),
            scale_keys: Vec::new(),
        }
    }
}

/// 原始动画描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationDesc {
    pub name: String,
    /// 帧率；缺省时使用配置中的默认帧率
    #[serde(default)]
    pub frame_rate: Option<f32>,
    /// 显式帧数；缺省时取最长关键帧列表
    #[serde(default)]
    pub frame_count: Option<usize>,
    #[serde(default)]
    pub channels: Vec<ChannelDesc>,
}

/// 单个模型的完整导入数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelImport {
    pub joints: Vec<JointDesc>,
    pub skinning: SkinningSource,
    #[serde(default)]
    pub triangles: Vec<[u32; 3]>,
    pub nodes: NodeDesc,
    #[serde(default)]
    pub animations: Vec<AnimationDesc>,
}

impl ModelImport {
    /// 从JSON字符串解析导入数据
    pub fn from_json_str(content: &str) -> AnimationResult<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// 由三个存储分量重建单位四元数的标量分量
///
/// 部分文本格式只存 x/y/z，`w = sqrt(max(0, 1 - x² - y² - z²))`。
pub fn reconstruct_quat_w(x: f32, y: f32, z: f32) -> Quat {
    let t = 1.0 - x * x - y * y - z * z;
    let w = if t < 0.0 { 0.0 } else { t.sqrt() };
    Quat::from_xyzw(x, y, z, w)
}
