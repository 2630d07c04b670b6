//! 蒙皮模型加载单元
//!
//! 把骨骼、顶点绑定数据和全部动画片段作为一个整体加载，并给渲染端一个带标签的网格类型。

use glam::Vec3;
use std::sync::Arc;

use crate::channel::AnimationChannelSet;
use crate::clip::AnimationClip;
use crate::config::AnimationConfig;
use crate::error::{AnimationError, AnimationResult};
use crate::import::ModelImport;
use crate::node::NodeTree;
use crate::skeleton::SkeletonModel;
use crate::skinning::{SkinnedVertex, VertexSkinningData};

/// 不带骨骼的网格数据
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

/// 蒙皮网格：共享的绑定数据加三角形索引
#[derive(Debug, Clone)]
pub struct SkinnedMesh {
    pub skinning: Arc<VertexSkinningData>,
    pub indices: Vec<u32>,
}

impl SkinnedMesh {
    /// 上传到 GPU 的交错顶点
    pub fn vertices(&self) -> Vec<SkinnedVertex> {
        self.skinning.gpu_vertices()
    }
}

/// 渲染端看到的网格种类
#[derive(Debug, Clone)]
pub enum MeshKind {
    Static(StaticMesh),
    Skinned(SkinnedMesh),
}

impl MeshKind {
    pub fn is_skinned(&self) -> bool {
        matches!(self, MeshKind::Skinned(_))
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            MeshKind::Static(mesh) => mesh.positions.len(),
            MeshKind::Skinned(mesh) => mesh.skinning.vertex_count(),
        }
    }

    pub fn indices(&self) -> &[u32] {
        match self {
            MeshKind::Static(mesh) => &mesh.indices,
            MeshKind::Skinned(mesh) => &mesh.indices,
        }
    }
}

/// 加载结果
///
/// 单个片段失败不影响模型本身，失败的片段记录在 `failed_clips` 中。
#[derive(Debug)]
pub struct ModelLoad {
    pub model: SkinnedModel,
    pub failed_clips: Vec<(String, AnimationError)>,
}

/// 已加载的蒙皮模型
///
/// 骨骼、节点树与顶点数据只构建一次，所有片段共享。
#[derive(Debug, Clone)]
pub struct SkinnedModel {
    skeleton: Arc<SkeletonModel>,
    nodes: Arc<NodeTree>,
    skinning: Arc<VertexSkinningData>,
    indices: Vec<u32>,
    clips: Vec<Arc<AnimationClip>>,
}

impl SkinnedModel {
    /// 加载模型
    ///
    /// 骨骼、节点树或顶点数据出错时整个模型加载失败；
    /// 片段逐个构建，失败的片段被丢弃并记录。
    pub fn load(import: &ModelImport, config: &AnimationConfig) -> AnimationResult<ModelLoad> {
        let skeleton = Arc::new(SkeletonModel::from_joints(&import.joints)?);
        let nodes = Arc::new(NodeTree::from_desc(&import.nodes)?);
        let skinning = Arc::new(VertexSkinningData::from_source(
            &skeleton,
            &import.skinning,
            &import.triangles,
            config.winding,
        )?);

        let mut clips: Vec<Arc<AnimationClip>> = Vec::with_capacity(import.animations.len());
        let mut failed_clips = Vec::new();

        for desc in &import.animations {
            if clips.iter().any(|clip| clip.name() == desc.name) {
                let err = AnimationError::InvalidClip(format!(
                    "clip '{}' is defined more than once",
                    desc.name
                ));
                tracing::warn!(target: "animation", "Skipping clip: {}", err);
                failed_clips.push((desc.name.clone(), err));
                continue;
            }

            let built = AnimationChannelSet::from_desc(desc).and_then(|set| {
                AnimationClip::from_channels(skeleton.clone(), nodes.clone(), &set, config)
            });

            match built {
                Ok(clip) => clips.push(Arc::new(clip)),
                Err(err) => {
                    tracing::warn!(
                        target: "animation",
                        "Failed to build clip '{}': {}",
                        desc.name,
                        err
                    );
                    failed_clips.push((desc.name.clone(), err));
                }
            }
        }

        tracing::info!(
            target: "animation",
            "Loaded model: {} joints, {} vertices, {} clips ({} failed)",
            skeleton.joint_count(),
            skinning.vertex_count(),
            clips.len(),
            failed_clips.len()
        );

        let indices = import.triangles.iter().flatten().copied().collect();

        Ok(ModelLoad {
            model: Self {
                skeleton,
                nodes,
                skinning,
                indices,
                clips,
            },
            failed_clips,
        })
    }

    pub fn skeleton(&self) -> &Arc<SkeletonModel> {
        &self.skeleton
    }

    pub fn nodes(&self) -> &Arc<NodeTree> {
        &self.nodes
    }

    pub fn skinning(&self) -> &Arc<VertexSkinningData> {
        &self.skinning
    }

    /// 按名称查找片段
    pub fn clip(&self, name: &str) -> Option<Arc<AnimationClip>> {
        self.clips.iter().find(|clip| clip.name() == name).cloned()
    }

    /// 片段名称，按导入顺序
    pub fn clip_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.clips.iter().map(|clip| clip.name())
    }

    pub fn clips(&self) -> &[Arc<AnimationClip>] {
        &self.clips
    }

    pub fn render_mesh(&self) -> MeshKind {
        MeshKind::Skinned(SkinnedMesh {
            skinning: self.skinning.clone(),
            indices: self.indices.clone(),
        })
    }

    /// 在 CPU 上蒙皮指定帧，得到静态网格
    pub fn bake_frame(
        &self,
        clip_name: &str,
        frame: usize,
        config: &AnimationConfig,
    ) -> AnimationResult<MeshKind> {
        let clip = self.clip(clip_name).ok_or_else(|| {
            AnimationError::InvalidClip(format!("model has no clip named '{}'", clip_name))
        })?;
        let geometry = self
            .skinning
            .skin(clip.pose_at(frame)?, config.normal_skinning)?;

        Ok(MeshKind::Static(StaticMesh {
            positions: geometry.positions,
            normals: geometry.normals,
            indices: self.indices.clone(),
        }))
    }
}
