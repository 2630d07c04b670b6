//! 蒙皮顶点数据
//!
//! 由网格绑定数据与骨架一次性推导出绑定姿态的位置、法线，以及每顶点
//! 最多 [`MAX_WEIGHTS`] 个（骨骼索引，权重）对，供 GPU 上传使用。

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{AnimationError, AnimationResult, SkinningWarning};
use crate::import::{SkinningSource, VertexContribution, VertexWeight};
use crate::pose::AnimatedPose;
use crate::skeleton::SkeletonModel;

/// 每个顶点保留的最大骨骼影响数
pub const MAX_WEIGHTS: usize = 4;

/// 三角形环绕方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Winding {
    /// 逆时针为正面，法线 = (v1 - v0) x (v2 - v0)
    #[default]
    Ccw,
    /// 顺时针为正面，法线 = (v2 - v0) x (v1 - v0)
    Cw,
}

/// 法线的蒙皮方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalSkinning {
    /// 与位置使用同一关节矩阵（非均匀缩放下不精确）
    #[default]
    JointMatrix,
    /// 使用关节矩阵的逆转置
    InverseTranspose,
}

// ============================================================================
// 蒙皮顶点数据
// ============================================================================

/// 蒙皮顶点（包含骨骼权重）
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkinnedVertex {
    /// 绑定姿态位置
    pub position: [f32; 3],
    /// 绑定姿态法线
    pub normal: [f32; 3],
    /// 骨骼索引（最多 4 个）
    pub bone_indices: [u32; 4],
    /// 骨骼权重（最多 4 个，总和为 1.0）
    pub bone_weights: [f32; 4],
}

/// 某一帧蒙皮后的几何数据
#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// 绑定姿态下的顶点蒙皮数据，加载后不可变
#[derive(Debug, Clone)]
pub struct VertexSkinningData {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    bone_indices: Vec<[u32; 4]>,
    bone_weights: Vec<[f32; 4]>,
    warnings: Vec<SkinningWarning>,
}

impl VertexSkinningData {
    /// 由导入的绑定数据构建
    pub fn from_source(
        skeleton: &SkeletonModel,
        source: &SkinningSource,
        triangles: &[[u32; 3]],
        winding: Winding,
    ) -> AnimationResult<Self> {
        match source {
            SkinningSource::WeightedOffsets {
                vertex_count,
                contributions,
            } => Self::from_weighted_offsets(
                skeleton,
                *vertex_count,
                contributions,
                triangles,
                winding,
            ),
            SkinningSource::BindPositions { positions, weights } => {
                Self::from_bind_positions(skeleton, positions, weights, triangles, winding)
            }
        }
    }

    /// 由关节局部偏移推导绑定位置
    ///
    /// 位置 = Σ bias_i · (bind_global[bone_i] · offset_i)，使用截断前的全部贡献。
    pub fn from_weighted_offsets(
        skeleton: &SkeletonModel,
        vertex_count: usize,
        contributions: &[VertexContribution],
        triangles: &[[u32; 3]],
        winding: Winding,
    ) -> AnimationResult<Self> {
        let grouped = group_by_vertex(
            skeleton,
            vertex_count,
            contributions.iter().map(|c| (c.vertex_index, c.bone_index, c.bias)),
        )?;

        let mut positions = vec![Vec3::ZERO; vertex_count];
        let mut fallback: Vec<Option<Vec3>> = vec![None; vertex_count];
        for c in contributions {
            if !c.local_offset.is_finite() {
                return Err(AnimationError::InvalidSkinningInput(format!(
                    "vertex {} has a non-finite offset",
                    c.vertex_index
                )));
            }
            let bind_global = skeleton
                .bind_global_matrix(c.bone_index)
                .unwrap_or_default();
            positions[c.vertex_index] += bind_global.transform_point3(c.local_offset) * c.bias;
            fallback[c.vertex_index].get_or_insert(c.local_offset);
        }

        let mut data = Self::assemble(positions, grouped);
        for warning in &data.warnings {
            let SkinningWarning::DegenerateVertexWeights { vertex_index } = *warning;
            data.positions[vertex_index] = fallback[vertex_index].unwrap_or(Vec3::ZERO);
        }
        data.normals = compute_normals(&data.positions, triangles, winding)?;
        Ok(data)
    }

    /// 绑定位置已知，权重单独给出
    pub fn from_bind_positions(
        skeleton: &SkeletonModel,
        positions: &[Vec3],
        weights: &[VertexWeight],
        triangles: &[[u32; 3]],
        winding: Winding,
    ) -> AnimationResult<Self> {
        if let Some(bad) = positions.iter().position(|p| !p.is_finite()) {
            return Err(AnimationError::InvalidSkinningInput(format!(
                "vertex {} has a non-finite bind position",
                bad
            )));
        }

        let grouped = group_by_vertex(
            skeleton,
            positions.len(),
            weights.iter().map(|w| (w.vertex_index, w.bone_index, w.bias)),
        )?;

        let mut data = Self::assemble(positions.to_vec(), grouped);
        data.normals = compute_normals(&data.positions, triangles, winding)?;
        Ok(data)
    }

    fn assemble(positions: Vec<Vec3>, grouped: Vec<Vec<(usize, f32)>>) -> Self {
        let vertex_count = positions.len();
        let mut bone_indices = Vec::with_capacity(vertex_count);
        let mut bone_weights = Vec::with_capacity(vertex_count);
        let mut warnings = Vec::new();

        for (vertex_index, influences) in grouped.into_iter().enumerate() {
            match select_weights(influences) {
                Some((indices, weights)) => {
                    bone_indices.push(indices);
                    bone_weights.push(weights);
                }
                None => {
                    tracing::warn!(
                        target: "animation",
                        "Vertex {} has zero total weight, falling back to identity placement",
                        vertex_index
                    );
                    warnings.push(SkinningWarning::DegenerateVertexWeights { vertex_index });
                    bone_indices.push([0; MAX_WEIGHTS]);
                    bone_weights.push([1.0, 0.0, 0.0, 0.0]);
                }
            }
        }

        Self {
            positions,
            normals: Vec::new(),
            bone_indices,
            bone_weights,
            warnings,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// 绑定姿态位置
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// 绑定姿态法线（单位长度；孤立顶点为零向量）
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn bone_indices(&self) -> &[[u32; 4]] {
        &self.bone_indices
    }

    pub fn bone_weights(&self) -> &[[f32; 4]] {
        &self.bone_weights
    }

    /// 构建过程中记录的非致命问题
    pub fn warnings(&self) -> &[SkinningWarning] {
        &self.warnings
    }

    /// 交错排列的顶点缓冲区数据
    pub fn gpu_vertices(&self) -> Vec<SkinnedVertex> {
        (0..self.vertex_count())
            .map(|i| SkinnedVertex {
                position: self.positions[i].to_array(),
                normal: self.normals[i].to_array(),
                bone_indices: self.bone_indices[i],
                bone_weights: self.bone_weights[i],
            })
            .collect()
    }

    fn check_vertex(&self, vertex: usize) -> AnimationResult<()> {
        if vertex >= self.vertex_count() {
            return Err(AnimationError::InvalidSkinningInput(format!(
                "vertex {} out of range (vertex count {})",
                vertex,
                self.vertex_count()
            )));
        }
        Ok(())
    }

    /// CPU 参考实现：线性混合蒙皮后的顶点位置
    pub fn skin_position(&self, vertex: usize, pose: &AnimatedPose) -> AnimationResult<Vec3> {
        self.check_vertex(vertex)?;
        let position = self.positions[vertex];
        let mut result = Vec3::ZERO;
        for (&bone, &weight) in self.bone_indices[vertex]
            .iter()
            .zip(&self.bone_weights[vertex])
        {
            if weight > 0.0 {
                let matrix = pose.matrix_for(bone as usize)?;
                result += matrix.transform_point3(position) * weight;
            }
        }
        Ok(result)
    }

    /// CPU 参考实现：蒙皮后的顶点法线
    pub fn skin_normal(
        &self,
        vertex: usize,
        pose: &AnimatedPose,
        mode: NormalSkinning,
    ) -> AnimationResult<Vec3> {
        self.check_vertex(vertex)?;
        let normal = self.normals[vertex];
        let mut result = Vec3::ZERO;
        for (&bone, &weight) in self.bone_indices[vertex]
            .iter()
            .zip(&self.bone_weights[vertex])
        {
            if weight > 0.0 {
                let matrix = pose.matrix_for(bone as usize)?;
                let matrix = match mode {
                    NormalSkinning::JointMatrix => matrix,
                    NormalSkinning::InverseTranspose => matrix.inverse().transpose(),
                };
                result += matrix.transform_vector3(normal) * weight;
            }
        }
        Ok(result.normalize_or_zero())
    }

    /// 对全部顶点做 CPU 蒙皮
    pub fn skin(&self, pose: &AnimatedPose, mode: NormalSkinning) -> AnimationResult<SkinnedGeometry> {
        let count = self.vertex_count();
        let mut positions = Vec::with_capacity(count);
        let mut normals = Vec::with_capacity(count);
        for vertex in 0..count {
            positions.push(self.skin_position(vertex, pose)?);
            normals.push(self.skin_normal(vertex, pose, mode)?);
        }
        Ok(SkinnedGeometry { positions, normals })
    }
}

/// 校验并按顶点分组 (bone, bias)
fn group_by_vertex(
    skeleton: &SkeletonModel,
    vertex_count: usize,
    entries: impl Iterator<Item = (usize, usize, f32)>,
) -> AnimationResult<Vec<Vec<(usize, f32)>>> {
    let mut grouped: Vec<Vec<(usize, f32)>> = vec![Vec::new(); vertex_count];
    for (vertex, bone, bias) in entries {
        if vertex >= vertex_count {
            return Err(AnimationError::InvalidSkinningInput(format!(
                "weight references vertex {} but there are {} vertices",
                vertex, vertex_count
            )));
        }
        if bone >= skeleton.joint_count() {
            return Err(AnimationError::InvalidSkinningInput(format!(
                "vertex {} references joint {} but the skeleton has {} joints",
                vertex,
                bone,
                skeleton.joint_count()
            )));
        }
        if !bias.is_finite() || bias < 0.0 {
            return Err(AnimationError::InvalidSkinningInput(format!(
                "vertex {} has invalid bias {}",
                vertex, bias
            )));
        }
        grouped[vertex].push((bone, bias));
    }
    Ok(grouped)
}

/// 保留最强的 [`MAX_WEIGHTS`] 个影响并归一化；总权重为零时返回 None
fn select_weights(mut influences: Vec<(usize, f32)>) -> Option<([u32; 4], [f32; 4])> {
    influences.retain(|&(_, bias)| bias > 0.0);
    // 权重降序，相同权重时骨骼索引小的在前
    influences.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    influences.truncate(MAX_WEIGHTS);

    let total: f32 = influences.iter().map(|&(_, bias)| bias).sum();
    if total <= f32::EPSILON {
        return None;
    }

    let mut indices = [0u32; MAX_WEIGHTS];
    let mut weights = [0.0f32; MAX_WEIGHTS];
    for (slot, &(bone, bias)) in influences.iter().enumerate() {
        indices[slot] = bone as u32;
        weights[slot] = bias / total;
    }
    Some((indices, weights))
}

/// 面法线累加后每顶点归一化一次，与三角形访问顺序无关
fn compute_normals(
    positions: &[Vec3],
    triangles: &[[u32; 3]],
    winding: Winding,
) -> AnimationResult<Vec<Vec3>> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for (t, triangle) in triangles.iter().enumerate() {
        if let Some(&bad) = triangle.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(AnimationError::InvalidSkinningInput(format!(
                "triangle {} references vertex {} but there are {} vertices",
                t,
                bad,
                positions.len()
            )));
        }
        let [a, b, c] = triangle.map(|i| i as usize);
        let e1 = positions[b] - positions[a];
        let e2 = positions[c] - positions[a];
        let face = match winding {
            Winding::Ccw => e1.cross(e2),
            Winding::Cw => e2.cross(e1),
        };
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    for normal in &mut normals {
        *normal = normal.normalize_or_zero();
    }
    Ok(normals)
}

// ============================================================================
// 测试
// ============================================================================
