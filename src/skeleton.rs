//! 骨骼数据结构
//!
//! 由导入的关节列表构建绑定姿态骨架，加载后不可变，
//! 被同一模型的所有动画片段只读共享。

use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;

use crate::error::{AnimationError, AnimationResult};
use crate::import::JointDesc;

/// 判定绑定矩阵不可逆的行列式阈值
pub const DETERMINANT_EPSILON: f32 = 1e-6;

// ============================================================================
// 骨骼变换
// ============================================================================

/// 骨骼变换
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl BoneTransform {
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// 转换为 4x4 矩阵（平移 * 旋转 * 缩放）
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从 4x4 矩阵分解
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

// ============================================================================
// 关节
// ============================================================================

/// 关节（骨骼节点）
#[derive(Clone, Debug)]
pub struct Joint {
    /// 关节名称
    pub name: String,
    /// 父关节索引（None 表示根关节），总是小于自身索引
    pub parent_index: Option<usize>,
    /// 子关节索引列表
    pub children_indices: Vec<usize>,
    /// 绑定姿态局部变换（相对父关节）
    pub bind_local_transform: Mat4,
    /// 绑定姿态全局变换
    pub bind_global_matrix: Mat4,
    /// 逆绑定矩阵（将顶点从模型空间变换到关节空间）
    pub inverse_bind_matrix: Mat4,
}

// ============================================================================
// 骨架
// ============================================================================

/// 骨架模型
#[derive(Clone, Debug)]
pub struct SkeletonModel {
    /// 所有关节，根在前拓扑排序
    joints: Vec<Joint>,
    /// 关节名称到索引的映射
    joint_name_to_index: HashMap<String, usize>,
}

impl SkeletonModel {
    /// 从原始关节列表构建骨架
    ///
    /// 关节必须按拓扑顺序给出：每个父索引都严格小于自身索引。
    pub fn from_joints(descs: &[JointDesc]) -> AnimationResult<Self> {
        if descs.is_empty() {
            return Err(AnimationError::MalformedSkeleton(
                "skeleton has no joints".to_string(),
            ));
        }

        let mut joints: Vec<Joint> = Vec::with_capacity(descs.len());
        let mut joint_name_to_index = HashMap::with_capacity(descs.len());

        for (index, desc) in descs.iter().enumerate() {
            let parent_index = resolve_parent(index, descs.len(), desc)?;

            if joint_name_to_index.insert(desc.name.clone(), index).is_some() {
                return Err(AnimationError::MalformedSkeleton(format!(
                    "duplicate joint name '{}'",
                    desc.name
                )));
            }

            let rotation = desc.bind_rotation;
            if !rotation.is_finite() || rotation.length() < 1e-6 {
                return Err(AnimationError::MalformedSkeleton(format!(
                    "joint '{}' has a degenerate bind rotation",
                    desc.name
                )));
            }
            if !desc.bind_translation.is_finite() {
                return Err(AnimationError::MalformedSkeleton(format!(
                    "joint '{}' has a non-finite bind translation",
                    desc.name
                )));
            }

            let bind_local_transform =
                Mat4::from_rotation_translation(rotation.normalize(), desc.bind_translation);
            let bind_global_matrix = match parent_index {
                Some(parent) => joints[parent].bind_global_matrix * bind_local_transform,
                None => bind_local_transform,
            };

            let determinant = bind_global_matrix.determinant();
            if !determinant.is_finite() || determinant.abs() < DETERMINANT_EPSILON {
                return Err(AnimationError::MalformedSkeleton(format!(
                    "bind pose of joint '{}' is not invertible (determinant {})",
                    desc.name, determinant
                )));
            }

            if let Some(parent) = parent_index {
                joints[parent].children_indices.push(index);
            }

            joints.push(Joint {
                name: desc.name.clone(),
                parent_index,
                children_indices: Vec::new(),
                bind_local_transform,
                bind_global_matrix,
                inverse_bind_matrix: bind_global_matrix.inverse(),
            });
        }

        tracing::debug!(target: "animation", "Built skeleton with {} joints", joints.len());

        Ok(Self {
            joints,
            joint_name_to_index,
        })
    }

    /// 获取关节数量
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// 通过名称获取关节索引
    pub fn joint_index_of(&self, name: &str) -> Option<usize> {
        self.joint_name_to_index.get(name).copied()
    }

    /// 获取关节
    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn bind_global_matrix(&self, index: usize) -> Option<Mat4> {
        self.joints.get(index).map(|j| j.bind_global_matrix)
    }

    pub fn inverse_bind_matrix(&self, index: usize) -> Option<Mat4> {
        self.joints.get(index).map(|j| j.inverse_bind_matrix)
    }

    /// 所有根关节的索引
    pub fn root_joints(&self) -> impl Iterator<Item = usize> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter(|(_, j)| j.parent_index.is_none())
            .map(|(i, _)| i)
    }
}

fn resolve_parent(index: usize, count: usize, desc: &JointDesc) -> AnimationResult<Option<usize>> {
    match desc.parent_index {
        -1 => Ok(None),
        p if p < -1 || p as usize >= count => Err(AnimationError::MalformedSkeleton(format!(
            "joint '{}' has parent index {} out of range",
            desc.name, p
        ))),
        p if p as usize >= index => Err(AnimationError::MalformedSkeleton(format!(
            "joint '{}' (index {}) references parent {} which does not precede it",
            desc.name, index, p
        ))),
        p => Ok(Some(p as usize)),
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<JointDesc> {
        vec![
            JointDesc::new("root", -1, Vec3::new(0.0, 0.0, 1.0), Quat::IDENTITY),
            JointDesc::new(
                "spine",
                0,
                Vec3::new(0.0, 1.0, 0.0),
                Quat::from_rotation_z(0.5),
            ),
            JointDesc::new(
                "head",
                1,
                Vec3::new(0.0, 0.5, 0.0),
                Quat::from_rotation_x(-0.3),
            ),
        ]
    }

    #[test]
    fn test_bone_transform_identity() {
        let t = BoneTransform::identity();
        assert_eq!(t.translation, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.to_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_bone_transform_to_matrix() {
        let t = BoneTransform::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec3::ONE);
        let m = t.to_matrix();
        assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));

        let back = BoneTransform::from_matrix(m);
        assert!(back.translation.abs_diff_eq(t.translation, 1e-6));
    }

    #[test]
    fn test_skeleton_joint_hierarchy() {
        let skeleton = SkeletonModel::from_joints(&chain()).unwrap();

        assert_eq!(skeleton.joint_count(), 3);
        assert_eq!(skeleton.joint_index_of("root"), Some(0));
        assert_eq!(skeleton.joint_index_of("spine"), Some(1));
        assert_eq!(skeleton.joint_index_of("head"), Some(2));
        assert_eq!(skeleton.joint_index_of("tail"), None);
        assert_eq!(skeleton.joint(0).unwrap().children_indices, vec![1]);
        assert_eq!(skeleton.root_joints().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_inverse_bind_times_bind_global_is_identity() {
        let skeleton = SkeletonModel::from_joints(&chain()).unwrap();
        for joint in skeleton.joints() {
            let product = joint.inverse_bind_matrix * joint.bind_global_matrix;
            assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn test_bind_global_composes_parent_chain() {
        let skeleton = SkeletonModel::from_joints(&chain()).unwrap();
        let spine_origin = skeleton
            .bind_global_matrix(1)
            .unwrap()
            .transform_point3(Vec3::ZERO);
        assert!(spine_origin.abs_diff_eq(Vec3::new(0.0, 1.0, 1.0), 1e-6));
    }

    #[test]
    fn test_parent_out_of_range_rejected() {
        let joints = vec![JointDesc::new("root", 5, Vec3::ZERO, Quat::IDENTITY)];
        assert!(matches!(
            SkeletonModel::from_joints(&joints),
            Err(AnimationError::MalformedSkeleton(_))
        ));

        let joints = vec![JointDesc::new("root", -2, Vec3::ZERO, Quat::IDENTITY)];
        assert!(SkeletonModel::from_joints(&joints).is_err());
    }

    #[test]
    fn test_forward_parent_reference_rejected() {
        let joints = vec![
            JointDesc::new("a", 1, Vec3::ZERO, Quat::IDENTITY),
            JointDesc::new("b", -1, Vec3::ZERO, Quat::IDENTITY),
        ];
        assert!(matches!(
            SkeletonModel::from_joints(&joints),
            Err(AnimationError::MalformedSkeleton(_))
        ));

        let joints = vec![JointDesc::new("self", 0, Vec3::ZERO, Quat::IDENTITY)];
        assert!(SkeletonModel::from_joints(&joints).is_err());
    }

    #[test]
    fn test_degenerate_rotation_rejected() {
        let joints = vec![JointDesc::new(
            "root",
            -1,
            Vec3::ZERO,
            Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
        )];
        assert!(matches!(
            SkeletonModel::from_joints(&joints),
            Err(AnimationError::MalformedSkeleton(_))
        ));
    }

    #[test]
    fn test_duplicate_and_empty_rejected() {
        let joints = vec![
            JointDesc::new("bone", -1, Vec3::ZERO, Quat::IDENTITY),
            JointDesc::new("bone", 0, Vec3::ZERO, Quat::IDENTITY),
        ];
        assert!(SkeletonModel::from_joints(&joints).is_err());
        assert!(SkeletonModel::from_joints(&[]).is_err());
    }
}
