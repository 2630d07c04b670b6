//! 单帧骨骼矩阵

use glam::Mat4;

use crate::error::{AnimationError, AnimationResult};

/// 单帧姿态：按关节索引排列的最终蒙皮矩阵，长度恒为关节数
#[derive(Clone, Debug, PartialEq)]
pub struct AnimatedPose {
    matrices: Vec<Mat4>,
}

impl AnimatedPose {
    /// 所有关节均为单位矩阵的姿态（绑定姿态）
    pub fn identity(joint_count: usize) -> Self {
        Self {
            matrices: vec![Mat4::IDENTITY; joint_count],
        }
    }

    pub(crate) fn from_matrices(matrices: Vec<Mat4>) -> Self {
        Self { matrices }
    }

    pub fn joint_count(&self) -> usize {
        self.matrices.len()
    }

    /// 获取关节的蒙皮矩阵
    pub fn matrix_for(&self, joint: usize) -> AnimationResult<Mat4> {
        self.matrices
            .get(joint)
            .copied()
            .ok_or(AnimationError::JointIndexOutOfRange {
                joint,
                joint_count: self.matrices.len(),
            })
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    pub(crate) fn matrices_mut(&mut self) -> &mut [Mat4] {
        &mut self.matrices
    }

    /// 列主序浮点数组，可直接写入 GPU 缓冲区
    pub fn as_gpu_data(&self) -> &[f32] {
        bytemuck::cast_slice(&self.matrices)
    }

    /// 列主序 `[[f32; 4]; 4]` 数组
    pub fn to_cols_arrays(&self) -> Vec<[[f32; 4]; 4]> {
        self.matrices.iter().map(|m| m.to_cols_array_2d()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_identity_pose() {
        let pose = AnimatedPose::identity(3);
        assert_eq!(pose.joint_count(), 3);
        assert_eq!(pose.matrix_for(2).unwrap(), Mat4::IDENTITY);
    }

    #[test]
    fn test_matrix_for_out_of_range() {
        let pose = AnimatedPose::identity(2);
        assert_eq!(
            pose.matrix_for(2),
            Err(AnimationError::JointIndexOutOfRange {
                joint: 2,
                joint_count: 2
            })
        );
    }

    #[test]
    fn test_gpu_data_layout() {
        let translation = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let pose = AnimatedPose::from_matrices(vec![Mat4::IDENTITY, translation]);

        let data = pose.as_gpu_data();
        assert_eq!(data.len(), 32);
        // 第二个矩阵的第四列是平移
        assert_eq!(&data[28..31], &[1.0, 2.0, 3.0]);
        assert_eq!(pose.to_cols_arrays()[1][3], [1.0, 2.0, 3.0, 1.0]);
    }
}
