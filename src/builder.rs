//! 逐帧骨骼矩阵计算
//!
//! 对节点树做一次先序遍历（父节点总在子节点之前），为每个关节生成
//! `global_inverse * global * inverse_bind` 蒙皮矩阵。
//!
//! 两种使用方式：
//! - [`FrameMatrixBuilder::build_all`]：一次性预计算整段动画，由
//!   [`AnimationClip`](crate::clip::AnimationClip) 持有（默认方式）
//! - [`FrameMatrixBuilder::build_frame_into`]：写入调用方提供的缓冲区，
//!   适合内存受限、按需计算的场景

use glam::Mat4;
use std::sync::Arc;

use crate::channel::{AnimationChannel, AnimationChannelSet};
use crate::config::AnimationConfig;
use crate::error::{AnimationError, AnimationResult};
use crate::keyframe::KeySampling;
use crate::node::NodeTree;
use crate::pose::AnimatedPose;
use crate::skeleton::{BoneTransform, SkeletonModel, DETERMINANT_EPSILON};

/// 已解析到节点索引的通道
#[derive(Debug, Clone)]
struct ResolvedChannel {
    channel: AnimationChannel,
    /// 某条轨道为空时使用的静态变换分量
    fallback: BoneTransform,
}

impl ResolvedChannel {
    fn sample_local(&self, frame: usize, sampling: KeySampling) -> Mat4 {
        let translation = self
            .channel
            .translation
            .sample(frame, sampling)
            .unwrap_or(self.fallback.translation);
        let rotation = self
            .channel
            .rotation
            .sample(frame, sampling)
            .map(|q| q.normalize())
            .unwrap_or(self.fallback.rotation);
        let scale = self
            .channel
            .scale
            .sample(frame, sampling)
            .unwrap_or(self.fallback.scale);

        BoneTransform::new(translation, rotation, scale).to_matrix()
    }
}

/// 帧矩阵构建器
#[derive(Debug, Clone)]
pub struct FrameMatrixBuilder {
    skeleton: Arc<SkeletonModel>,
    nodes: Arc<NodeTree>,
    clip_name: String,
    /// 节点索引 -> 通道
    node_channels: Vec<Option<ResolvedChannel>>,
    /// 节点索引 -> 关节索引
    node_joints: Vec<Option<usize>>,
    global_inverse_transform: Mat4,
    frame_count: usize,
    sampling: KeySampling,
}

impl FrameMatrixBuilder {
    /// 解析通道目标并准备逐帧计算
    ///
    /// 任一通道目标无法在节点树中解析（或被多个通道同时驱动）时返回
    /// `UnknownAnimationTarget`，整个片段放弃加载。
    pub fn new(
        skeleton: Arc<SkeletonModel>,
        nodes: Arc<NodeTree>,
        channels: &AnimationChannelSet,
        config: &AnimationConfig,
    ) -> AnimationResult<Self> {
        let mut node_channels: Vec<Option<ResolvedChannel>> = vec![None; nodes.len()];

        for channel in &channels.channels {
            let unknown = || AnimationError::UnknownAnimationTarget {
                clip: channels.name.clone(),
                target: channel.target_node_name.clone(),
            };

            let index = nodes.index_of(&channel.target_node_name).ok_or_else(unknown)?;
            let slot = &mut node_channels[index];
            if slot.is_some() {
                tracing::warn!(
                    target: "animation",
                    "Clip '{}': node '{}' is targeted by more than one channel",
                    channels.name,
                    channel.target_node_name
                );
                return Err(unknown());
            }

            let static_local = nodes
                .node(index)
                .map(|n| n.static_local_transform)
                .unwrap_or(Mat4::IDENTITY);
            *slot = Some(ResolvedChannel {
                channel: channel.clone(),
                fallback: BoneTransform::from_matrix(static_local),
            });
        }

        let node_joints: Vec<Option<usize>> = nodes
            .nodes()
            .iter()
            .map(|n| skeleton.joint_index_of(&n.name))
            .collect();

        let unbound = skeleton.joint_count()
            - node_joints.iter().filter(|j| j.is_some()).count();
        if unbound > 0 {
            tracing::warn!(
                target: "animation",
                "Clip '{}': {} joints have no node in the hierarchy and keep the bind pose",
                channels.name,
                unbound
            );
        }

        let global_inverse_transform = if config.compensate_root_transform {
            root_compensation(&skeleton, &nodes, &node_joints)?
        } else {
            Mat4::IDENTITY
        };

        Ok(Self {
            skeleton,
            nodes,
            clip_name: channels.name.clone(),
            node_channels,
            node_joints,
            global_inverse_transform,
            frame_count: channels.effective_frame_count(config.sampling),
            sampling: config.sampling,
        })
    }

    pub fn clip_name(&self) -> &str {
        &self.clip_name
    }

    /// 帧数（至少为 1）
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn joint_count(&self) -> usize {
        self.skeleton.joint_count()
    }

    /// 骨架根变换的逆
    pub fn global_inverse_transform(&self) -> Mat4 {
        self.global_inverse_transform
    }

    pub fn skeleton(&self) -> &Arc<SkeletonModel> {
        &self.skeleton
    }

    /// 计算单帧，写入调用方提供的缓冲区（长度必须等于关节数）
    pub fn build_frame_into(&self, frame: usize, out: &mut [Mat4]) -> AnimationResult<()> {
        if frame >= self.frame_count {
            return Err(AnimationError::FrameIndexOutOfRange {
                frame,
                frame_count: self.frame_count,
            });
        }
        if out.len() != self.skeleton.joint_count() {
            return Err(AnimationError::InvalidClip(format!(
                "output buffer holds {} matrices but the skeleton has {} joints",
                out.len(),
                self.skeleton.joint_count()
            )));
        }

        out.fill(Mat4::IDENTITY);

        let joints = self.skeleton.joints();
        let mut globals: Vec<Mat4> = Vec::with_capacity(self.nodes.len());

        for (index, node) in self.nodes.nodes().iter().enumerate() {
            let local = match &self.node_channels[index] {
                Some(resolved) => resolved.sample_local(frame, self.sampling),
                None => node.static_local_transform,
            };

            let parent_global = node.parent.map_or(Mat4::IDENTITY, |p| globals[p]);
            let global = parent_global * local;
            globals.push(global);

            if let Some(joint) = self.node_joints[index] {
                out[joint] =
                    self.global_inverse_transform * global * joints[joint].inverse_bind_matrix;
            }
        }

        Ok(())
    }

    /// 计算单帧姿态
    pub fn build_frame(&self, frame: usize) -> AnimationResult<AnimatedPose> {
        let mut pose = AnimatedPose::identity(self.skeleton.joint_count());
        self.build_frame_into(frame, pose.matrices_mut())?;
        Ok(pose)
    }

    /// 预计算 `[0, frame_count)` 的全部姿态
    pub fn build_all(&self) -> AnimationResult<Vec<AnimatedPose>> {
        (0..self.frame_count)
            .map(|frame| self.build_frame(frame))
            .collect()
    }
}

/// 骨架根变换的逆：根关节所在节点之上的静态全局变换
///
/// 骨架有多个根关节时，它们之上的静态变换必须一致，否则无法用单个逆矩阵补偿。
/// 没有对应节点的根关节不参与比较。
fn root_compensation(
    skeleton: &SkeletonModel,
    nodes: &NodeTree,
    node_joints: &[Option<usize>],
) -> AnimationResult<Mat4> {
    let mut shared: Option<(usize, Mat4)> = None;

    for root_joint in skeleton.root_joints() {
        let Some(root_node) = node_joints.iter().position(|j| *j == Some(root_joint)) else {
            continue;
        };
        let root_transform = nodes
            .node(root_node)
            .and_then(|n| n.parent)
            .and_then(|parent| nodes.static_global_transform(parent))
            .unwrap_or(Mat4::IDENTITY);

        match shared {
            None => shared = Some((root_joint, root_transform)),
            Some((first, transform)) if !transform.abs_diff_eq(root_transform, 1e-5) => {
                return Err(AnimationError::MalformedSkeleton(format!(
                    "root joints '{}' and '{}' sit under different scene transforms",
                    joint_name(skeleton, first),
                    joint_name(skeleton, root_joint)
                )));
            }
            Some(_) => {}
        }
    }

    let Some((root_joint, root_transform)) = shared else {
        return Ok(Mat4::IDENTITY);
    };
    let determinant = root_transform.determinant();
    if !determinant.is_finite() || determinant.abs() < DETERMINANT_EPSILON {
        return Err(AnimationError::MalformedSkeleton(format!(
            "skeleton root transform above '{}' is not invertible",
            joint_name(skeleton, root_joint)
        )));
    }
    Ok(root_transform.inverse())
}

fn joint_name(skeleton: &SkeletonModel, index: usize) -> &str {
    skeleton
        .joint(index)
        .map(|j| j.name.as_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{JointDesc, NodeDesc};
    use glam::{Quat, Vec3};
    use std::f32::consts::FRAC_PI_2;

    fn two_joint_skeleton() -> Arc<SkeletonModel> {
        Arc::new(
            SkeletonModel::from_joints(&[
                JointDesc::new("root", -1, Vec3::ZERO, Quat::IDENTITY),
                JointDesc::new("child", 0, Vec3::Y, Quat::IDENTITY),
            ])
            .unwrap(),
        )
    }

    fn two_joint_nodes() -> Arc<NodeTree> {
        Arc::new(
            NodeTree::from_desc(
                &NodeDesc::new("root", Mat4::IDENTITY)
                    .with_child(NodeDesc::new("child", Mat4::from_translation(Vec3::Y))),
            )
            .unwrap(),
        )
    }

    fn rotate_root_channels() -> AnimationChannelSet {
        let mut channel = AnimationChannel::new("root");
        for frame in 0..4 {
            channel.rotation.add_keyframe(
                frame as f32,
                Quat::from_rotation_z(FRAC_PI_2 * frame as f32 / 3.0),
            );
        }
        let mut set = AnimationChannelSet::new("turn");
        set.add_channel(channel);
        set
    }

    #[test]
    fn test_root_rotation_carries_child() {
        let skeleton = two_joint_skeleton();
        let builder = FrameMatrixBuilder::new(
            skeleton.clone(),
            two_joint_nodes(),
            &rotate_root_channels(),
            &AnimationConfig::default(),
        )
        .unwrap();

        assert_eq!(builder.frame_count(), 4);
        let pose = builder.build_frame(3).unwrap();

        let child_global = pose.matrix_for(1).unwrap() * skeleton.bind_global_matrix(1).unwrap();
        let child_position = child_global.transform_point3(Vec3::ZERO);
        assert!(child_position.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5));

        // 第 0 帧仍是绑定姿态
        let pose = builder.build_frame(0).unwrap();
        assert!(pose.matrix_for(1).unwrap().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_unanimated_skeleton_skins_to_identity() {
        let set = AnimationChannelSet::new("rest");
        let builder = FrameMatrixBuilder::new(
            two_joint_skeleton(),
            two_joint_nodes(),
            &set,
            &AnimationConfig::default(),
        )
        .unwrap();

        assert_eq!(builder.frame_count(), 1);
        for matrix in builder.build_frame(0).unwrap().matrices() {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        }
    }

    #[test]
    fn test_root_joints_under_different_scene_transforms_rejected() {
        let skeleton = Arc::new(
            SkeletonModel::from_joints(&[
                JointDesc::new("left", -1, Vec3::ZERO, Quat::IDENTITY),
                JointDesc::new("right", -1, Vec3::X, Quat::IDENTITY),
            ])
            .unwrap(),
        );
        let scaled = Mat4::from_scale(Vec3::splat(0.5));
        let tree = |right_group: Mat4| {
            Arc::new(
                NodeTree::from_desc(
                    &NodeDesc::new("scene", Mat4::IDENTITY)
                        .with_child(
                            NodeDesc::new("group_a", scaled)
                                .with_child(NodeDesc::new("left", Mat4::IDENTITY)),
                        )
                        .with_child(
                            NodeDesc::new("group_b", right_group)
                                .with_child(NodeDesc::new("right", Mat4::from_translation(Vec3::X))),
                        ),
                )
                .unwrap(),
            )
        };

        assert!(matches!(
            FrameMatrixBuilder::new(
                skeleton.clone(),
                tree(Mat4::IDENTITY),
                &AnimationChannelSet::new("rest"),
                &AnimationConfig::default(),
            ),
            Err(AnimationError::MalformedSkeleton(_))
        ));

        // 两个根在相同的场景变换下时正常补偿
        let builder = FrameMatrixBuilder::new(
            skeleton,
            tree(scaled),
            &AnimationChannelSet::new("rest"),
            &AnimationConfig::default(),
        )
        .unwrap();
        for matrix in builder.build_frame(0).unwrap().matrices() {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn test_grouping_root_is_compensated() {
        let scene = Mat4::from_scale_rotation_translation(
            Vec3::splat(0.5),
            Quat::from_rotation_x(-FRAC_PI_2),
            Vec3::new(3.0, 0.0, 0.0),
        );
        let nodes = Arc::new(
            NodeTree::from_desc(
                &NodeDesc::new("scene", scene).with_child(
                    NodeDesc::new("root", Mat4::IDENTITY)
                        .with_child(NodeDesc::new("child", Mat4::from_translation(Vec3::Y))),
                ),
            )
            .unwrap(),
        );

        let builder = FrameMatrixBuilder::new(
            two_joint_skeleton(),
            nodes.clone(),
            &AnimationChannelSet::new("rest"),
            &AnimationConfig::default(),
        )
        .unwrap();
        assert!(builder
            .global_inverse_transform()
            .abs_diff_eq(scene.inverse(), 1e-4));
        for matrix in builder.build_frame(0).unwrap().matrices() {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-4));
        }

        // 关闭补偿后场景变换保留在矩阵中
        let config = AnimationConfig {
            compensate_root_transform: false,
            ..AnimationConfig::default()
        };
        let builder = FrameMatrixBuilder::new(
            two_joint_skeleton(),
            nodes,
            &AnimationChannelSet::new("rest"),
            &config,
        )
        .unwrap();
        assert!(builder
            .build_frame(0)
            .unwrap()
            .matrix_for(0)
            .unwrap()
            .abs_diff_eq(scene, 1e-5));
    }

    #[test]
    fn test_single_translation_key_is_clamped() {
        let mut channel = AnimationChannel::new("child");
        channel
            .translation
            .add_keyframe(0.0, Vec3::new(0.0, 1.0, 2.0));
        let mut set = AnimationChannelSet::new("hold");
        set.frame_count = Some(10);
        set.add_channel(channel);

        let builder = FrameMatrixBuilder::new(
            two_joint_skeleton(),
            two_joint_nodes(),
            &set,
            &AnimationConfig::default(),
        )
        .unwrap();

        let first = builder.build_frame(0).unwrap().matrix_for(1).unwrap();
        let last = builder.build_frame(9).unwrap().matrix_for(1).unwrap();
        assert_eq!(first, last);
        assert!(first
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-6));
    }

    #[test]
    fn test_empty_tracks_fall_back_to_static_components() {
        // 只有旋转轨道：平移取节点静态变换中的 (0,1,0)
        let mut channel = AnimationChannel::new("child");
        channel.rotation.add_keyframe(0.0, Quat::from_rotation_z(FRAC_PI_2));
        let mut set = AnimationChannelSet::new("twist");
        set.add_channel(channel);

        let skeleton = two_joint_skeleton();
        let builder = FrameMatrixBuilder::new(
            skeleton.clone(),
            two_joint_nodes(),
            &set,
            &AnimationConfig::default(),
        )
        .unwrap();

        let pose = builder.build_frame(0).unwrap();
        let child_global = pose.matrix_for(1).unwrap() * skeleton.bind_global_matrix(1).unwrap();
        assert!(child_global
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::Y, 1e-6));
        assert!(child_global
            .transform_point3(Vec3::X)
            .abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn test_unnormalized_rotation_keys_are_normalized() {
        let mut channel = AnimationChannel::new("root");
        channel
            .rotation
            .add_keyframe(0.0, Quat::from_xyzw(0.0, 0.0, 0.0, 3.0));
        let mut set = AnimationChannelSet::new("scaled_quat");
        set.add_channel(channel);

        let builder = FrameMatrixBuilder::new(
            two_joint_skeleton(),
            two_joint_nodes(),
            &set,
            &AnimationConfig::default(),
        )
        .unwrap();
        let pose = builder.build_frame(0).unwrap();
        assert!(pose.matrix_for(0).unwrap().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_unknown_target_aborts_clip() {
        let mut set = rotate_root_channels();
        set.add_channel(AnimationChannel::new("tail"));

        let result = FrameMatrixBuilder::new(
            two_joint_skeleton(),
            two_joint_nodes(),
            &set,
            &AnimationConfig::default(),
        );
        assert_eq!(
            result.err(),
            Some(AnimationError::UnknownAnimationTarget {
                clip: "turn".to_string(),
                target: "tail".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let mut set = rotate_root_channels();
        set.add_channel(AnimationChannel::new("root"));

        let result = FrameMatrixBuilder::new(
            two_joint_skeleton(),
            two_joint_nodes(),
            &set,
            &AnimationConfig::default(),
        );
        assert!(matches!(
            result,
            Err(AnimationError::UnknownAnimationTarget { .. })
        ));
    }

    #[test]
    fn test_timestamp_sampling() {
        let mut channel = AnimationChannel::new("child");
        channel.translation.add_keyframe(0.0, Vec3::Y);
        channel.translation.add_keyframe(4.0, Vec3::new(0.0, 2.0, 0.0));
        let mut set = AnimationChannelSet::new("slow");
        set.frame_count = Some(6);
        set.add_channel(channel);

        let config = AnimationConfig {
            sampling: KeySampling::Timestamp,
            ..AnimationConfig::default()
        };
        let builder =
            FrameMatrixBuilder::new(two_joint_skeleton(), two_joint_nodes(), &set, &config)
                .unwrap();

        let at = |frame| {
            builder
                .build_frame(frame)
                .unwrap()
                .matrix_for(1)
                .unwrap()
                .transform_point3(Vec3::ZERO)
        };
        assert!(at(1).abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(at(3).abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(at(4).abs_diff_eq(Vec3::Y, 1e-6));
        assert!(at(5).abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_timestamp_sampling_derives_frame_count_from_times() {
        let mut channel = AnimationChannel::new("child");
        channel.translation.add_keyframe(0.0, Vec3::Y);
        channel.translation.add_keyframe(5.0, Vec3::new(1.0, 1.0, 0.0));
        let mut set = AnimationChannelSet::new("sparse");
        set.add_channel(channel);

        let config = AnimationConfig {
            sampling: KeySampling::Timestamp,
            ..AnimationConfig::default()
        };
        let builder =
            FrameMatrixBuilder::new(two_joint_skeleton(), two_joint_nodes(), &set, &config)
                .unwrap();

        assert_eq!(builder.frame_count(), 6);
        let last = builder
            .build_frame(5)
            .unwrap()
            .matrix_for(1)
            .unwrap()
            .transform_point3(Vec3::ZERO);
        assert!(last.abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_frame_out_of_range_and_buffer_mismatch() {
        let builder = FrameMatrixBuilder::new(
            two_joint_skeleton(),
            two_joint_nodes(),
            &rotate_root_channels(),
            &AnimationConfig::default(),
        )
        .unwrap();

        assert_eq!(
            builder.build_frame(4).err(),
            Some(AnimationError::FrameIndexOutOfRange {
                frame: 4,
                frame_count: 4
            })
        );

        let mut scratch = vec![Mat4::IDENTITY; 1];
        assert!(matches!(
            builder.build_frame_into(0, &mut scratch),
            Err(AnimationError::InvalidClip(_))
        ));

        let mut scratch = vec![Mat4::ZERO; 2];
        builder.build_frame_into(2, &mut scratch).unwrap();
        assert_eq!(scratch, builder.build_frame(2).unwrap().matrices());
    }

    #[test]
    fn test_joint_without_node_keeps_identity() {
        let skeleton = Arc::new(
            SkeletonModel::from_joints(&[
                JointDesc::new("root", -1, Vec3::ZERO, Quat::IDENTITY),
                JointDesc::new("orphan", 0, Vec3::X, Quat::IDENTITY),
            ])
            .unwrap(),
        );
        let nodes = Arc::new(NodeTree::from_desc(&NodeDesc::new("root", Mat4::IDENTITY)).unwrap());

        let builder = FrameMatrixBuilder::new(
            skeleton,
            nodes,
            &AnimationChannelSet::new("rest"),
            &AnimationConfig::default(),
        )
        .unwrap();
        let pose = builder.build_frame(0).unwrap();
        assert_eq!(pose.joint_count(), 2);
        assert_eq!(pose.matrix_for(1).unwrap(), Mat4::IDENTITY);
    }
}
