//! # Game Engine Animation
//!
//! Skeletal animation core: bind-pose skeletons, per-vertex skin weights,
//! precomputed per-frame joint matrices and frame-indexed playback.
//!
//! ## Features
//!
//! - **Skeleton**: Joint hierarchy with bind-global and inverse-bind matrices
//! - **Skinning**: Up to four normalized weights per vertex, GPU-ready vertex layout
//! - **Clips**: Every frame's joint matrices computed once at load time
//! - **Playback**: ECS component driven by a system, wrap or clamp looping
//!
//! ## Architecture Design
//!
//! This crate follows the **Anemic Domain Model (贫血模型)** pattern:
//! - **State (Component)**: `AnimationPlayer` stores playback state
//! - **Service**: `AnimationService` encapsulates playback logic with static methods
//! - **System**: `animation_playback_system` advances every player each tick
//!
//! ### Example
//!
//! ```ignore
//! use game_engine_animation::{AnimationConfig, ModelImport, SkinnedModel};
//!
//! let import = ModelImport::from_json_str(&json)?;
//! let load = SkinnedModel::load(&import, &AnimationConfig::default())?;
//! let walk = load.model.clip("walk").unwrap();
//! let matrices = walk.pose_at(0)?.as_gpu_data();
//! ```
//!
//! ## Modules
//!
//! - [`skeleton`]: Joint hierarchy and bind pose
//! - [`skinning`]: Vertex weights and CPU skinning
//! - [`node`]: Scene node tree that channels target
//! - [`builder`]: Per-frame joint matrix evaluation
//! - [`clip`]: Precomputed animation clips
//! - [`player`] / [`service`]: Playback
//! - [`model`]: Load unit tying everything together

mod macros;

/// Error types
pub mod error;
/// Configuration system
pub mod config;
/// Import records for skeleton, weights, nodes and channels
pub mod import;
/// Keyframe tracks and sampling
pub mod keyframe;
/// Skeleton model built from the joint list
pub mod skeleton;
/// Vertex skinning data
pub mod skinning;
/// Node tree
pub mod node;
/// Animation channels
pub mod channel;
/// Animated pose (one frame of joint matrices)
pub mod pose;
/// Frame matrix builder
pub mod builder;
/// Animation clips
pub mod clip;
/// Playback component and system
pub mod player;
/// Playback service
pub mod service;
/// Skinned model load unit
pub mod model;


pub use builder::FrameMatrixBuilder;
pub use channel::{AnimationChannel, AnimationChannelSet};
pub use clip::AnimationClip;
pub use config::{
    init_logging, AnimationConfig, ConfigError, ConfigResult, LogLevel, LoggingConfig,
    PlaybackConfig,
};
pub use error::{AnimationError, AnimationResult, SkinningWarning};
pub use import::{
    reconstruct_quat_w, AnimationDesc, ChannelDesc, JointDesc, ModelImport, NodeDesc,
    SkinningSource, VertexContribution, VertexWeight,
};
pub use keyframe::{KeySampling, Keyframe, KeyframeTrack};
pub use model::{MeshKind, ModelLoad, SkinnedMesh, SkinnedModel, StaticMesh};
pub use node::{Node, NodeIndex, NodeTree};
pub use player::{animation_playback_system, AnimationPlayer, LoopMode, PlaybackTime};
pub use pose::AnimatedPose;
pub use service::AnimationService;
pub use skeleton::{BoneTransform, Joint, SkeletonModel};
pub use skinning::{
    NormalSkinning, SkinnedGeometry, SkinnedVertex, VertexSkinningData, Winding, MAX_WEIGHTS,
};
