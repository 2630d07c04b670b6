//! 场景节点层级
//!
//! 节点存放在一个按先序排列的数组里，父子关系使用整数索引。
//! 名称只在构建时解析一次，运行时不做基于名称的指针追踪。

use glam::Mat4;
use std::collections::HashMap;

use crate::error::{AnimationError, AnimationResult};
use crate::import::NodeDesc;

/// 节点在 [`NodeTree`] 中的索引
pub type NodeIndex = usize;

/// 层级节点
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    /// 父节点（None 表示根节点）
    pub parent: Option<NodeIndex>,
    /// 有序子节点
    pub children: Vec<NodeIndex>,
    /// 无动画通道时使用的局部变换
    pub static_local_transform: Mat4,
}

/// 节点树
///
/// 先序存储：索引 0 为根，每个父节点的索引都小于其子节点。
#[derive(Clone, Debug)]
pub struct NodeTree {
    nodes: Vec<Node>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl NodeTree {
    /// 从嵌套节点描述构建
    pub fn from_desc(root: &NodeDesc) -> AnimationResult<Self> {
        let mut tree = Self {
            nodes: Vec::new(),
            name_to_index: HashMap::new(),
        };

        let mut stack: Vec<(&NodeDesc, Option<NodeIndex>)> = vec![(root, None)];
        while let Some((desc, parent)) = stack.pop() {
            let index = tree.push_node(&desc.name, parent, desc.static_local_transform)?;
            for child in desc.children.iter().rev() {
                stack.push((child, Some(index)));
            }
        }

        tracing::debug!(target: "animation", "Built node tree with {} nodes", tree.nodes.len());
        Ok(tree)
    }

    /// 从扁平列表构建（通过 `parent_name` 关联）
    ///
    /// 必须恰好有一个根节点；未知父节点、重名、环都会报错。
    /// 扁平形式下各条目的 `children` 字段被忽略。
    pub fn from_flat(descs: &[NodeDesc]) -> AnimationResult<Self> {
        let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(descs.len());
        for (i, desc) in descs.iter().enumerate() {
            if by_name.insert(desc.name.as_str(), i).is_some() {
                return Err(AnimationError::MalformedNodeTree(format!(
                    "duplicate node name '{}'",
                    desc.name
                )));
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); descs.len()];
        let mut roots = Vec::new();
        for (i, desc) in descs.iter().enumerate() {
            match &desc.parent_name {
                None => roots.push(i),
                Some(parent_name) => {
                    let parent = by_name.get(parent_name.as_str()).ok_or_else(|| {
                        AnimationError::MalformedNodeTree(format!(
                            "node '{}' references unknown parent '{}'",
                            desc.name, parent_name
                        ))
                    })?;
                    children[*parent].push(i);
                }
            }
        }

        let root = match roots.as_slice() {
            [root] => *root,
            [] => {
                return Err(AnimationError::MalformedNodeTree(
                    "node list has no root (cyclic parent chain?)".to_string(),
                ))
            }
            _ => {
                return Err(AnimationError::MalformedNodeTree(format!(
                    "node list has {} roots, expected exactly one",
                    roots.len()
                )))
            }
        };

        let mut tree = Self {
            nodes: Vec::with_capacity(descs.len()),
            name_to_index: HashMap::with_capacity(descs.len()),
        };
        let mut stack: Vec<(usize, Option<NodeIndex>)> = vec![(root, None)];
        while let Some((desc_index, parent)) = stack.pop() {
            let desc = &descs[desc_index];
            let index = tree.push_node(&desc.name, parent, desc.static_local_transform)?;
            for &child in children[desc_index].iter().rev() {
                stack.push((child, Some(index)));
            }
        }

        // 不可达的节点只可能位于环中
        if tree.nodes.len() != descs.len() {
            return Err(AnimationError::MalformedNodeTree(format!(
                "{} nodes are unreachable from root '{}' (cyclic parent chain)",
                descs.len() - tree.nodes.len(),
                descs[root].name
            )));
        }

        Ok(tree)
    }

    fn push_node(
        &mut self,
        name: &str,
        parent: Option<NodeIndex>,
        static_local_transform: Mat4,
    ) -> AnimationResult<NodeIndex> {
        let index = self.nodes.len();
        if self.name_to_index.insert(name.to_string(), index).is_some() {
            return Err(AnimationError::MalformedNodeTree(format!(
                "duplicate node name '{}'",
                name
            )));
        }
        if !static_local_transform.is_finite() {
            return Err(AnimationError::MalformedNodeTree(format!(
                "node '{}' has a non-finite static transform",
                name
            )));
        }
        if let Some(parent) = parent {
            self.nodes[parent].children.push(index);
        }
        self.nodes.push(Node {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            static_local_transform,
        });
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// 先序排列的全部节点
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.name_to_index.get(name).copied()
    }

    /// 只使用静态变换时节点的全局变换
    pub fn static_global_transform(&self, index: NodeIndex) -> Option<Mat4> {
        let mut node = self.nodes.get(index)?;
        let mut global = node.static_local_transform;
        while let Some(parent) = node.parent {
            node = &self.nodes[parent];
            global = node.static_local_transform * global;
        }
        Some(global)
    }
}
