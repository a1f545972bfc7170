use serde::Serialize;

use crate::node::{MutationState, Node, NodeId, XmlName, walk};

/// 写出端需要处理的一条变更：非 `Original` 状态的节点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Change {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub name: XmlName,
    pub state: MutationState,
}

/// 按文档顺序收集 `root` 子树内所有待写出的变更。
///
/// 复合节点自身的状态不代表子节点，这里逐个节点检查。
pub fn pending_changes(root: &dyn Node) -> Vec<Change> {
    let mut changes = Vec::new();
    walk(root, &mut |node| {
        let meta = node.meta();
        if !meta.is_original() {
            changes.push(Change {
                id: meta.id,
                parent: meta.parent,
                name: meta.name,
                state: meta.state,
            });
        }
    });
    changes
}

pub fn has_pending_changes(root: &dyn Node) -> bool {
    let mut found = false;
    walk(root, &mut |node| {
        found |= !node.meta().is_original();
    });
    found
}
