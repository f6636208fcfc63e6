//! Edit planning: translating "make C a child of P" into register writes.
//!
//! A reparent is not always a single write. If an ancestor of either
//! endpoint is only rooted because the materialization broke a cycle (its
//! derived parent disagrees with its raw candidate edge), the move could
//! hand that cycle a path back. Those ancestors are re-anchored first so the
//! change survives on every replica.

use crate::op::NodeId;
use crate::tree::TreeView;

/// One pending register write: `child` anchors under `parent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    pub child: NodeId,
    pub parent: NodeId,
}

/// Plan the writes for reparenting `child` under `parent`: re-anchoring
/// edits for both endpoints' ancestor chains, then the primary edit.
pub fn plan_reparent(tree: &TreeView, child: &NodeId, parent: &NodeId) -> Vec<Edit> {
    let mut edits = Vec::new();
    if let Some(current) = tree.parent_of(child) {
        ensure_chain_anchored(tree, current, &mut edits);
    }
    ensure_chain_anchored(tree, parent, &mut edits);
    edits.push(Edit {
        child: child.clone(),
        parent: parent.clone(),
    });
    edits
}

/// The counter that makes a write on `child` win immediately: strictly
/// greater than every counter currently observed on that node.
pub fn next_counter(tree: &TreeView, child: &NodeId) -> i32 {
    tree.edges_of(child)
        .map(|(_, counter)| counter)
        .fold(-1, i32::max)
        + 1
}

/// Walk up the derived-parent chain from `start`. Wherever the derivation
/// disagrees with the raw candidate edge, a cycle was broken there; queue an
/// edit pinning the node to its derived parent. The walk stops on revisit:
/// an orphan island left in place can keep a parent cycle.
fn ensure_chain_anchored(tree: &TreeView, start: &NodeId, edits: &mut Vec<Edit>) {
    let mut visited = std::collections::HashSet::new();
    let mut cursor = start.clone();
    while let Some(parent) = tree.parent_of(&cursor) {
        if !visited.insert(cursor.clone()) {
            break;
        }
        if tree.candidate_parent(&cursor) != Some(parent) {
            edits.push(Edit {
                child: cursor.clone(),
                parent: parent.clone(),
            });
        }
        cursor = parent.clone();
    }
}
