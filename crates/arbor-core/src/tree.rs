//! Derived tree view over the register store.
//!
//! The view observes every applied op, maintains each node's candidate-edge
//! map, and rematerializes a rooted forest: tentative parents from the raw
//! edges, cycle detection over the parent chain, then a deterministic
//! reattachment of everything that lost its path to the root. Given
//! identical register contents, every replica derives the identical tree.

use crate::op::{NodeId, Op, Row, TOMBSTONE};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

/// What to do with nodes that still cannot reach the root after
/// reattachment: islands whose every edge stays inside the island.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Leave islands with their tentative parents. Matches the historical
    /// behavior; an island may keep an internal parent cycle.
    #[default]
    LeaveInPlace,
    /// Deterministically re-root each island at the tree root, preserving
    /// the single-forest invariant.
    ReattachRoot,
}

/// One node of the derived tree. Nodes are created lazily on first
/// appearance in an op and never removed.
#[derive(Clone, Debug, Default)]
pub struct TreeNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Candidate parents with their counters. Ordered map so iteration is
    /// deterministic across replicas.
    edges: BTreeMap<NodeId, i32>,
}

/// A candidate edge from a non-rooted child into the rooted region.
///
/// The heap ordering is the inverse of the candidate-parent rule: it must
/// pop exactly the edge that [`TreeView::candidate_parent`] would pick if
/// that edge were the only candidate. Child id is the final tiebreak so the
/// order is total.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CrossEdge {
    counter: i32,
    parent: NodeId,
    child: NodeId,
}

impl Ord for CrossEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.parent.cmp(&other.parent))
            .then_with(|| self.child.cmp(&other.child))
    }
}

impl PartialOrd for CrossEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The materialized tree.
pub struct TreeView {
    root: NodeId,
    nodes: HashMap<NodeId, TreeNode>,
    policy: OrphanPolicy,
}

impl TreeView {
    pub fn new() -> Self {
        Self::with_policy(OrphanPolicy::default())
    }

    pub fn with_policy(policy: OrphanPolicy) -> Self {
        let root = NodeId::root();
        let mut nodes = HashMap::new();
        nodes.insert(root.clone(), TreeNode::default());
        Self { root, nodes, policy }
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn policy(&self) -> OrphanPolicy {
        self.policy
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Materialize a node without touching any register.
    pub fn ensure_node(&mut self, id: &NodeId) {
        self.nodes.entry(id.clone()).or_default();
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.nodes.get(id).and_then(|node| node.parent.as_ref())
    }

    pub fn children_of(&self, id: &NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// All node ids, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The node's candidate edges `(parent, counter)`.
    pub fn edges_of<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = (&'a NodeId, i32)> + 'a {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|node| node.edges.iter().map(|(parent, &counter)| (parent, counter)))
    }

    /// The edge with the largest counter, ties broken by the greater
    /// identifier. Negative counters are reserved and never win.
    pub fn candidate_parent(&self, id: &NodeId) -> Option<&NodeId> {
        let node = self.nodes.get(id)?;
        let mut best: Option<(&NodeId, i32)> = None;
        for (parent, &counter) in &node.edges {
            if counter < 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_id, best_counter)) => {
                    counter > best_counter || (counter == best_counter && parent > best_id)
                }
            };
            if better {
                best = Some((parent, counter));
            }
        }
        best.map(|(parent, _)| parent)
    }

    /// Feed one observed op and rematerialize.
    ///
    /// The store has already resolved the write, so the edge is updated from
    /// the register's current value, not the op payload: a losing op must
    /// not overwrite the winning edge, or replicas that saw a different
    /// arrival order would diverge.
    pub fn observe(&mut self, op: &Op, prev: Option<&Row>) {
        self.ensure_node(&op.key);
        self.ensure_node(&op.id);

        let current = match prev {
            Some(row) if row.dominates(op) => row.value,
            _ => op.value,
        };
        if let Some(child) = self.nodes.get_mut(&op.id) {
            if current == TOMBSTONE {
                child.edges.remove(&op.key);
            } else {
                child.edges.insert(op.key.clone(), current);
            }
        }

        self.recompute();
    }

    /// Indented listing of the subtree under the root, labels resolved
    /// through `label`.
    pub fn render_with(&self, label: &dyn Fn(&NodeId) -> String) -> String {
        let mut out = String::new();
        let mut stack: Vec<(&NodeId, usize)> = vec![(&self.root, 0)];
        while let Some((id, indent)) = stack.pop() {
            out.push_str(&" ".repeat(indent));
            out.push_str(&label(id));
            out.push('\n');
            if let Some(node) = self.nodes.get(id) {
                for child in node.children.iter().rev() {
                    stack.push((child, indent + 2));
                }
            }
        }
        out
    }

    pub fn render_text(&self) -> String {
        self.render_with(&|id| id.to_string())
    }

    fn parent_ref(&self, id: &NodeId) -> Option<&NodeId> {
        self.nodes.get(id).and_then(|node| node.parent.as_ref())
    }

    /// True when the tentative-parent chain from `id` reaches `target`.
    /// Safe in the presence of parent cycles: Floyd's tortoise and hare,
    /// the tortoise advancing one step for every two of the hare's.
    fn reaches(&self, id: &NodeId, target: &NodeId) -> bool {
        if id == target {
            return true;
        }
        let mut tortoise = id;
        let mut hare = id;
        let mut lag = false;
        loop {
            hare = match self.parent_ref(hare) {
                Some(parent) => parent,
                None => return false,
            };
            if hare == target {
                return true;
            }
            if lag {
                tortoise = match self.parent_ref(tortoise) {
                    Some(parent) => parent,
                    None => return false,
                };
            }
            lag = !lag;
            if hare == tortoise {
                return false;
            }
        }
    }

    /// Rematerialize parents and children from the edge maps.
    fn recompute(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();

        // Phase 1: tentative parents from the raw edges, children cleared.
        // The root's own edges are ignored for parenting.
        for id in &ids {
            let candidate = if *id == self.root {
                None
            } else {
                self.candidate_parent(id)
                    .cloned()
                    .filter(|parent| self.nodes.contains_key(parent))
            };
            if let Some(node) = self.nodes.get_mut(id) {
                node.parent = candidate;
                node.children.clear();
            }
        }

        // Phase 2: gather every node that cannot reach the root, together
        // with everything touched while walking its chain.
        let mut non_rooted: HashSet<NodeId> = HashSet::new();
        for id in &ids {
            if !self.reaches(id, &self.root) {
                let mut cursor = Some(id.clone());
                while let Some(current) = cursor {
                    if !non_rooted.insert(current.clone()) {
                        break;
                    }
                    cursor = self.parent_ref(&current).cloned();
                }
            }
        }

        // Phase 3: reattach across edges that lead into the rooted region,
        // newest counter first. Edges whose parent is itself non-rooted are
        // deferred until that parent is reattached.
        if !non_rooted.is_empty() {
            let mut deferred: HashMap<NodeId, Vec<CrossEdge>> = HashMap::new();
            let mut ready: BinaryHeap<CrossEdge> = BinaryHeap::new();

            for child in &non_rooted {
                for (parent, &counter) in &self.nodes[child].edges {
                    let edge = CrossEdge {
                        counter,
                        parent: parent.clone(),
                        child: child.clone(),
                    };
                    if non_rooted.contains(parent) {
                        deferred.entry(parent.clone()).or_default().push(edge);
                    } else {
                        ready.push(edge);
                    }
                }
            }

            while let Some(edge) = ready.pop() {
                if !non_rooted.remove(&edge.child) {
                    continue; // already reattached through a better edge
                }
                if let Some(node) = self.nodes.get_mut(&edge.child) {
                    node.parent = Some(edge.parent);
                }
                if let Some(promoted) = deferred.remove(&edge.child) {
                    for edge in promoted {
                        ready.push(edge);
                    }
                }
            }

            // A node whose only edge points at itself would keep a tentative
            // self-parent; clear it so no derived parent is ever the node
            // itself. The node becomes the root of its island.
            for id in &non_rooted {
                if let Some(node) = self.nodes.get_mut(id) {
                    if node.parent.as_ref() == Some(id) {
                        node.parent = None;
                    }
                }
            }

            if self.policy == OrphanPolicy::ReattachRoot && !non_rooted.is_empty() {
                let mut leftovers: Vec<NodeId> = non_rooted.into_iter().collect();
                leftovers.sort();
                let root = self.root.clone();
                for id in leftovers {
                    // Rooting the first member of an island roots the rest.
                    if !self.reaches(&id, &root) {
                        if let Some(node) = self.nodes.get_mut(&id) {
                            node.parent = Some(root.clone());
                        }
                    }
                }
            }
        }

        // Phase 4: rebuild the child lists, sorted by identifier so every
        // replica renders siblings in the same order.
        let mut links: Vec<(NodeId, NodeId)> = Vec::new();
        for (id, node) in &self.nodes {
            if let Some(parent) = &node.parent {
                if parent != id {
                    links.push((parent.clone(), id.clone()));
                }
            }
        }
        for (parent, child) in links {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }
        for node in self.nodes.values_mut() {
            node.children.sort();
        }
    }
}

impl Default for TreeView {
    fn default() -> Self {
        Self::new()
    }
}
