//! A replica: the register store wired to its derived tree view.
//!
//! All mutation flows through [`TreeReplica`], which serializes store
//! applies, observer fan-out, and tree recomputation. The tree sits behind a
//! mutex captured by a store observer; the lock is never held across a store
//! call, so observer recomputes never run re-entrantly.

use crate::error::{Result, TreeError};
use crate::op::{NodeId, Op, Origin, PeerId, TOMBSTONE};
use crate::planner::{self, Edit};
use crate::store::RegisterStore;
use crate::tree::{OrphanPolicy, TreeView};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct TreeReplica {
    store: RegisterStore,
    tree: Arc<Mutex<TreeView>>,
}

impl TreeReplica {
    pub fn new(peer: PeerId) -> Self {
        Self::with_policy(peer, OrphanPolicy::default())
    }

    pub fn with_policy(peer: PeerId, policy: OrphanPolicy) -> Self {
        let mut store = RegisterStore::new(peer);
        let tree = Arc::new(Mutex::new(TreeView::with_policy(policy)));

        let view = tree.clone();
        store.after_apply(move |op, _origin, prev| {
            view.lock().observe(op, prev);
        });

        Self { store, tree }
    }

    pub fn peer(&self) -> &PeerId {
        self.store.peer()
    }

    /// Read access to the underlying register store.
    pub fn store(&self) -> &RegisterStore {
        &self.store
    }

    /// Register an observer on the op stream, e.g. the outbound broadcast
    /// hook. Fires after the tree view has already caught up.
    pub fn after_apply<F>(&mut self, observer: F)
    where
        F: FnMut(&Op, Origin, Option<&crate::op::Row>) + Send + 'static,
    {
        self.store.after_apply(observer);
    }

    /// Apply an op (typically `Origin::Remote` from the relay). Returns
    /// whether the store accepted it; the tree recomputes either way.
    pub fn apply(&mut self, op: Op, origin: Origin) -> bool {
        self.store.apply(op, origin)
    }

    /// Issue a raw local register write.
    pub fn set_value(&mut self, id: NodeId, key: NodeId, value: i32) -> Op {
        self.store.set_value(id, key, value)
    }

    /// Make `child` a child of `parent`. The child is materialized on
    /// demand; the parent must already be known. Returns the ops emitted,
    /// one per planned edit.
    pub fn add_child(&mut self, child: &NodeId, parent: &NodeId) -> Result<Vec<Op>> {
        let edits: Vec<Edit> = {
            let mut tree = self.tree.lock();
            if !tree.contains(parent) {
                return Err(TreeError::UnknownParent(parent.clone()));
            }
            tree.ensure_node(child);
            planner::plan_reparent(&tree, child, parent)
        };

        let mut ops = Vec::with_capacity(edits.len());
        for Edit { child, parent } in edits {
            // Each write triggers a recompute, so later edits must read the
            // counters the earlier ones produced.
            let counter = planner::next_counter(&self.tree.lock(), &child);
            ops.push(self.store.set_value(child, parent, counter));
        }
        Ok(ops)
    }

    /// Detach `child` from its currently chosen parent by retracting the
    /// winning edge. Returns the emitted op, or `None` when the child has no
    /// chosen edge to retract.
    pub fn detach(&mut self, child: &NodeId) -> Result<Option<Op>> {
        let chosen = {
            let tree = self.tree.lock();
            if !tree.contains(child) {
                return Err(TreeError::UnknownNode(child.clone()));
            }
            tree.candidate_parent(child).cloned()
        };
        Ok(chosen.map(|parent| self.store.set_value(child.clone(), parent, TOMBSTONE)))
    }

    /// Materialize a node in the tree view without writing any register.
    pub fn ensure_node(&self, id: &NodeId) {
        self.tree.lock().ensure_node(id);
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.tree.lock().contains(id)
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<NodeId> {
        self.tree.lock().parent_of(id).cloned()
    }

    pub fn children_of(&self, id: &NodeId) -> Vec<NodeId> {
        self.tree.lock().children_of(id).to_vec()
    }

    /// All known node ids, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.tree.lock().node_ids()
    }

    /// Run `f` against a consistent snapshot of the tree view.
    pub fn with_tree<R>(&self, f: impl FnOnce(&TreeView) -> R) -> R {
        f(&self.tree.lock())
    }

    pub fn render_with(&self, label: &dyn Fn(&NodeId) -> String) -> String {
        self.tree.lock().render_with(label)
    }

    pub fn render_text(&self) -> String {
        self.tree.lock().render_text()
    }
}
