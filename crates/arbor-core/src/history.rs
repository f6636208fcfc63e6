//! Observer-based undo/redo over the register store.
//!
//! The history records, for every locally issued op, the value the register
//! held before the write. Undo writes those values back as fresh local ops
//! (so the reversal replicates like any other edit); a register that had no
//! previous value is reverted with the retraction sentinel. Consecutive
//! writes can be grouped into one step with [`History::batch`].

use crate::op::{NodeId, Origin, TOMBSTONE};
use crate::replica::TreeReplica;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// One recorded register write: the value `(id, key)` held before a local op.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Change {
    id: NodeId,
    key: NodeId,
    value: Option<i32>,
}

#[derive(Default)]
struct HistoryState {
    undo: Vec<Vec<Change>>,
    redo: Vec<Vec<Change>>,
    pending: Vec<Change>,
    /// Set while history itself is writing, so reversals are not recorded.
    busy: bool,
    /// Batch nesting depth; commits happen only at depth zero.
    depth: usize,
}

impl HistoryState {
    fn commit(&mut self) {
        if !self.pending.is_empty() {
            self.undo.push(std::mem::take(&mut self.pending));
            self.redo.clear();
        }
    }
}

/// Undo/redo stack fed by the replica's op stream.
pub struct History {
    state: Arc<Mutex<HistoryState>>,
}

impl History {
    /// Attach to a replica, recording every local write.
    pub fn attach(replica: &mut TreeReplica) -> Self {
        Self::attach_inner(replica, None)
    }

    /// Attach to a replica, recording only writes whose register key is in
    /// `only_keys`.
    pub fn attach_scoped(
        replica: &mut TreeReplica,
        only_keys: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self::attach_inner(replica, Some(only_keys.into_iter().collect()))
    }

    fn attach_inner(replica: &mut TreeReplica, only_keys: Option<HashSet<NodeId>>) -> Self {
        let state = Arc::new(Mutex::new(HistoryState::default()));
        let recorder = state.clone();
        replica.after_apply(move |op, origin, prev| {
            if origin != Origin::Local {
                return;
            }
            let mut state = recorder.lock();
            if state.busy {
                return;
            }
            if let Some(keys) = &only_keys {
                if !keys.contains(&op.key) {
                    return;
                }
            }
            state.pending.push(Change {
                id: op.id.clone(),
                key: op.key.clone(),
                value: prev.map(|row| row.value),
            });
            if state.depth == 0 {
                state.commit();
            }
        });
        Self { state }
    }

    /// Group every local write made inside `f` into a single undo step.
    /// Batches nest; the group commits when the outermost batch ends.
    pub fn batch<R>(&self, replica: &mut TreeReplica, f: impl FnOnce(&mut TreeReplica) -> R) -> R {
        self.state.lock().depth += 1;
        let result = f(replica);
        let mut state = self.state.lock();
        state.depth -= 1;
        if state.depth == 0 {
            state.commit();
        }
        result
    }

    /// Revert the most recent step. Returns false when there is nothing to
    /// undo.
    pub fn undo(&self, replica: &mut TreeReplica) -> bool {
        let batch = self.state.lock().undo.pop();
        match batch {
            Some(batch) => {
                let reverse = self.write_back(replica, batch);
                self.state.lock().redo.push(reverse);
                true
            }
            None => false,
        }
    }

    /// Re-apply the most recently undone step.
    pub fn redo(&self, replica: &mut TreeReplica) -> bool {
        let batch = self.state.lock().redo.pop();
        match batch {
            Some(batch) => {
                let reverse = self.write_back(replica, batch);
                self.state.lock().undo.push(reverse);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.state.lock().undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.state.lock().redo.is_empty()
    }

    /// Write a batch of recorded values back through the store, collecting
    /// the inverse batch for the opposite stack.
    fn write_back(&self, replica: &mut TreeReplica, batch: Vec<Change>) -> Vec<Change> {
        self.state.lock().busy = true;
        let mut reverse = Vec::with_capacity(batch.len());
        for change in batch {
            reverse.push(Change {
                id: change.id.clone(),
                key: change.key.clone(),
                value: replica.store().value_of(&change.id, &change.key),
            });
            replica.set_value(change.id, change.key, change.value.unwrap_or(TOMBSTONE));
        }
        self.state.lock().busy = false;
        reverse.reverse();
        reverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{Op, PeerId};

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn test_undo_reverts_a_reparent() {
        let mut replica = TreeReplica::new(PeerId::from("p1"));
        let history = History::attach(&mut replica);

        replica.add_child(&id("A"), &NodeId::root()).expect("root");
        replica.add_child(&id("B"), &id("A")).expect("A exists");
        assert_eq!(replica.parent_of(&id("B")), Some(id("A")));

        assert!(history.undo(&mut replica));
        assert_eq!(replica.parent_of(&id("B")), None);

        assert!(history.redo(&mut replica));
        assert_eq!(replica.parent_of(&id("B")), Some(id("A")));
    }

    #[test]
    fn test_undo_restores_the_previous_parent() {
        let mut replica = TreeReplica::new(PeerId::from("p1"));
        let history = History::attach(&mut replica);

        replica.add_child(&id("A"), &NodeId::root()).expect("root");
        replica.add_child(&id("B"), &NodeId::root()).expect("root");
        replica.add_child(&id("C"), &id("A")).expect("A exists");
        replica.add_child(&id("C"), &id("B")).expect("B exists");
        assert_eq!(replica.parent_of(&id("C")), Some(id("B")));

        assert!(history.undo(&mut replica));
        assert_eq!(replica.parent_of(&id("C")), Some(id("A")));
    }

    #[test]
    fn test_batch_groups_edits_into_one_step() {
        let mut replica = TreeReplica::new(PeerId::from("p1"));
        let history = History::attach(&mut replica);

        history.batch(&mut replica, |replica| {
            replica.add_child(&id("A"), &NodeId::root()).expect("root");
            replica.add_child(&id("B"), &NodeId::root()).expect("root");
        });

        assert!(history.undo(&mut replica));
        assert_eq!(replica.parent_of(&id("A")), None);
        assert_eq!(replica.parent_of(&id("B")), None);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_remote_ops_are_not_recorded() {
        let mut replica = TreeReplica::new(PeerId::from("p1"));
        let history = History::attach(&mut replica);

        replica.apply(
            Op {
                id: id("A"),
                key: NodeId::root(),
                value: 0,
                peer: PeerId::from("p2"),
                timestamp: 1,
            },
            Origin::Remote,
        );
        assert!(!history.can_undo());
    }

    #[test]
    fn test_new_edit_clears_the_redo_stack() {
        let mut replica = TreeReplica::new(PeerId::from("p1"));
        let history = History::attach(&mut replica);

        replica.add_child(&id("A"), &NodeId::root()).expect("root");
        assert!(history.undo(&mut replica));
        assert!(history.can_redo());

        replica.add_child(&id("B"), &NodeId::root()).expect("root");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_scoped_history_ignores_other_keys() {
        let mut replica = TreeReplica::new(PeerId::from("p1"));
        let history = History::attach_scoped(&mut replica, [NodeId::root()]);

        replica.add_child(&id("A"), &NodeId::root()).expect("root");
        replica.add_child(&id("B"), &id("A")).expect("A exists");

        // Only the write keyed by ROOT was recorded.
        assert!(history.undo(&mut replica));
        assert_eq!(replica.parent_of(&id("A")), None);
        assert_eq!(replica.parent_of(&id("B")), Some(id("A")));
        assert!(!history.can_undo());
    }
}
