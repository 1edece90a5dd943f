//! Snapshot-based undo/redo.

use crate::canvas::Scene;

/// Undo and redo stacks of whole-scene snapshots.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<Scene>,
    redo_stack: Vec<Scene>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the state before a change (call before mutating).
    pub fn push(&mut self, snapshot: Scene) {
        self.undo_stack.push(snapshot);
        // New changes invalidate anything undone
        self.redo_stack.clear();
        if self.undo_stack.len() > self.limit {
            self.undo_stack.remove(0);
        }
    }

    /// Step back. `current` goes onto the redo stack and the scene to
    /// restore is returned, or `None` if there is nothing to undo.
    pub fn undo(&mut self, current: Scene) -> Option<Scene> {
        let snapshot = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(snapshot)
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: Scene) -> Option<Scene> {
        let snapshot = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
