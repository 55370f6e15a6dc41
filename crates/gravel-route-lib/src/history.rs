//! Caller-owned undo/redo history of route snapshots
//!
//! The engine keeps no history of its own. Callers record a snapshot before each mutating
//! call and apply the snapshot returned by [`RouteHistory::undo`] / [`RouteHistory::redo`]
//! through [`crate::RouteEngine::restore`].

use crate::geodesy::RoutePoint;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of snapshots kept per stack
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Immutable copy of the persistent part of a route
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub points: Vec<RoutePoint>,
    pub loop_closed: bool,
}

/// Bounded undo/redo stacks
#[derive(Clone, Debug)]
pub struct RouteHistory {
    undo_stack: VecDeque<RouteSnapshot>,
    redo_stack: VecDeque<RouteSnapshot>,
    max_depth: usize,
}

impl Default for RouteHistory {
    fn default() -> Self {
        Self::with_depth(DEFAULT_HISTORY_DEPTH)
    }
}

impl RouteHistory {
    /// Create a history keeping at most `max_depth` snapshots per stack (minimum 1)
    pub fn with_depth(max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            undo_stack: VecDeque::with_capacity(max_depth),
            redo_stack: VecDeque::new(),
            max_depth,
        }
    }

    /// Record the state before a mutation. Invalidates the redo stack.
    pub fn record(&mut self, snapshot: RouteSnapshot) {
        Self::push_bounded(&mut self.undo_stack, snapshot, self.max_depth);
        self.redo_stack.clear();
    }

    /// Pop the most recent snapshot, moving `current` onto the redo stack.
    pub fn undo(&mut self, current: RouteSnapshot) -> Option<RouteSnapshot> {
        let previous = self.undo_stack.pop_back()?;
        Self::push_bounded(&mut self.redo_stack, current, self.max_depth);
        Some(previous)
    }

    /// Pop the most recently undone snapshot, moving `current` back onto the undo stack.
    pub fn redo(&mut self, current: RouteSnapshot) -> Option<RouteSnapshot> {
        let next = self.redo_stack.pop_back()?;
        Self::push_bounded(&mut self.undo_stack, current, self.max_depth);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of snapshots available to undo
    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn push_bounded(stack: &mut VecDeque<RouteSnapshot>, snapshot: RouteSnapshot, max: usize) {
        if stack.len() >= max {
            stack.pop_front();
        }
        stack.push_back(snapshot);
    }
}
