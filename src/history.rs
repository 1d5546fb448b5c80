//! Bounded undo/redo history over deep-cloned graph snapshots.
//!
//! The stack is linear with a current index. Saving while undone past the
//! top discards the redo branch; exceeding the ceiling evicts the oldest
//! entry while the index stays put, so a long session keeps the most
//! recent fifty states.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::graph::{Graph, Selection};

pub const MAX_HISTORY: usize = 50;

/// One recorded state: the graph and selection as they were right after
/// a committing mutation. Entries are immutable once pushed.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub graph: Graph,
    pub selection: Selection,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// A row of the visible history stack, for panel-style listings.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub index: usize,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub is_current: bool,
}

/// Position summary: which entry is current out of how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryInfo {
    pub current: isize,
    pub total: usize,
}

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    /// Index of the entry describing the present state; -1 when empty.
    current: isize,
    replaying: bool,
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current: -1,
            replaying: false,
        }
    }

    /// Record a snapshot. Ignored while an undo/redo retrieval is in
    /// flight. Discards any redo branch, then appends; past the ceiling
    /// the oldest entry is evicted and the index is left alone.
    pub fn save(&mut self, graph: &Graph, selection: &Selection, description: &str) {
        if self.replaying {
            return;
        }
        self.entries.truncate((self.current + 1).max(0) as usize);
        self.entries.push(HistoryEntry {
            graph: graph.clone(),
            selection: selection.clone(),
            description: description.to_string(),
            timestamp: Utc::now(),
        });
        if self.entries.len() > MAX_HISTORY {
            self.entries.remove(0);
        } else {
            self.current += 1;
        }
        debug!(
            description,
            total = self.entries.len(),
            current = self.current,
            "saved history entry"
        );
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current < self.entries.len() as isize - 1
    }

    /// Step back one entry and return a deep clone of it, or `None` at
    /// the bottom of the stack.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.replaying = true;
        self.current -= 1;
        let entry = self.entries[self.current as usize].clone();
        self.replaying = false;
        Some(entry)
    }

    /// Step forward one entry and return a deep clone of it, or `None`
    /// at the top of the stack.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        self.replaying = true;
        self.current += 1;
        let entry = self.entries[self.current as usize].clone();
        self.replaying = false;
        Some(entry)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = -1;
        self.replaying = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn info(&self) -> HistoryInfo {
        HistoryInfo {
            current: self.current,
            total: self.entries.len(),
        }
    }

    /// Description of the entry the present state corresponds to.
    pub fn current_description(&self) -> Option<&str> {
        usize::try_from(self.current)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(|e| e.description.as_str())
    }

    /// The visible stack, oldest first, with the current entry marked.
    pub fn rows(&self) -> Vec<HistoryRow> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| HistoryRow {
                index,
                description: entry.description.clone(),
                timestamp: entry.timestamp,
                is_current: index as isize == self.current,
            })
            .collect()
    }
}
