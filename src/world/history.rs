//! Linear undo/redo over whole-world snapshots.

use chrono::{DateTime, Utc};

use crate::heightfield::HeightField;
use crate::world::TileCoord;

/// Heights of every tile at one point in time.
#[derive(Clone, Debug)]
pub struct WorldSnapshot {
    pub label: String,
    pub captured_at: DateTime<Utc>,
    pub tiles: Vec<(TileCoord, HeightField)>,
}

impl WorldSnapshot {
    pub fn new(label: impl Into<String>, tiles: Vec<(TileCoord, HeightField)>) -> Self {
        Self {
            label: label.into(),
            captured_at: Utc::now(),
            tiles,
        }
    }
}

/// Snapshots in order plus an index to the one that matches the live state.
///
/// Recording after an undo discards everything past the current index, so
/// history never branches. When more than `max_snapshots` are kept the
/// oldest is dropped.
#[derive(Clone, Debug)]
pub struct History {
    snapshots: Vec<WorldSnapshot>,
    current: usize,
    max_snapshots: usize,
}

pub const DEFAULT_MAX_SNAPSHOTS: usize = 32;

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SNAPSHOTS)
    }
}

impl History {
    /// At least two snapshots are always kept so one undo is possible.
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            current: 0,
            max_snapshots: max_snapshots.max(2),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        if self.snapshots.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    pub fn labels(&self) -> Vec<&str> {
        self.snapshots.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty() && self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.snapshots.len()
    }

    /// Append a snapshot after the current one.
    pub fn record(&mut self, snapshot: WorldSnapshot) {
        if !self.snapshots.is_empty() {
            let dropped = self.snapshots.len() - (self.current + 1);
            if dropped > 0 {
                tracing::debug!("discarding {} redo snapshot(s)", dropped);
            }
            self.snapshots.truncate(self.current + 1);
        }
        self.snapshots.push(snapshot);
        if self.snapshots.len() > self.max_snapshots {
            self.snapshots.remove(0);
        }
        self.current = self.snapshots.len() - 1;
    }

    /// Step back; returns the snapshot to restore.
    pub fn undo(&mut self) -> Option<&WorldSnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.current -= 1;
        self.snapshots.get(self.current)
    }

    /// Step forward; returns the snapshot to restore.
    pub fn redo(&mut self) -> Option<&WorldSnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.current += 1;
        self.snapshots.get(self.current)
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(label: &str) -> WorldSnapshot {
        WorldSnapshot::new(label, Vec::new())
    }

    #[test]
    fn test_undo_redo_walks_the_list() {
        let mut history = History::new(10);
        assert!(!history.can_undo());
        history.record(snap("a"));
        history.record(snap("b"));
        history.record(snap("c"));

        assert_eq!(history.undo().map(|s| s.label.clone()), Some("b".to_string()));
        assert_eq!(history.undo().map(|s| s.label.clone()), Some("a".to_string()));
        assert!(history.undo().is_none());
        assert_eq!(history.redo().map(|s| s.label.clone()), Some("b".to_string()));
        assert_eq!(history.current_index(), Some(1));
    }

    #[test]
    fn test_record_after_undo_truncates() {
        let mut history = History::new(10);
        history.record(snap("a"));
        history.record(snap("b"));
        history.record(snap("c"));
        history.undo();
        history.undo();
        history.record(snap("d"));

        assert_eq!(history.labels(), vec!["a", "d"]);
        assert!(!history.can_redo());
        assert_eq!(history.current_index(), Some(1));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new(3);
        for label in ["a", "b", "c", "d"] {
            history.record(snap(label));
        }
        assert_eq!(history.labels(), vec!["b", "c", "d"]);
        assert_eq!(history.current_index(), Some(2));
    }

    #[test]
    fn test_minimum_capacity_is_two() {
        assert_eq!(History::new(0).max_snapshots(), 2);
    }
}
