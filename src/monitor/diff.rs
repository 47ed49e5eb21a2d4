use std::collections::{HashMap, HashSet};

use crate::models::TimeSlot;

/// Per-restaurant change detection over `(date, time)` slot identity.
///
/// Holds the previous snapshot per restaurant slug and replaces it wholesale
/// on every call - no merging. A slot that disappears and later reappears is
/// reported as new again, and the very first observation of a slug reports
/// everything currently open.
#[derive(Debug, Default)]
pub struct DiffEngine {
    previous: HashMap<String, HashSet<TimeSlot>>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the slots in `current` that were not in the previous snapshot
    /// for `slug`, then overwrite the snapshot with `current`.
    pub fn detect_new(&mut self, slug: &str, current: HashSet<TimeSlot>) -> HashSet<TimeSlot> {
        let new_slots = match self.previous.get(slug) {
            Some(previous) => current.difference(previous).cloned().collect(),
            None => current.clone(),
        };
        self.previous.insert(slug.to_string(), current);
        new_slots
    }
}
