//! Subtask position assignment.
//!
//! Positions are zero-based and dense within a memo. List order is
//! authoritative: any position supplied by a caller is overwritten.

use crate::types::{SubTask, SubtaskInput, TemplateSubtaskInput};
use std::collections::HashSet;

/// Anything that carries a list position.
pub trait Positioned {
    fn set_position(&mut self, position: i64);
}

impl Positioned for SubtaskInput {
    fn set_position(&mut self, position: i64) {
        self.position = Some(position);
    }
}

impl Positioned for TemplateSubtaskInput {
    fn set_position(&mut self, position: i64) {
        self.position = Some(position);
    }
}

/// Overwrite each item's position with its index in the slice.
pub fn assign_positions<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index as i64);
    }
}

/// Compute `(subtask_id, position)` assignments for an explicit id ordering.
///
/// Ids that do not belong to `subtasks` and repeated ids are skipped, so the
/// accepted ids receive 0, 1, 2, ... in list order. Subtasks not mentioned get
/// no assignment and keep whatever position they had.
pub fn reorder_positions(subtasks: &[SubTask], ordered_ids: &[i64]) -> Vec<(i64, i64)> {
    let owned: HashSet<i64> = subtasks.iter().map(|s| s.id).collect();
    let mut seen = HashSet::new();
    let mut next = 0i64;
    let mut assignments = Vec::new();

    for &id in ordered_ids {
        if owned.contains(&id) && seen.insert(id) {
            assignments.push((id, next));
            next += 1;
        }
    }

    assignments
}

/// Close gaps left by removals: keep relative order, renumber from zero.
pub fn compact_positions(subtasks: &[SubTask]) -> Vec<(i64, i64)> {
    let mut ordered: Vec<&SubTask> = subtasks.iter().collect();
    ordered.sort_by_key(|s| (s.position, s.id));
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, s)| (s.id, index as i64))
        .collect()
}
