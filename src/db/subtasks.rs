//! Single-subtask operations: add, edit, toggle, delete, reorder.
//!
//! Each one re-derives the parent memo's completion before committing.

use super::Database;
use super::repository::MemoRepository;
use crate::error::{MemoError, MemoResult};
use crate::order::{compact_positions, reorder_positions};
use crate::reconcile::{apply_entry, completion_stamp, new_subtask};
use crate::status::sync;
use crate::types::{Memo, SubTask, SubtaskInput};
use tracing::{debug, info};

impl Database {
    /// Get a subtask with its attachments.
    pub fn get_subtask(&self, subtask_id: i64) -> MemoResult<Option<SubTask>> {
        self.with_conn(|conn| self.repo(conn).find_subtask(subtask_id))
    }

    /// Append a subtask to the end of a memo's list.
    pub fn add_subtask(&self, memo_id: i64, input: SubtaskInput) -> MemoResult<SubTask> {
        let now = self.time.now();

        self.with_tx(|tx| {
            let repo = self.repo(tx);
            let memo = repo.load(memo_id)?.ok_or(MemoError::MemoNotFound(memo_id))?;

            let position = memo.subtasks.len() as i64;
            let row = new_subtask(memo_id, &input, position, &self.time, now)?;
            let subtask_id = repo.insert_subtask(&row)?;
            sync(&repo, memo_id, now)?;

            info!(memo_id, subtask_id, position, "Subtask added");
            repo.find_subtask(subtask_id)?
                .ok_or(MemoError::SubtaskNotFound(subtask_id))
        })
    }

    /// Edit one subtask's fields. Absent fields keep their stored value and
    /// the position is unchanged; any `id` or `position` on the input is ignored.
    pub fn edit_subtask(&self, subtask_id: i64, input: SubtaskInput) -> MemoResult<SubTask> {
        let now = self.time.now();

        self.with_tx(|tx| {
            let repo = self.repo(tx);
            let current = repo
                .find_subtask(subtask_id)?
                .ok_or(MemoError::SubtaskNotFound(subtask_id))?;
            let memo_id = current.memo_id;

            let updated = apply_entry(current, &input, &self.time, now)?;
            repo.save_subtask(&updated)?;
            sync(&repo, memo_id, now)?;

            info!(memo_id, subtask_id, "Subtask edited");
            Ok(updated)
        })
    }

    /// Set a subtask's completion flag.
    ///
    /// `completed_at` optionally backfills the completion time; otherwise a
    /// flip to complete stamps the current time and a flip back clears it.
    pub fn toggle_subtask(
        &self,
        subtask_id: i64,
        completed: bool,
        completed_at: Option<&str>,
    ) -> MemoResult<SubTask> {
        let now = self.time.now();
        let explicit = self.time.normalize_for_storage("completed_at", completed_at)?;

        self.with_tx(|tx| {
            let repo = self.repo(tx);
            let mut subtask = repo
                .find_subtask(subtask_id)?
                .ok_or(MemoError::SubtaskNotFound(subtask_id))?;

            let (is_completed, stamp) = completion_stamp(
                subtask.is_completed,
                subtask.completed_at,
                Some(completed),
                explicit,
                now,
            );
            subtask.is_completed = is_completed;
            subtask.completed_at = stamp;
            repo.save_subtask(&subtask)?;
            sync(&repo, subtask.memo_id, now)?;

            info!(
                memo_id = subtask.memo_id,
                subtask_id, completed, "Subtask toggled"
            );
            Ok(subtask)
        })
    }

    /// Delete a subtask and its attachments, then close the position gap.
    /// Returns the stored paths of removed attachments.
    pub fn delete_subtask(&self, subtask_id: i64) -> MemoResult<Vec<String>> {
        let now = self.time.now();

        self.with_tx(|tx| {
            let repo = self.repo(tx);
            let subtask = repo
                .find_subtask(subtask_id)?
                .ok_or(MemoError::SubtaskNotFound(subtask_id))?;

            let paths = repo.delete_subtask(subtask_id)?;
            let remaining = repo.load_subtasks(subtask.memo_id)?;
            for (id, position) in compact_positions(&remaining) {
                repo.set_position(id, position)?;
            }
            sync(&repo, subtask.memo_id, now)?;

            info!(memo_id = subtask.memo_id, subtask_id, "Subtask deleted");
            Ok(paths)
        })
    }

    /// Reorder a memo's subtasks by an explicit id list.
    ///
    /// Ids not belonging to the memo are ignored and unmentioned subtasks keep
    /// their position, so callers should pass the complete id set.
    pub fn reorder_subtasks(&self, memo_id: i64, ordered_ids: &[i64]) -> MemoResult<Memo> {
        self.with_tx(|tx| {
            let repo = self.repo(tx);
            let memo = repo.load(memo_id)?.ok_or(MemoError::MemoNotFound(memo_id))?;

            let assignments = reorder_positions(&memo.subtasks, ordered_ids);
            for &(subtask_id, position) in &assignments {
                let unchanged = memo
                    .subtasks
                    .iter()
                    .any(|s| s.id == subtask_id && s.position == position);
                if !unchanged {
                    repo.set_position(subtask_id, position)?;
                }
            }

            debug!(memo_id, moved = assignments.len(), "Subtasks reordered");
            repo.load(memo_id)?.ok_or(MemoError::MemoNotFound(memo_id))
        })
    }
}
