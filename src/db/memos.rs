//! Memo CRUD and the update pipeline.
//!
//! Every mutation runs as one transaction: order → reconcile → apply → sync →
//! commit. A failure anywhere rolls the whole call back.

use super::{Database, require_title};
use super::repository::{MemoRepository, NewMemo};
use crate::error::{MemoError, MemoResult};
use crate::reconcile::reconcile;
use crate::status::{mark_memo, sync};
use crate::types::{Memo, MemoFilter, MemoInput, MemoPatch, MemoUpdate, StatusFilter};
use rusqlite::types::Value;
use tracing::info;

impl Database {
    /// Create a memo, optionally with its initial subtasks.
    ///
    /// Ids on the initial subtasks are ignored. `completed` is honoured only
    /// when no subtasks are given; otherwise completion derives from them.
    pub fn create_memo(&self, input: MemoInput) -> MemoResult<Memo> {
        require_title(&input.title)?;
        let now = self.time.now();
        let deadline = self
            .time
            .normalize_for_storage("deadline", input.deadline.as_deref())?;

        self.with_tx(|tx| {
            let repo = self.repo(tx);

            let explicit_done = input.completed && input.subtasks.is_empty();
            let memo_id = repo.insert_memo(&NewMemo {
                title: input.title,
                content: input.content,
                category: input.category,
                created_at: None,
                deadline,
                completed_at: explicit_done.then_some(now),
            })?;

            let plan = reconcile(memo_id, &[], input.subtasks, &self.time, now)?;
            plan.apply(&repo)?;
            let memo = sync(&repo, memo_id, now)?;

            info!(memo_id, subtasks = memo.subtasks.len(), "Memo created");
            Ok(memo)
        })
    }

    /// Get a memo with its subtasks and their attachments.
    pub fn get_memo(&self, memo_id: i64) -> MemoResult<Option<Memo>> {
        self.with_conn(|conn| self.repo(conn).load(memo_id))
    }

    /// List memos, newest first.
    pub fn list_memos(&self, filter: &MemoFilter) -> MemoResult<Vec<Memo>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT id FROM memos WHERE 1=1");
            let mut values: Vec<Value> = Vec::new();

            if let Some(category) = filter.category {
                values.push(Value::Text(category.as_str().to_string()));
                sql.push_str(&format!(" AND category = ?{}", values.len()));
            }
            match filter.status {
                StatusFilter::All => {}
                StatusFilter::Active => sql.push_str(" AND completed_at IS NULL"),
                StatusFilter::Completed => sql.push_str(" AND completed_at IS NOT NULL"),
            }
            sql.push_str(" ORDER BY created_at DESC, id DESC");

            let ids = {
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(rusqlite::params_from_iter(values), |row| row.get::<_, i64>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };

            let repo = self.repo(conn);
            let mut memos = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(memo) = repo.load(id)? {
                    memos.push(memo);
                }
            }
            Ok(memos)
        })
    }

    /// Apply a partial update.
    ///
    /// When the patch carries a subtask list, it replaces the stored list by
    /// identity (see [`crate::reconcile`]) and completion is re-derived.
    pub fn update_memo(&self, memo_id: i64, patch: MemoPatch) -> MemoResult<MemoUpdate> {
        let now = self.time.now();
        let deadline = patch
            .deadline
            .as_ref()
            .map(|raw| self.time.normalize_for_storage("deadline", raw.as_deref()))
            .transpose()?;
        if let Some(title) = &patch.title {
            require_title(title)?;
        }

        self.with_tx(|tx| {
            let repo = self.repo(tx);
            let mut memo = repo
                .load(memo_id)?
                .ok_or(MemoError::MemoNotFound(memo_id))?;

            let plan = patch
                .subtasks
                .map(|desired| reconcile(memo_id, &memo.subtasks, desired, &self.time, now))
                .transpose()?;

            if let Some(title) = patch.title {
                memo.title = title;
            }
            if let Some(content) = patch.content {
                memo.content = content;
            }
            if let Some(category) = patch.category {
                memo.category = category;
            }
            if let Some(deadline) = deadline {
                memo.deadline = deadline;
            }
            memo.updated_at = Some(now);
            repo.save(&memo)?;

            let orphaned_files = match plan {
                Some(plan) => plan.apply(&repo)?.orphaned_files,
                None => Vec::new(),
            };
            let memo = sync(&repo, memo_id, now)?;

            info!(memo_id, orphaned = orphaned_files.len(), "Memo updated");
            Ok(MemoUpdate {
                memo,
                orphaned_files,
            })
        })
    }

    /// Delete a memo with its subtasks and attachments.
    /// Returns the stored paths of removed attachments for cleanup.
    pub fn delete_memo(&self, memo_id: i64) -> MemoResult<Vec<String>> {
        self.with_tx(|tx| {
            let paths = self.repo(tx).delete(memo_id)?;
            info!(memo_id, attachments = paths.len(), "Memo deleted");
            Ok(paths)
        })
    }

    /// Mark a memo complete or active directly.
    ///
    /// Completing fails with [`MemoError::InvalidTransition`] while any
    /// subtask is incomplete; the memo is left unchanged in that case.
    pub fn set_memo_status(&self, memo_id: i64, completed: bool) -> MemoResult<Memo> {
        let now = self.time.now();
        self.with_tx(|tx| mark_memo(&self.repo(tx), memo_id, completed, now))
    }
}
