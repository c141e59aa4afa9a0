//! Aggregate repository for memos and their subtasks.
//!
//! A memo and its subtasks are loaded, saved and deleted as one aggregate.
//! Child removal (subtasks, then their attachments) is performed explicitly by
//! the delete operations; the schema declares no cascades.

use crate::error::{MemoError, MemoResult};
use crate::time::TimeNormalizer;
use crate::types::{Attachment, Category, Memo, SubTask};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashMap;

/// Fields of a memo row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewMemo {
    pub title: String,
    pub content: String,
    pub category: Category,
    /// `None` lets the repository stamp the current time.
    pub created_at: Option<NaiveDateTime>,
    pub deadline: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

/// Fields of a subtask row about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubtask {
    pub memo_id: i64,
    pub content: String,
    pub note: Option<String>,
    pub is_completed: bool,
    pub position: i64,
    /// `None` lets the repository stamp the current time.
    pub created_at: Option<NaiveDateTime>,
    pub start_time: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

/// Storage operations the memo core needs.
///
/// Every call made through one repository value sees the writes of earlier
/// calls on it, so a pipeline run inside one transaction reads its own state.
pub trait MemoRepository {
    /// Load a memo with its subtasks (ordered by position) and their attachments.
    fn load(&self, memo_id: i64) -> MemoResult<Option<Memo>>;

    /// Current subtasks of a memo, ordered by position.
    fn load_subtasks(&self, memo_id: i64) -> MemoResult<Vec<SubTask>>;

    fn insert_memo(&self, memo: &NewMemo) -> MemoResult<i64>;

    /// Persist the memo's own fields. Subtasks are written separately.
    fn save(&self, memo: &Memo) -> MemoResult<()>;

    /// Delete a memo together with its subtasks and their attachments.
    /// Returns the stored paths of removed attachments.
    fn delete(&self, memo_id: i64) -> MemoResult<Vec<String>>;

    fn find_subtask(&self, subtask_id: i64) -> MemoResult<Option<SubTask>>;

    fn insert_subtask(&self, subtask: &NewSubtask) -> MemoResult<i64>;

    fn save_subtask(&self, subtask: &SubTask) -> MemoResult<()>;

    fn set_position(&self, subtask_id: i64, position: i64) -> MemoResult<()>;

    /// Delete a subtask and its attachments. Returns the removed stored paths.
    fn delete_subtask(&self, subtask_id: i64) -> MemoResult<Vec<String>>;
}

pub(crate) fn parse_memo_row(row: &Row) -> rusqlite::Result<Memo> {
    let category: String = row.get("category")?;

    Ok(Memo {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        category: Category::parse(&category).unwrap_or_default(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
        deadline: row.get("deadline")?,
        subtasks: Vec::new(),
    })
}

pub(crate) fn parse_subtask_row(row: &Row) -> rusqlite::Result<SubTask> {
    Ok(SubTask {
        id: row.get("id")?,
        memo_id: row.get("memo_id")?,
        content: row.get("content")?,
        note: row.get("note")?,
        is_completed: row.get("is_completed")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        start_time: row.get("start_time")?,
        completed_at: row.get("completed_at")?,
        attachments: Vec::new(),
    })
}

pub(crate) fn parse_attachment_row(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        subtask_id: row.get("subtask_id")?,
        filename: row.get("filename")?,
        file_path: row.get("file_path")?,
        file_size: row.get("file_size")?,
        content_type: row.get("content_type")?,
        created_at: row.get("created_at")?,
    })
}

/// Repository over a SQLite connection or an open transaction.
pub struct SqliteRepository<'c> {
    conn: &'c Connection,
    time: TimeNormalizer,
}

impl<'c> SqliteRepository<'c> {
    pub fn new(conn: &'c Connection, time: TimeNormalizer) -> Self {
        Self { conn, time }
    }

    fn attachments_for_memo(&self, memo_id: i64) -> MemoResult<HashMap<i64, Vec<Attachment>>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.* FROM subtask_attachments a
             INNER JOIN subtasks s ON a.subtask_id = s.id
             WHERE s.memo_id = ?1
             ORDER BY a.id",
        )?;

        let mut grouped: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for attachment in stmt.query_map(params![memo_id], parse_attachment_row)? {
            let attachment = attachment?;
            grouped.entry(attachment.subtask_id).or_default().push(attachment);
        }

        Ok(grouped)
    }

    fn attachment_paths(&self, sql: &str, id: i64) -> MemoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let paths = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(paths)
    }
}

impl MemoRepository for SqliteRepository<'_> {
    fn load(&self, memo_id: i64) -> MemoResult<Option<Memo>> {
        let memo = self
            .conn
            .query_row(
                "SELECT * FROM memos WHERE id = ?1",
                params![memo_id],
                parse_memo_row,
            )
            .optional()?;

        let Some(mut memo) = memo else {
            return Ok(None);
        };

        let mut attachments = self.attachments_for_memo(memo_id)?;
        memo.subtasks = self
            .load_subtasks(memo_id)?
            .into_iter()
            .map(|mut subtask| {
                subtask.attachments = attachments.remove(&subtask.id).unwrap_or_default();
                subtask
            })
            .collect();

        Ok(Some(memo))
    }

    fn load_subtasks(&self, memo_id: i64) -> MemoResult<Vec<SubTask>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM subtasks WHERE memo_id = ?1 ORDER BY position, id")?;

        let subtasks = stmt
            .query_map(params![memo_id], parse_subtask_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(subtasks)
    }

    fn insert_memo(&self, memo: &NewMemo) -> MemoResult<i64> {
        let created_at = memo.created_at.unwrap_or_else(|| self.time.now());

        self.conn.execute(
            "INSERT INTO memos (title, content, category, created_at, completed_at, deadline)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                memo.title,
                memo.content,
                memo.category.as_str(),
                created_at,
                memo.completed_at,
                memo.deadline,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn save(&self, memo: &Memo) -> MemoResult<()> {
        let updated = self.conn.execute(
            "UPDATE memos SET
                title = ?1, content = ?2, category = ?3, updated_at = ?4,
                completed_at = ?5, deadline = ?6
             WHERE id = ?7",
            params![
                memo.title,
                memo.content,
                memo.category.as_str(),
                memo.updated_at,
                memo.completed_at,
                memo.deadline,
                memo.id,
            ],
        )?;

        if updated == 0 {
            return Err(MemoError::MemoNotFound(memo.id));
        }
        Ok(())
    }

    fn delete(&self, memo_id: i64) -> MemoResult<Vec<String>> {
        let paths = self.attachment_paths(
            "SELECT a.file_path FROM subtask_attachments a
             INNER JOIN subtasks s ON a.subtask_id = s.id
             WHERE s.memo_id = ?1",
            memo_id,
        )?;

        self.conn.execute(
            "DELETE FROM subtask_attachments
             WHERE subtask_id IN (SELECT id FROM subtasks WHERE memo_id = ?1)",
            params![memo_id],
        )?;
        self.conn
            .execute("DELETE FROM subtasks WHERE memo_id = ?1", params![memo_id])?;
        let deleted = self
            .conn
            .execute("DELETE FROM memos WHERE id = ?1", params![memo_id])?;

        if deleted == 0 {
            return Err(MemoError::MemoNotFound(memo_id));
        }
        Ok(paths)
    }

    fn find_subtask(&self, subtask_id: i64) -> MemoResult<Option<SubTask>> {
        let subtask = self
            .conn
            .query_row(
                "SELECT * FROM subtasks WHERE id = ?1",
                params![subtask_id],
                parse_subtask_row,
            )
            .optional()?;

        let Some(mut subtask) = subtask else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare("SELECT * FROM subtask_attachments WHERE subtask_id = ?1 ORDER BY id")?;
        subtask.attachments = stmt
            .query_map(params![subtask_id], parse_attachment_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(subtask))
    }

    fn insert_subtask(&self, subtask: &NewSubtask) -> MemoResult<i64> {
        let created_at = subtask.created_at.unwrap_or_else(|| self.time.now());

        self.conn.execute(
            "INSERT INTO subtasks (
                memo_id, content, note, is_completed, position,
                created_at, start_time, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                subtask.memo_id,
                subtask.content,
                subtask.note,
                subtask.is_completed,
                subtask.position,
                created_at,
                subtask.start_time,
                subtask.completed_at,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn save_subtask(&self, subtask: &SubTask) -> MemoResult<()> {
        let updated = self.conn.execute(
            "UPDATE subtasks SET
                content = ?1, note = ?2, is_completed = ?3, position = ?4,
                created_at = ?5, start_time = ?6, completed_at = ?7
             WHERE id = ?8",
            params![
                subtask.content,
                subtask.note,
                subtask.is_completed,
                subtask.position,
                subtask.created_at,
                subtask.start_time,
                subtask.completed_at,
                subtask.id,
            ],
        )?;

        if updated == 0 {
            return Err(MemoError::SubtaskNotFound(subtask.id));
        }
        Ok(())
    }

    fn set_position(&self, subtask_id: i64, position: i64) -> MemoResult<()> {
        self.conn.execute(
            "UPDATE subtasks SET position = ?1 WHERE id = ?2",
            params![position, subtask_id],
        )?;
        Ok(())
    }

    fn delete_subtask(&self, subtask_id: i64) -> MemoResult<Vec<String>> {
        let paths = self.attachment_paths(
            "SELECT file_path FROM subtask_attachments WHERE subtask_id = ?1",
            subtask_id,
        )?;

        self.conn.execute(
            "DELETE FROM subtask_attachments WHERE subtask_id = ?1",
            params![subtask_id],
        )?;
        let deleted = self
            .conn
            .execute("DELETE FROM subtasks WHERE id = ?1", params![subtask_id])?;

        if deleted == 0 {
            return Err(MemoError::SubtaskNotFound(subtask_id));
        }
        Ok(paths)
    }
}
