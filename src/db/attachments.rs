//! Attachment metadata on subtasks.
//!
//! Only metadata lives here. File content is stored at `file_path` by the
//! caller, which is also responsible for removing it after a delete.

use super::Database;
use super::repository::parse_attachment_row;
use crate::error::{MemoError, MemoResult};
use crate::types::{Attachment, NewAttachment};
use rusqlite::{OptionalExtension, params};
use tracing::info;

impl Database {
    /// Record an attachment on a subtask.
    pub fn add_attachment(
        &self,
        subtask_id: i64,
        attachment: NewAttachment,
    ) -> MemoResult<Attachment> {
        if attachment.filename.trim().is_empty() {
            return Err(MemoError::invalid_value(
                "filename",
                "filename must not be empty",
            ));
        }
        let now = self.time.now();

        self.with_tx(|tx| {
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM subtasks WHERE id = ?1",
                    params![subtask_id],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if !exists {
                return Err(MemoError::SubtaskNotFound(subtask_id));
            }

            tx.execute(
                "INSERT INTO subtask_attachments
                 (subtask_id, filename, file_path, file_size, content_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    subtask_id,
                    attachment.filename,
                    attachment.file_path,
                    attachment.file_size,
                    attachment.content_type,
                    now,
                ],
            )?;
            let attachment_id = tx.last_insert_rowid();

            info!(subtask_id, attachment_id, "Attachment added");
            Ok(Attachment {
                id: attachment_id,
                subtask_id,
                filename: attachment.filename,
                file_path: attachment.file_path,
                file_size: attachment.file_size,
                content_type: attachment.content_type,
                created_at: now,
            })
        })
    }

    /// Attachments on a subtask, oldest first.
    pub fn list_attachments(&self, subtask_id: i64) -> MemoResult<Vec<Attachment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM subtask_attachments WHERE subtask_id = ?1 ORDER BY created_at, id",
            )?;
            let attachments = stmt
                .query_map(params![subtask_id], parse_attachment_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(attachments)
        })
    }

    pub fn get_attachment(&self, attachment_id: i64) -> MemoResult<Option<Attachment>> {
        self.with_conn(|conn| {
            let attachment = conn
                .query_row(
                    "SELECT * FROM subtask_attachments WHERE id = ?1",
                    params![attachment_id],
                    parse_attachment_row,
                )
                .optional()?;
            Ok(attachment)
        })
    }

    /// Delete an attachment's metadata, returning what was removed so the
    /// caller can clean up the stored file.
    pub fn delete_attachment(&self, attachment_id: i64) -> MemoResult<Attachment> {
        self.with_tx(|tx| {
            let attachment = tx
                .query_row(
                    "SELECT * FROM subtask_attachments WHERE id = ?1",
                    params![attachment_id],
                    parse_attachment_row,
                )
                .optional()?
                .ok_or(MemoError::AttachmentNotFound(attachment_id))?;

            tx.execute(
                "DELETE FROM subtask_attachments WHERE id = ?1",
                params![attachment_id],
            )?;

            info!(
                subtask_id = attachment.subtask_id,
                attachment_id, "Attachment deleted"
            );
            Ok(attachment)
        })
    }
}
