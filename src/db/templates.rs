//! Memo templates: status-free blueprints used to seed new memos.

use super::{Database, require_title};
use crate::error::{MemoError, MemoResult};
use crate::order::assign_positions;
use crate::types::{
    Category, Memo, MemoInput, SubtaskInput, Template, TemplateInput, TemplateOverrides,
    TemplateSubTask, TemplateSubtaskInput,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

fn parse_template_row(row: &Row) -> rusqlite::Result<Template> {
    let category: String = row.get("category")?;

    Ok(Template {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        category: Category::parse(&category).unwrap_or_default(),
        created_at: row.get("created_at")?,
        subtasks: Vec::new(),
    })
}

fn parse_template_subtask_row(row: &Row) -> rusqlite::Result<TemplateSubTask> {
    Ok(TemplateSubTask {
        id: row.get("id")?,
        template_id: row.get("template_id")?,
        content: row.get("content")?,
        position: row.get("position")?,
    })
}

/// Internal helper to load a template using an existing connection.
fn get_template_internal(conn: &Connection, template_id: i64) -> MemoResult<Option<Template>> {
    let template = conn
        .query_row(
            "SELECT * FROM templates WHERE id = ?1",
            params![template_id],
            parse_template_row,
        )
        .optional()?;

    let Some(mut template) = template else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT * FROM template_subtasks WHERE template_id = ?1 ORDER BY position, id",
    )?;
    template.subtasks = stmt
        .query_map(params![template_id], parse_template_subtask_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(template))
}

/// Replace a template's subtasks with `subtasks`, positioned by list order.
fn write_template_subtasks(
    conn: &Connection,
    template_id: i64,
    mut subtasks: Vec<TemplateSubtaskInput>,
) -> MemoResult<()> {
    assign_positions(&mut subtasks);

    conn.execute(
        "DELETE FROM template_subtasks WHERE template_id = ?1",
        params![template_id],
    )?;
    for (index, subtask) in subtasks.iter().enumerate() {
        conn.execute(
            "INSERT INTO template_subtasks (template_id, content, position) VALUES (?1, ?2, ?3)",
            params![
                template_id,
                subtask.content,
                subtask.position.unwrap_or(index as i64)
            ],
        )?;
    }
    Ok(())
}

impl Database {
    /// Create a template.
    pub fn create_template(&self, input: TemplateInput) -> MemoResult<Template> {
        require_title(&input.title)?;
        let now = self.time.now();

        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO templates (title, content, category, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![input.title, input.content, input.category.as_str(), now],
            )?;
            let template_id = tx.last_insert_rowid();
            write_template_subtasks(tx, template_id, input.subtasks)?;

            info!(template_id, "Template created");
            get_template_internal(tx, template_id)?
                .ok_or(MemoError::TemplateNotFound(template_id))
        })
    }

    /// Get a template by ID.
    pub fn get_template(&self, template_id: i64) -> MemoResult<Option<Template>> {
        self.with_conn(|conn| get_template_internal(conn, template_id))
    }

    /// List all templates, oldest first.
    pub fn list_templates(&self) -> MemoResult<Vec<Template>> {
        self.with_conn(|conn| {
            let ids = {
                let mut stmt = conn.prepare("SELECT id FROM templates ORDER BY created_at, id")?;
                stmt.query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };

            let mut templates = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(template) = get_template_internal(conn, id)? {
                    templates.push(template);
                }
            }
            Ok(templates)
        })
    }

    /// Replace a template's fields and subtask list wholesale.
    pub fn update_template(&self, template_id: i64, input: TemplateInput) -> MemoResult<Template> {
        require_title(&input.title)?;

        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE templates SET title = ?1, content = ?2, category = ?3 WHERE id = ?4",
                params![
                    input.title,
                    input.content,
                    input.category.as_str(),
                    template_id
                ],
            )?;
            if updated == 0 {
                return Err(MemoError::TemplateNotFound(template_id));
            }
            write_template_subtasks(tx, template_id, input.subtasks)?;

            info!(template_id, "Template updated");
            get_template_internal(tx, template_id)?
                .ok_or(MemoError::TemplateNotFound(template_id))
        })
    }

    /// Delete a template and its subtasks.
    pub fn delete_template(&self, template_id: i64) -> MemoResult<()> {
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM template_subtasks WHERE template_id = ?1",
                params![template_id],
            )?;
            let deleted = tx.execute("DELETE FROM templates WHERE id = ?1", params![template_id])?;
            if deleted == 0 {
                return Err(MemoError::TemplateNotFound(template_id));
            }

            info!(template_id, "Template deleted");
            Ok(())
        })
    }

    /// Create a new memo seeded from a template.
    pub fn instantiate_template(
        &self,
        template_id: i64,
        overrides: TemplateOverrides,
    ) -> MemoResult<Memo> {
        let template = self
            .get_template(template_id)?
            .ok_or(MemoError::TemplateNotFound(template_id))?;

        let input = MemoInput {
            title: overrides.title.unwrap_or(template.title),
            content: template.content,
            category: template.category,
            deadline: overrides.deadline,
            completed: false,
            subtasks: template
                .subtasks
                .into_iter()
                .map(|s| SubtaskInput::new(s.content))
                .collect(),
        };

        let memo = self.create_memo(input)?;
        info!(template_id, memo_id = memo.id, "Memo created from template");
        Ok(memo)
    }

    /// Capture a memo's title, content, category and subtask contents as a template.
    pub fn save_memo_as_template(&self, memo_id: i64) -> MemoResult<Template> {
        let memo = self
            .get_memo(memo_id)?
            .ok_or(MemoError::MemoNotFound(memo_id))?;

        self.create_template(TemplateInput {
            title: memo.title,
            content: memo.content,
            category: memo.category,
            subtasks: memo
                .subtasks
                .into_iter()
                .map(|s| TemplateSubtaskInput {
                    content: s.content,
                    position: None,
                })
                .collect(),
        })
    }
}
