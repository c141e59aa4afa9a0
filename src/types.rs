//! Core types for the memo tracker.
//!
//! Timestamps on entities are zone-naive wall-clock values in the canonical
//! zone (see [`crate::time`]). Input shapes carry timestamps as raw strings so
//! that malformed values can be reported before anything is written.
//! Entities are not serializable themselves; output goes through the zoned
//! views in [`crate::format`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Memo category tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Work,
    Life,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Life => "life",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "work" => Some(Category::Work),
            "life" => Some(Category::Life),
            _ => None,
        }
    }
}

/// A memo: the aggregate root owning its subtasks.
#[derive(Debug, Clone)]
pub struct Memo {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    /// `None` while the memo is active.
    pub completed_at: Option<NaiveDateTime>,
    pub deadline: Option<NaiveDateTime>,
    /// Ordered by `position`.
    pub subtasks: Vec<SubTask>,
}

impl Memo {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// An ordered child item of a memo.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTask {
    pub id: i64,
    pub memo_id: i64,
    pub content: String,
    pub note: Option<String>,
    pub is_completed: bool,
    /// Zero-based, dense within the memo.
    pub position: i64,
    pub created_at: NaiveDateTime,
    pub start_time: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub attachments: Vec<Attachment>,
}

/// File metadata attached to a subtask. The bytes live outside the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: i64,
    pub subtask_id: i64,
    pub filename: String,
    /// Stored path or key of the file content.
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub created_at: NaiveDateTime,
}

/// Input for recording an attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttachment {
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
}

/// A status-free memo blueprint.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub created_at: NaiveDateTime,
    pub subtasks: Vec<TemplateSubTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSubTask {
    pub id: i64,
    pub template_id: i64,
    pub content: String,
    pub position: i64,
}

/// Deserialize a field that distinguishes "absent" from explicit `null`.
///
/// Used with `#[serde(default)]`: absent → `None`, `null` → `Some(None)`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// One entry of a desired subtask list.
///
/// Every field is optional; on an existing subtask only the fields present are
/// applied. `position` is accepted but list order decides the final position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub note: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, alias = "order", skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<Option<String>>,
    /// Explicit completion time; `null` is treated the same as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl SubtaskInput {
    /// A fresh entry with only content set.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Entry that refers to an existing subtask by id.
    pub fn existing(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn completed(mut self, done: bool) -> Self {
        self.is_completed = Some(done);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_completed_at(mut self, at: impl Into<String>) -> Self {
        self.completed_at = Some(at.into());
        self
    }

    pub fn with_created_at(mut self, at: impl Into<String>) -> Self {
        self.created_at = Some(at.into());
        self
    }
}

/// Input for creating a memo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub deadline: Option<String>,
    /// Explicit completion request; only honoured for memos without subtasks.
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<SubtaskInput>,
}

/// Partial update of a memo. Absent fields keep their stored value.
///
/// When `subtasks` is present it is the complete desired list: entries are
/// matched to stored subtasks by id and unmatched stored subtasks are removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub deadline: Option<Option<String>>,
    #[serde(default)]
    pub subtasks: Option<Vec<SubtaskInput>>,
}

/// Result of a memo update.
#[derive(Debug, Clone)]
pub struct MemoUpdate {
    pub memo: Memo,
    /// Stored paths of attachments removed along with deleted subtasks.
    pub orphaned_files: Vec<String>,
}

/// Memo completion filter for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Debug, Clone, Default)]
pub struct MemoFilter {
    pub category: Option<Category>,
    pub status: StatusFilter,
}

/// Input for creating or replacing a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub subtasks: Vec<TemplateSubtaskInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSubtaskInput {
    pub content: String,
    #[serde(default, alias = "order")]
    pub position: Option<i64>,
}

/// Overrides applied when creating a memo from a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateOverrides {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
}

/// Aggregate statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_memos: i64,
    pub active_memos: i64,
    pub completed_memos: i64,
    /// Active memos whose deadline has passed.
    pub overdue_memos: i64,
    pub work_memos: i64,
    pub life_memos: i64,
    pub total_subtasks: i64,
    pub completed_subtasks: i64,
    /// Mean seconds from memo creation to completion.
    pub avg_memo_completion_secs: Option<f64>,
    /// Mean seconds from subtask start (or creation) to completion.
    pub avg_subtask_duration_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_and_default() {
        assert_eq!(Category::default(), Category::Work);
        assert_eq!(Category::parse("LIFE"), Some(Category::Life));
        assert_eq!(Category::parse("hobby"), None);
        assert_eq!(Category::Life.as_str(), "life");
    }

    #[test]
    fn subtask_input_distinguishes_null_note() {
        let absent: SubtaskInput = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert_eq!(absent.note, None);

        let cleared: SubtaskInput = serde_json::from_str(r#"{"id": 3, "note": null}"#).unwrap();
        assert_eq!(cleared.note, Some(None));

        let set: SubtaskInput = serde_json::from_str(r#"{"note": "bring cables"}"#).unwrap();
        assert_eq!(set.note, Some(Some("bring cables".to_string())));
    }

    #[test]
    fn subtask_input_accepts_order_alias() {
        let input: SubtaskInput =
            serde_json::from_str(r#"{"content": "a", "order": 4, "completed_at": null}"#).unwrap();
        assert_eq!(input.position, Some(4));
        assert_eq!(input.completed_at, None);
    }

    #[test]
    fn memo_patch_deadline_tristate() {
        let untouched: MemoPatch = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(untouched.deadline, None);
        assert!(untouched.subtasks.is_none());

        let cleared: MemoPatch = serde_json::from_str(r#"{"deadline": null}"#).unwrap();
        assert_eq!(cleared.deadline, Some(None));
    }

    #[test]
    fn memo_input_defaults() {
        let input: MemoInput = serde_json::from_str(r#"{"title": "Groceries"}"#).unwrap();
        assert_eq!(input.category, Category::Work);
        assert!(input.subtasks.is_empty());
        assert!(!input.completed);
    }
}
