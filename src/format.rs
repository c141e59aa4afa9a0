//! Output formatting for markdown and JSON.
//!
//! Views mirror the entities but carry every timestamp as an RFC 3339 string
//! in the canonical zone, so output always states its offset.

use crate::time::TimeNormalizer;
use crate::types::{Attachment, Category, Memo, Stats, SubTask, Template};
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentView {
    pub id: i64,
    pub subtask_id: i64,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub created_at: Option<String>,
}

impl AttachmentView {
    pub fn new(attachment: &Attachment, time: &TimeNormalizer) -> Self {
        Self {
            id: attachment.id,
            subtask_id: attachment.subtask_id,
            filename: attachment.filename.clone(),
            file_path: attachment.file_path.clone(),
            file_size: attachment.file_size,
            content_type: attachment.content_type.clone(),
            created_at: time.present_for_output(Some(attachment.created_at)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubTaskView {
    pub id: i64,
    pub memo_id: i64,
    pub content: String,
    pub note: Option<String>,
    pub is_completed: bool,
    pub position: i64,
    pub created_at: Option<String>,
    pub start_time: Option<String>,
    pub completed_at: Option<String>,
    pub attachments: Vec<AttachmentView>,
}

impl SubTaskView {
    pub fn new(subtask: &SubTask, time: &TimeNormalizer) -> Self {
        Self {
            id: subtask.id,
            memo_id: subtask.memo_id,
            content: subtask.content.clone(),
            note: subtask.note.clone(),
            is_completed: subtask.is_completed,
            position: subtask.position,
            created_at: time.present_for_output(Some(subtask.created_at)),
            start_time: time.present_for_output(subtask.start_time),
            completed_at: time.present_for_output(subtask.completed_at),
            attachments: subtask
                .attachments
                .iter()
                .map(|a| AttachmentView::new(a, time))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub is_completed: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub completed_at: Option<String>,
    pub deadline: Option<String>,
    pub subtasks: Vec<SubTaskView>,
}

impl MemoView {
    pub fn new(memo: &Memo, time: &TimeNormalizer) -> Self {
        Self {
            id: memo.id,
            title: memo.title.clone(),
            content: memo.content.clone(),
            category: memo.category,
            is_completed: memo.is_completed(),
            created_at: time.present_for_output(Some(memo.created_at)),
            updated_at: time.present_for_output(memo.updated_at),
            completed_at: time.present_for_output(memo.completed_at),
            deadline: time.present_for_output(memo.deadline),
            subtasks: memo
                .subtasks
                .iter()
                .map(|s| SubTaskView::new(s, time))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub created_at: Option<String>,
    pub subtasks: Vec<String>,
}

impl TemplateView {
    pub fn new(template: &Template, time: &TimeNormalizer) -> Self {
        Self {
            id: template.id,
            title: template.title.clone(),
            content: template.content.clone(),
            category: template.category,
            created_at: time.present_for_output(Some(template.created_at)),
            subtasks: template.subtasks.iter().map(|s| s.content.clone()).collect(),
        }
    }
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

/// Format a single memo as markdown.
pub fn format_memo_markdown(memo: &Memo, time: &TimeNormalizer) -> String {
    let view = MemoView::new(memo, time);
    let mut md = String::new();

    md.push_str(&format!("## {} {}\n", checkbox(view.is_completed), view.title));
    md.push_str(&format!("- **id**: `{}`\n", view.id));
    md.push_str(&format!("- **category**: {}\n", view.category.as_str()));
    if let Some(ref created) = view.created_at {
        md.push_str(&format!("- **created**: {}\n", created));
    }
    if let Some(ref deadline) = view.deadline {
        md.push_str(&format!("- **deadline**: {}\n", deadline));
    }
    if let Some(ref completed) = view.completed_at {
        md.push_str(&format!("- **completed**: {}\n", completed));
    }

    if !view.content.is_empty() {
        md.push('\n');
        md.push_str(&view.content);
        md.push('\n');
    }

    if !view.subtasks.is_empty() {
        let done = view.subtasks.iter().filter(|s| s.is_completed).count();
        md.push_str(&format!(
            "\n### Subtasks ({}/{})\n",
            done,
            view.subtasks.len()
        ));
        for subtask in &view.subtasks {
            md.push_str(&format_subtask_short(subtask));
        }
    }

    md
}

/// Format a subtask in short form for lists.
fn format_subtask_short(subtask: &SubTaskView) -> String {
    let note = subtask
        .note
        .as_ref()
        .map(|n| format!(" - _{}_", n))
        .unwrap_or_default();
    let done_at = subtask
        .completed_at
        .as_ref()
        .map(|at| format!(" ({})", at))
        .unwrap_or_default();
    let files = if subtask.attachments.is_empty() {
        String::new()
    } else {
        format!(" [{} file(s)]", subtask.attachments.len())
    };

    format!(
        "- {} {} `#{}`{}{}{}\n",
        checkbox(subtask.is_completed),
        subtask.content,
        subtask.id,
        done_at,
        files,
        note,
    )
}

/// Format a list of memos as markdown, active ones first.
pub fn format_memos_markdown(memos: &[Memo], time: &TimeNormalizer) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Memos ({})\n\n", memos.len()));

    let (done, active): (Vec<&Memo>, Vec<&Memo>) = memos.iter().partition(|m| m.is_completed());
    for (heading, group) in [("Active", active), ("Completed", done)] {
        if group.is_empty() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", heading));
        for memo in group {
            let total = memo.subtasks.len();
            let finished = memo.subtasks.iter().filter(|s| s.is_completed).count();
            let progress = if total > 0 {
                format!(" ({}/{})", finished, total)
            } else {
                String::new()
            };
            let deadline = time
                .present_for_output(memo.deadline)
                .map(|d| format!(" due {}", d))
                .unwrap_or_default();
            md.push_str(&format!(
                "- {} `{}` [{}]{}{}\n",
                memo.title,
                memo.id,
                memo.category.as_str(),
                progress,
                deadline
            ));
        }
        md.push('\n');
    }

    md
}

/// Format a template as markdown.
pub fn format_template_markdown(template: &Template, time: &TimeNormalizer) -> String {
    let view = TemplateView::new(template, time);
    let mut md = String::new();

    md.push_str(&format!("## Template: {}\n", view.title));
    md.push_str(&format!("- **id**: `{}`\n", view.id));
    md.push_str(&format!("- **category**: {}\n", view.category.as_str()));
    if !view.content.is_empty() {
        md.push('\n');
        md.push_str(&view.content);
        md.push('\n');
    }
    for (index, content) in view.subtasks.iter().enumerate() {
        md.push_str(&format!("{}. {}\n", index + 1, content));
    }

    md
}

/// Format aggregate statistics as markdown.
pub fn format_stats_markdown(stats: &Stats) -> String {
    let mut md = String::from("# Stats\n\n");

    md.push_str(&format!(
        "- **memos**: {} ({} active, {} completed, {} overdue)\n",
        stats.total_memos, stats.active_memos, stats.completed_memos, stats.overdue_memos
    ));
    md.push_str(&format!(
        "- **categories**: work {}, life {}\n",
        stats.work_memos, stats.life_memos
    ));
    md.push_str(&format!(
        "- **subtasks**: {}/{} completed\n",
        stats.completed_subtasks, stats.total_subtasks
    ));
    if let Some(secs) = stats.avg_memo_completion_secs {
        md.push_str(&format!("- **avg memo completion**: {}\n", format_duration(secs)));
    }
    if let Some(secs) = stats.avg_subtask_duration_secs {
        md.push_str(&format!("- **avg subtask duration**: {}\n", format_duration(secs)));
    }

    md
}

/// Render seconds as `1d 2h 3m`, dropping leading zero units.
fn format_duration(secs: f64) -> String {
    let total = secs.round() as i64;
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, rem) = (rem / 3_600, rem % 3_600);
    let minutes = rem / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn memo() -> Memo {
        Memo {
            id: 7,
            title: "Release".into(),
            content: String::new(),
            category: Category::Work,
            created_at: at("2024-01-01 09:00:00"),
            updated_at: None,
            completed_at: None,
            deadline: Some(at("2024-01-10 18:00:00")),
            subtasks: vec![SubTask {
                id: 3,
                memo_id: 7,
                content: "Tag build".into(),
                note: Some("after CI".into()),
                is_completed: true,
                position: 0,
                created_at: at("2024-01-01 09:00:00"),
                start_time: None,
                completed_at: Some(at("2024-01-02 10:30:00")),
                attachments: vec![],
            }],
        }
    }

    #[test]
    fn output_format_parses_aliases() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::from_str("yaml"), None);
    }

    #[test]
    fn view_carries_zone_offset() {
        let view = MemoView::new(&memo(), &TimeNormalizer::default());
        assert_eq!(view.deadline.as_deref(), Some("2024-01-10T18:00:00+08:00"));
        assert_eq!(
            view.subtasks[0].completed_at.as_deref(),
            Some("2024-01-02T10:30:00+08:00")
        );
        assert_eq!(view.completed_at, None);
    }

    #[test]
    fn json_output_carries_offset_on_every_timestamp() {
        let json = serde_json::to_value(MemoView::new(&memo(), &TimeNormalizer::default())).unwrap();
        let subtask = &json["subtasks"][0];

        for value in [
            &json["created_at"],
            &json["deadline"],
            &subtask["created_at"],
            &subtask["completed_at"],
        ] {
            let stamp = value.as_str().unwrap();
            assert!(stamp.ends_with("+08:00"), "{stamp} lacks the zone offset");
        }
        assert!(json["completed_at"].is_null());
    }

    #[test]
    fn memo_markdown_lists_subtasks() {
        let md = format_memo_markdown(&memo(), &TimeNormalizer::default());
        assert!(md.starts_with("## [ ] Release\n"));
        assert!(md.contains("### Subtasks (1/1)"));
        assert!(md.contains("- [x] Tag build `#3` (2024-01-02T10:30:00+08:00) - _after CI_"));
    }

    #[test]
    fn memo_list_groups_by_status() {
        let mut done = memo();
        done.id = 8;
        done.title = "Shipped".into();
        done.completed_at = Some(at("2024-01-02 10:30:00"));

        let md = format_memos_markdown(&[done, memo()], &TimeNormalizer::default());
        let active = md.find("## Active").unwrap();
        let completed = md.find("## Completed").unwrap();
        assert!(active < completed);
        assert!(md.contains("- Release `7` [work] (1/1) due 2024-01-10T18:00:00+08:00"));
    }

    #[test]
    fn durations_drop_leading_units() {
        assert_eq!(format_duration(59.0), "0m");
        assert_eq!(format_duration(3_660.0), "1h 1m");
        assert_eq!(format_duration(90_000.0), "1d 1h 0m");
    }
}
