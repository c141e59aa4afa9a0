//! Subtask list reconciliation.
//!
//! Callers submit the complete desired subtask list for a memo. Entries whose
//! id matches a stored subtask update that subtask in place, keeping its
//! history fields unless the entry overrides them; other entries become new
//! subtasks; stored subtasks left unclaimed are deleted.

use crate::db::repository::{MemoRepository, NewSubtask};
use crate::error::MemoResult;
use crate::order::assign_positions;
use crate::time::TimeNormalizer;
use crate::types::{SubTask, SubtaskInput};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tracing::debug;

/// Writes needed to turn the stored subtask list into the desired one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub memo_id: i64,
    pub to_create: Vec<NewSubtask>,
    pub to_update: Vec<SubTask>,
    pub to_delete: Vec<i64>,
}

/// Outcome of applying a plan.
#[derive(Debug, Clone, Default)]
pub struct AppliedPlan {
    /// Ids assigned to created subtasks, in desired-list order.
    pub created: Vec<i64>,
    /// Stored paths of attachments removed with deleted subtasks.
    pub orphaned_files: Vec<String>,
}

/// Decide a subtask's completion flag and timestamp after a write.
///
/// An explicit timestamp wins whenever the resulting flag is set. Otherwise a
/// flip to complete stamps `now`, a flip to incomplete clears the stamp, and an
/// unchanged complete flag keeps the stored stamp.
pub fn completion_stamp(
    was_completed: bool,
    stored: Option<NaiveDateTime>,
    requested: Option<bool>,
    explicit: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> (bool, Option<NaiveDateTime>) {
    let completed = requested.unwrap_or(was_completed);

    if !completed {
        return (false, None);
    }
    if let Some(at) = explicit {
        return (true, Some(at));
    }
    if !was_completed {
        return (true, Some(now));
    }
    (true, stored)
}

/// Timestamps of one entry, parsed before anything is written.
struct EntryTimes {
    created_at: Option<NaiveDateTime>,
    start_time: Option<Option<NaiveDateTime>>,
    completed_at: Option<NaiveDateTime>,
}

impl EntryTimes {
    fn parse(entry: &SubtaskInput, time: &TimeNormalizer, prefix: &str) -> MemoResult<Self> {
        let field = |name: &str| format!("{prefix}{name}");

        let created_at =
            time.normalize_for_storage(&field("created_at"), entry.created_at.as_deref())?;
        let completed_at =
            time.normalize_for_storage(&field("completed_at"), entry.completed_at.as_deref())?;
        let start_time = entry
            .start_time
            .as_ref()
            .map(|raw| time.normalize_for_storage(&field("start_time"), raw.as_deref()))
            .transpose()?;

        Ok(Self {
            created_at,
            start_time,
            completed_at,
        })
    }
}

fn merge_entry(
    current: SubTask,
    entry: &SubtaskInput,
    times: EntryTimes,
    now: NaiveDateTime,
) -> SubTask {
    let (is_completed, completed_at) = completion_stamp(
        current.is_completed,
        current.completed_at,
        entry.is_completed,
        times.completed_at,
        now,
    );

    SubTask {
        content: entry.content.clone().unwrap_or(current.content),
        note: entry.note.clone().unwrap_or(current.note),
        created_at: times.created_at.unwrap_or(current.created_at),
        start_time: times.start_time.unwrap_or(current.start_time),
        is_completed,
        completed_at,
        ..current
    }
}

/// Apply the fields present in `entry` to a stored subtask.
///
/// Position is left untouched; list placement is the caller's concern.
pub fn apply_entry(
    current: SubTask,
    entry: &SubtaskInput,
    time: &TimeNormalizer,
    now: NaiveDateTime,
) -> MemoResult<SubTask> {
    let times = EntryTimes::parse(entry, time, "")?;
    Ok(merge_entry(current, entry, times, now))
}

/// Build the insert for a new subtask at `position`. Any id on the entry is ignored.
pub fn new_subtask(
    memo_id: i64,
    entry: &SubtaskInput,
    position: i64,
    time: &TimeNormalizer,
    now: NaiveDateTime,
) -> MemoResult<NewSubtask> {
    let times = EntryTimes::parse(entry, time, "")?;
    Ok(build_new(memo_id, entry, times, position, now))
}

fn build_new(
    memo_id: i64,
    entry: &SubtaskInput,
    times: EntryTimes,
    position: i64,
    now: NaiveDateTime,
) -> NewSubtask {
    let (is_completed, completed_at) =
        completion_stamp(false, None, entry.is_completed, times.completed_at, now);

    NewSubtask {
        memo_id,
        content: entry.content.clone().unwrap_or_default(),
        note: entry.note.clone().flatten(),
        is_completed,
        position,
        created_at: times.created_at,
        start_time: times.start_time.flatten(),
        completed_at,
    }
}

/// Diff the desired list against the stored subtasks of `memo_id`.
///
/// Every timestamp in `desired` is parsed up front, so a malformed value
/// fails here before any write happens.
pub fn reconcile(
    memo_id: i64,
    persisted: &[SubTask],
    mut desired: Vec<SubtaskInput>,
    time: &TimeNormalizer,
    now: NaiveDateTime,
) -> MemoResult<ReconcilePlan> {
    assign_positions(&mut desired);

    let mut unclaimed: HashMap<i64, &SubTask> = persisted.iter().map(|s| (s.id, s)).collect();
    let mut plan = ReconcilePlan {
        memo_id,
        ..Default::default()
    };

    for (index, entry) in desired.iter().enumerate() {
        let position = entry.position.unwrap_or(index as i64);
        let times = EntryTimes::parse(entry, time, &format!("subtasks[{index}]."))?;

        match entry.id.and_then(|id| unclaimed.remove(&id)) {
            Some(current) => {
                let mut updated = merge_entry(current.clone(), entry, times, now);
                updated.position = position;
                plan.to_update.push(updated);
            }
            None => plan
                .to_create
                .push(build_new(memo_id, entry, times, position, now)),
        }
    }

    plan.to_delete = persisted
        .iter()
        .filter(|s| unclaimed.contains_key(&s.id))
        .map(|s| s.id)
        .collect();

    debug!(
        memo_id,
        create = plan.to_create.len(),
        update = plan.to_update.len(),
        delete = plan.to_delete.len(),
        "Reconciled subtask list"
    );

    Ok(plan)
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Write the plan through `repo`: deletes, then updates, then inserts.
    pub fn apply<R: MemoRepository + ?Sized>(&self, repo: &R) -> MemoResult<AppliedPlan> {
        let mut applied = AppliedPlan::default();
        if self.is_empty() {
            return Ok(applied);
        }

        for &subtask_id in &self.to_delete {
            applied.orphaned_files.extend(repo.delete_subtask(subtask_id)?);
        }
        for subtask in &self.to_update {
            repo.save_subtask(subtask)?;
        }
        for subtask in &self.to_create {
            applied.created.push(repo.insert_subtask(subtask)?);
        }

        debug!(
            memo_id = self.memo_id,
            created = ?applied.created,
            deleted = ?self.to_delete,
            "Applied subtask plan"
        );
        Ok(applied)
    }
}
