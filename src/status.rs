//! Memo completion derived from subtasks.
//!
//! A memo is either active (no completion time) or complete. With subtasks, it
//! is complete exactly when all of them are, stamped with the latest subtask
//! completion time. Without subtasks, completion is whatever the user set.

use crate::db::repository::MemoRepository;
use crate::error::{MemoError, MemoResult};
use crate::types::{Memo, SubTask};
use chrono::NaiveDateTime;
use tracing::{info, warn};

/// Completion state derived from a subtask list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derived {
    /// No subtasks: completion is user-controlled.
    Unmanaged,
    /// Every subtask is complete.
    Complete(NaiveDateTime),
    /// At least one subtask is open.
    Active,
}

/// Derive completion from subtasks.
///
/// If a complete subtask has no stored stamp the memo is stamped `now`; the
/// subtask itself is not repaired.
pub fn derive(subtasks: &[SubTask], now: NaiveDateTime) -> Derived {
    if subtasks.is_empty() {
        return Derived::Unmanaged;
    }
    if subtasks.iter().any(|s| !s.is_completed) {
        return Derived::Active;
    }

    let latest = subtasks
        .iter()
        .map(|s| s.completed_at)
        .collect::<Option<Vec<_>>>()
        .and_then(|stamps| stamps.into_iter().max())
        .unwrap_or(now);
    Derived::Complete(latest)
}

/// Recompute and store a memo's completion from its current subtasks.
///
/// Reads subtasks through `repo`, so inside a transaction it sees the writes
/// just made by reconciliation. Returns the memo as stored afterwards.
pub fn sync<R: MemoRepository + ?Sized>(
    repo: &R,
    memo_id: i64,
    now: NaiveDateTime,
) -> MemoResult<Memo> {
    let mut memo = repo.load(memo_id)?.ok_or(MemoError::MemoNotFound(memo_id))?;

    let target = match derive(&memo.subtasks, now) {
        Derived::Unmanaged => return Ok(memo),
        Derived::Complete(at) => Some(at),
        Derived::Active => None,
    };

    if memo.completed_at != target {
        if target.is_some() {
            info!(memo_id, "Memo completed: all subtasks done");
        } else {
            info!(memo_id, "Memo reopened: subtask incomplete");
        }
        memo.completed_at = target;
        repo.save(&memo)?;
    }

    Ok(memo)
}

/// Completion requested directly on a memo, bypassing subtask edits.
///
/// Reopening always succeeds. Completing is rejected while any subtask is
/// open; with all subtasks done the latest subtask stamp is used, and with
/// none the memo is stamped `now`.
pub fn mark_memo<R: MemoRepository + ?Sized>(
    repo: &R,
    memo_id: i64,
    completed: bool,
    now: NaiveDateTime,
) -> MemoResult<Memo> {
    let mut memo = repo.load(memo_id)?.ok_or(MemoError::MemoNotFound(memo_id))?;

    let target = if !completed {
        None
    } else {
        match derive(&memo.subtasks, now) {
            Derived::Unmanaged => Some(now),
            Derived::Complete(at) => Some(at),
            Derived::Active => {
                let incomplete = memo.subtasks.iter().filter(|s| !s.is_completed).count();
                warn!(memo_id, incomplete, "Rejected completion with open subtasks");
                return Err(MemoError::InvalidTransition {
                    memo_id,
                    incomplete,
                });
            }
        }
    };

    memo.completed_at = target;
    memo.updated_at = Some(now);
    repo.save(&memo)?;
    info!(memo_id, completed, "Memo status set");

    Ok(memo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn subtask(id: i64, completed_at: Option<&str>) -> SubTask {
        SubTask {
            id,
            memo_id: 1,
            content: String::new(),
            note: None,
            is_completed: completed_at.is_some(),
            position: id,
            created_at: at("2024-01-01 00:00:00"),
            start_time: None,
            completed_at: completed_at.map(at),
            attachments: vec![],
        }
    }

    #[test]
    fn empty_list_is_unmanaged() {
        assert_eq!(derive(&[], at("2024-01-05 00:00:00")), Derived::Unmanaged);
    }

    #[test]
    fn any_open_subtask_means_active() {
        let subtasks = vec![subtask(1, Some("2024-01-02 10:00:00")), subtask(2, None)];
        assert_eq!(derive(&subtasks, at("2024-01-05 00:00:00")), Derived::Active);
    }

    #[test]
    fn all_done_takes_latest_stamp() {
        let subtasks = vec![
            subtask(1, Some("2024-01-03 10:00:00")),
            subtask(2, Some("2024-01-02 10:00:00")),
        ];
        assert_eq!(
            derive(&subtasks, at("2024-01-05 00:00:00")),
            Derived::Complete(at("2024-01-03 10:00:00"))
        );
    }

    #[test]
    fn missing_subtask_stamp_falls_back_to_now() {
        let mut legacy = subtask(2, Some("2024-01-02 10:00:00"));
        legacy.completed_at = None;
        let subtasks = vec![subtask(1, Some("2024-01-03 10:00:00")), legacy];
        assert_eq!(
            derive(&subtasks, at("2024-01-05 00:00:00")),
            Derived::Complete(at("2024-01-05 00:00:00"))
        );
    }
}
