//! Aggregation queries for statistics.

use super::Database;
use crate::error::MemoResult;
use crate::time::{Stamp, elapsed};
use crate::types::Stats;
use chrono::NaiveDateTime;
use rusqlite::params;

fn mean_secs(durations: &[i64]) -> Option<f64> {
    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
}

impl Database {
    /// Counts across all memos and subtasks, plus mean completion times.
    pub fn get_stats(&self) -> MemoResult<Stats> {
        let now = self.time.now();

        self.with_conn(|conn| {
            let mut stats = conn.query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN completed_at IS NULL THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN completed_at IS NOT NULL THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN completed_at IS NULL AND deadline IS NOT NULL
                                       AND deadline < ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN category = 'work' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN category = 'life' THEN 1 ELSE 0 END), 0)
                 FROM memos",
                params![now],
                |row| {
                    Ok(Stats {
                        total_memos: row.get(0)?,
                        active_memos: row.get(1)?,
                        completed_memos: row.get(2)?,
                        overdue_memos: row.get(3)?,
                        work_memos: row.get(4)?,
                        life_memos: row.get(5)?,
                        ..Stats::default()
                    })
                },
            )?;

            (stats.total_subtasks, stats.completed_subtasks) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM subtasks",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )?;

            // Backfilled completions can precede the start; those spans are skipped.
            let memo_spans = {
                let mut stmt = conn.prepare(
                    "SELECT created_at, completed_at FROM memos WHERE completed_at IS NOT NULL",
                )?;
                stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, NaiveDateTime>(0)?,
                        row.get::<_, NaiveDateTime>(1)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?
            };
            let memo_secs: Vec<i64> = memo_spans
                .into_iter()
                .map(|(start, end)| elapsed(Stamp::Naive(start), Stamp::Naive(end)).num_seconds())
                .filter(|secs| *secs >= 0)
                .collect();
            stats.avg_memo_completion_secs = mean_secs(&memo_secs);

            let subtask_spans = {
                let mut stmt = conn.prepare(
                    "SELECT COALESCE(start_time, created_at), completed_at
                     FROM subtasks WHERE is_completed = 1 AND completed_at IS NOT NULL",
                )?;
                stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, NaiveDateTime>(0)?,
                        row.get::<_, NaiveDateTime>(1)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?
            };
            let subtask_secs: Vec<i64> = subtask_spans
                .into_iter()
                .map(|(start, end)| elapsed(Stamp::Naive(start), Stamp::Naive(end)).num_seconds())
                .filter(|secs| *secs >= 0)
                .collect();
            stats.avg_subtask_duration_secs = mean_secs(&subtask_secs);

            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean_secs(&[]), None);
    }

    #[test]
    fn mean_averages_seconds() {
        assert_eq!(mean_secs(&[60, 120]), Some(90.0));
    }
}
