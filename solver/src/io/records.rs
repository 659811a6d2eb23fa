//! SQLite store with one row per finished game.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::metrics::Metrics;

const CREATE_EVALUATIONS: &str = "CREATE TABLE IF NOT EXISTS evaluations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    run_id TEXT NOT NULL,
    puzzle_id TEXT NOT NULL,
    strategy TEXT NOT NULL,
    hallucination_count INTEGER NOT NULL,
    failed_guesses INTEGER NOT NULL,
    solve_rate REAL NOT NULL,
    solve_order TEXT NOT NULL,
    points INTEGER NOT NULL,
    tokens_generated INTEGER NOT NULL,
    tokens_ingested INTEGER NOT NULL,
    category_similarity REAL NOT NULL
)";

/// Persisted summary of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// RFC 3339 completion time.
    pub timestamp: String,
    /// Groups records written by one CLI invocation.
    pub run_id: String,
    pub puzzle_id: String,
    pub strategy: String,
    pub hallucination_count: u32,
    pub failed_guesses: u32,
    /// Percent of categories found, 0 to 100.
    pub solve_rate: f64,
    /// Original category indices in the order they were found.
    pub solve_order: Vec<usize>,
    pub points: u32,
    pub tokens_generated: u64,
    pub tokens_ingested: u64,
    pub category_similarity: f64,
}

impl GameRecord {
    pub fn from_metrics(
        metrics: &Metrics,
        run_id: &str,
        puzzle_id: &str,
        strategy: &str,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: finished_at.to_rfc3339(),
            run_id: run_id.to_string(),
            puzzle_id: puzzle_id.to_string(),
            strategy: strategy.to_string(),
            hallucination_count: metrics.hallucinated_word_count(),
            failed_guesses: metrics.failed_guesses(),
            solve_rate: metrics.solve_rate(),
            solve_order: metrics.solve_order().to_vec(),
            points: metrics.points(),
            tokens_generated: metrics.tokens_generated(),
            tokens_ingested: metrics.tokens_ingested(),
            category_similarity: metrics.running_category_similarity(),
        }
    }
}

/// Handle to the `evaluations` table.
pub struct EvaluationStore {
    conn: Connection,
}

impl EvaluationStore {
    /// Open (or create) the database file and ensure the table exists.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open database {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(30))
            .context("set busy timeout")?;
        conn.execute(CREATE_EVALUATIONS, [])
            .context("create evaluations table")?;
        debug!("evaluation store ready");
        Ok(Self { conn })
    }

    /// Append one record and return its row id.
    pub fn insert(&self, record: &GameRecord) -> Result<i64> {
        let solve_order =
            serde_json::to_string(&record.solve_order).context("serialize solve order")?;
        self.conn
            .execute(
                "INSERT INTO evaluations (
                    timestamp, run_id, puzzle_id, strategy, hallucination_count,
                    failed_guesses, solve_rate, solve_order, points,
                    tokens_generated, tokens_ingested, category_similarity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.timestamp,
                    record.run_id,
                    record.puzzle_id,
                    record.strategy,
                    record.hallucination_count,
                    record.failed_guesses,
                    record.solve_rate,
                    solve_order,
                    record.points,
                    record.tokens_generated as i64,
                    record.tokens_ingested as i64,
                    record.category_similarity,
                ],
            )
            .context("insert evaluation")?;
        let id = self.conn.last_insert_rowid();
        debug!(id, puzzle_id = %record.puzzle_id, "evaluation stored");
        Ok(id)
    }

    /// All records in insertion order, optionally limited to one run.
    pub fn list(&self, run_id: Option<&str>) -> Result<Vec<GameRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT timestamp, run_id, puzzle_id, strategy, hallucination_count,
                        failed_guesses, solve_rate, solve_order, points,
                        tokens_generated, tokens_ingested, category_similarity
                 FROM evaluations
                 WHERE ?1 IS NULL OR run_id = ?1
                 ORDER BY id",
            )
            .context("prepare evaluation query")?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                let solve_order: String = row.get(7)?;
                let tokens_generated: i64 = row.get(9)?;
                let tokens_ingested: i64 = row.get(10)?;
                Ok((
                    GameRecord {
                        timestamp: row.get(0)?,
                        run_id: row.get(1)?,
                        puzzle_id: row.get(2)?,
                        strategy: row.get(3)?,
                        hallucination_count: row.get(4)?,
                        failed_guesses: row.get(5)?,
                        solve_rate: row.get(6)?,
                        solve_order: Vec::new(),
                        points: row.get(8)?,
                        tokens_generated: tokens_generated.max(0) as u64,
                        tokens_ingested: tokens_ingested.max(0) as u64,
                        category_similarity: row.get(11)?,
                    },
                    solve_order,
                ))
            })
            .context("query evaluations")?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, solve_order) = row.context("read evaluation row")?;
            record.solve_order = serde_json::from_str(&solve_order)
                .with_context(|| format!("parse solve order '{solve_order}'"))?;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(run_id: &str, puzzle_id: &str, solve_rate: f64) -> GameRecord {
        let mut metrics = Metrics::new(4);
        metrics.add_solve(1);
        metrics.add_solve(3);
        metrics.record_failed_guess();
        metrics.add_hallucinations(2);
        GameRecord {
            solve_rate,
            ..GameRecord::from_metrics(&metrics, run_id, puzzle_id, "negotiation", Utc::now())
        }
    }

    #[test]
    fn insert_then_list_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = EvaluationStore::open(&temp.path().join("nested/evaluations.db")).expect("open");
        let first = record("eval-1", "0", 50.0);
        let second = record("eval-2", "1", 100.0);
        assert_eq!(store.insert(&first).expect("insert"), 1);
        assert_eq!(store.insert(&second).expect("insert"), 2);

        let all = store.list(None).expect("list");
        assert_eq!(all, vec![first.clone(), second]);
        assert_eq!(all[0].solve_order, vec![1, 3]);
        assert_eq!(all[0].points, 9);
        assert_eq!(all[0].hallucination_count, 2);

        let only_first = store.list(Some("eval-1")).expect("list run");
        assert_eq!(only_first, vec![first]);
    }

    #[test]
    fn reopening_keeps_rows() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("evaluations.db");
        {
            let store = EvaluationStore::open(&path).expect("open");
            store.insert(&record("eval-1", "0", 25.0)).expect("insert");
        }
        let store = EvaluationStore::open(&path).expect("reopen");
        assert_eq!(store.list(None).expect("list").len(), 1);
    }
}
