//! SQLite-backed progress tracking for resumable ingestion.
//!
//! Two tables: `document_progress` keyed by `(document_id, document_type)` with a
//! `pending -> processing -> completed|failed` state machine, and `ingestion_runs`
//! recording each run's window and final counts. The connection runs in autocommit
//! mode; every operation is its own transaction, which is what makes interrupts
//! safe to resume from.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by the progress tracker.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Underlying SQLite failure.
    #[error("Progress database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A failed document surfaced in statistics output.
#[derive(Debug, Clone)]
pub struct FailedDocument {
    /// Identifier of the failed document.
    pub document_id: String,
    /// Stored error message.
    pub error: String,
    /// Timestamp of the failure.
    pub failed_at: String,
}

/// Aggregate processing statistics for one document type.
#[derive(Debug, Clone, Default)]
pub struct ProgressStatistics {
    /// Document type the statistics cover.
    pub document_type: String,
    /// Total tracked documents.
    pub total: u64,
    /// Documents completed successfully.
    pub completed: u64,
    /// Documents that failed.
    pub failed: u64,
    /// Documents still pending.
    pub pending: u64,
    /// Documents currently marked processing.
    pub processing: u64,
    /// Completed / (completed + failed), as a percentage.
    pub success_rate: f64,
    /// Mean processing time of completed documents.
    pub avg_processing_time_ms: Option<i64>,
    /// Up to ten most recent failures.
    pub failed_documents: Vec<FailedDocument>,
}

/// One row of run history.
#[derive(Debug, Clone)]
pub struct IngestionRun {
    /// Monotonic run identifier.
    pub run_id: i64,
    /// Document type the run covered.
    pub document_type: String,
    /// Start of the requested date range.
    pub start_date: String,
    /// End of the requested date range.
    pub end_date: String,
    /// Total documents tracked at run end.
    pub total_documents: u64,
    /// Completed documents at run end.
    pub completed_documents: u64,
    /// Failed documents at run end.
    pub failed_documents: u64,
    /// When the run started.
    pub started_at: String,
    /// When the run ended, if it did.
    pub completed_at: Option<String>,
    /// JSON-encoded run parameters.
    pub parameters: String,
}

/// SQLite-based progress tracker scoped to one document type.
pub struct ProgressTracker {
    conn: Connection,
    document_type: String,
}

impl ProgressTracker {
    /// Open (or create) the progress database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, document_type: &str) -> Result<Self, ProgressError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    ProgressError::Database(rusqlite::Error::InvalidPath(
                        format!("{}: {err}", parent.display()).into(),
                    ))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        let tracker = Self {
            conn,
            document_type: document_type.to_string(),
        };
        tracker.initialize()?;
        Ok(tracker)
    }

    /// Create an in-memory tracker (used by tests).
    pub fn in_memory(document_type: &str) -> Result<Self, ProgressError> {
        let conn = Connection::open_in_memory()?;
        let tracker = Self {
            conn,
            document_type: document_type.to_string(),
        };
        tracker.initialize()?;
        Ok(tracker)
    }

    /// Document type this tracker is scoped to.
    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    fn initialize(&self) -> Result<(), ProgressError> {
        self.conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS document_progress (
                document_id TEXT NOT NULL,
                document_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                error_message TEXT,
                metadata TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                processing_time_ms INTEGER,
                PRIMARY KEY (document_id, document_type)
            );

            CREATE INDEX IF NOT EXISTS idx_status_type
            ON document_progress(document_type, status);

            CREATE TABLE IF NOT EXISTS ingestion_runs (
                run_id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_type TEXT NOT NULL,
                start_date TEXT,
                end_date TEXT,
                total_documents INTEGER DEFAULT 0,
                completed_documents INTEGER DEFAULT 0,
                failed_documents INTEGER DEFAULT 0,
                started_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                completed_at TIMESTAMP,
                parameters TEXT
            );
        ",
        )?;
        Ok(())
    }

    /// Record the start of an ingestion run and return its id.
    pub fn start_run(
        &self,
        start_date: &str,
        end_date: &str,
        parameters: &Value,
    ) -> Result<i64, ProgressError> {
        self.conn.execute(
            r"
            INSERT INTO ingestion_runs (document_type, start_date, end_date, parameters)
            VALUES (?1, ?2, ?3, ?4)
        ",
            params![
                self.document_type,
                start_date,
                end_date,
                parameters.to_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Close out a run, recomputing totals from the progress table.
    pub fn end_run(&self, run_id: i64) -> Result<(), ProgressError> {
        self.conn.execute(
            r"
            UPDATE ingestion_runs
            SET completed_at = CURRENT_TIMESTAMP,
                total_documents = (
                    SELECT COUNT(*) FROM document_progress
                    WHERE document_type = ?1
                ),
                completed_documents = (
                    SELECT COUNT(*) FROM document_progress
                    WHERE document_type = ?1 AND status = 'completed'
                ),
                failed_documents = (
                    SELECT COUNT(*) FROM document_progress
                    WHERE document_type = ?1 AND status = 'failed'
                )
            WHERE run_id = ?2
        ",
            params![self.document_type, run_id],
        )?;
        Ok(())
    }

    /// Add a document to track; existing rows are left untouched.
    pub fn add_document(
        &self,
        document_id: &str,
        metadata: Option<&Value>,
    ) -> Result<(), ProgressError> {
        let metadata_json = metadata
            .map(Value::to_string)
            .unwrap_or_else(|| "{}".to_string());
        self.conn.execute(
            r"
            INSERT OR IGNORE INTO document_progress (document_id, document_type, status, metadata)
            VALUES (?1, ?2, 'pending', ?3)
        ",
            params![document_id, self.document_type, metadata_json],
        )?;
        Ok(())
    }

    /// Whether a document has already completed successfully.
    pub fn is_processed(&self, document_id: &str) -> Result<bool, ProgressError> {
        let row: Option<String> = self
            .conn
            .query_row(
                r"
                SELECT status FROM document_progress
                WHERE document_id = ?1 AND document_type = ?2 AND status = 'completed'
            ",
                params![document_id, self.document_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    /// Mark a document as currently being processed.
    pub fn mark_processing(&self, document_id: &str) -> Result<(), ProgressError> {
        self.conn.execute(
            r"
            UPDATE document_progress
            SET status = 'processing', updated_at = CURRENT_TIMESTAMP
            WHERE document_id = ?1 AND document_type = ?2
        ",
            params![document_id, self.document_type],
        )?;
        Ok(())
    }

    /// Mark a document completed, clearing any prior error.
    pub fn mark_completed(
        &self,
        document_id: &str,
        processing_time_ms: Option<i64>,
    ) -> Result<(), ProgressError> {
        self.conn.execute(
            r"
            UPDATE document_progress
            SET status = 'completed',
                updated_at = CURRENT_TIMESTAMP,
                processing_time_ms = ?1,
                error_message = NULL
            WHERE document_id = ?2 AND document_type = ?3
        ",
            params![processing_time_ms, document_id, self.document_type],
        )?;
        Ok(())
    }

    /// Mark a document failed with an error message.
    pub fn mark_failed(&self, document_id: &str, error_message: &str) -> Result<(), ProgressError> {
        self.conn.execute(
            r"
            UPDATE document_progress
            SET status = 'failed',
                error_message = ?1,
                updated_at = CURRENT_TIMESTAMP
            WHERE document_id = ?2 AND document_type = ?3
        ",
            params![error_message, document_id, self.document_type],
        )?;
        Ok(())
    }

    /// Documents still needing work: pending plus failed (retried), oldest first.
    pub fn get_pending_documents(&self, limit: Option<usize>) -> Result<Vec<String>, ProgressError> {
        let mut query = String::from(
            r"
            SELECT document_id FROM document_progress
            WHERE document_type = ?1 AND status IN ('pending', 'failed')
            ORDER BY created_at
        ",
        );
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut statement = self.conn.prepare(&query)?;
        let rows = statement.query_map(params![self.document_type], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Reset rows stuck in `processing` back to `pending` after a crash or interrupt.
    pub fn reset_processing_status(&self) -> Result<usize, ProgressError> {
        let count = self.conn.execute(
            r"
            UPDATE document_progress
            SET status = 'pending', updated_at = CURRENT_TIMESTAMP
            WHERE document_type = ?1 AND status = 'processing'
        ",
            params![self.document_type],
        )?;
        if count > 0 {
            tracing::info!(count, "Reset documents from 'processing' to 'pending'");
        }
        Ok(count)
    }

    /// Aggregate statistics, including the ten most recent failures.
    pub fn get_statistics(&self) -> Result<ProgressStatistics, ProgressError> {
        let mut stats = ProgressStatistics {
            document_type: self.document_type.clone(),
            ..ProgressStatistics::default()
        };

        let mut statement = self.conn.prepare(
            r"
            SELECT status, COUNT(*) FROM document_progress
            WHERE document_type = ?1
            GROUP BY status
        ",
        )?;
        let rows = statement.query_map(params![self.document_type], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        for row in rows {
            let (status, count) = row?;
            match status.as_str() {
                "completed" => stats.completed = count,
                "failed" => stats.failed = count,
                "pending" => stats.pending = count,
                "processing" => stats.processing = count,
                _ => {}
            }
            stats.total += count;
        }

        let finished = stats.completed + stats.failed;
        if finished > 0 {
            stats.success_rate = stats.completed as f64 / finished as f64 * 100.0;
        }

        stats.avg_processing_time_ms = self
            .conn
            .query_row(
                r"
                SELECT AVG(processing_time_ms) FROM document_progress
                WHERE document_type = ?1 AND status = 'completed'
                  AND processing_time_ms IS NOT NULL
            ",
                params![self.document_type],
                |row| row.get::<_, Option<f64>>(0),
            )?
            .map(|avg| avg as i64);

        let mut statement = self.conn.prepare(
            r"
            SELECT document_id, error_message, updated_at
            FROM document_progress
            WHERE document_type = ?1 AND status = 'failed'
            ORDER BY updated_at DESC
            LIMIT 10
        ",
        )?;
        let rows = statement.query_map(params![self.document_type], |row| {
            Ok(FailedDocument {
                document_id: row.get(0)?,
                error: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                failed_at: row.get(2)?,
            })
        })?;
        for row in rows {
            stats.failed_documents.push(row?);
        }

        Ok(stats)
    }

    /// Recent run history, newest first.
    pub fn get_run_history(&self, limit: usize) -> Result<Vec<IngestionRun>, ProgressError> {
        let mut statement = self.conn.prepare(
            r"
            SELECT run_id, document_type, start_date, end_date,
                   total_documents, completed_documents, failed_documents,
                   started_at, completed_at, parameters
            FROM ingestion_runs
            WHERE document_type = ?1
            ORDER BY started_at DESC, run_id DESC
            LIMIT ?2
        ",
        )?;
        let rows = statement.query_map(params![self.document_type, limit as i64], |row| {
            Ok(IngestionRun {
                run_id: row.get(0)?,
                document_type: row.get(1)?,
                start_date: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                end_date: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                total_documents: row.get::<_, i64>(4)? as u64,
                completed_documents: row.get::<_, i64>(5)? as u64,
                failed_documents: row.get::<_, i64>(6)? as u64,
                started_at: row.get(7)?,
                completed_at: row.get(8)?,
                parameters: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            })
        })?;
        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }
        Ok(runs)
    }

    /// Close the database connection.
    pub fn close(self) {
        let _ = self.conn.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tracker() -> ProgressTracker {
        ProgressTracker::in_memory("scotus").expect("tracker")
    }

    #[test]
    fn documents_progress_through_the_state_machine() {
        let tracker = tracker();
        tracker.add_document("doc-1", None).expect("add");
        assert!(!tracker.is_processed("doc-1").expect("check"));

        tracker.mark_processing("doc-1").expect("processing");
        tracker.mark_completed("doc-1", Some(1500)).expect("complete");
        assert!(tracker.is_processed("doc-1").expect("check"));

        let stats = tracker.get_statistics().expect("stats");
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.avg_processing_time_ms, Some(1500));
        assert!((stats.success_rate - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn adding_an_existing_document_is_ignored() {
        let tracker = tracker();
        tracker.add_document("doc-1", None).expect("add");
        tracker.mark_processing("doc-1").expect("processing");
        tracker.mark_completed("doc-1", None).expect("complete");
        tracker.add_document("doc-1", None).expect("re-add");
        assert!(tracker.is_processed("doc-1").expect("still completed"));
    }

    #[test]
    fn resume_resets_processing_and_retries_failures() {
        let tracker = tracker();
        for id in ["a", "b", "c", "d", "e"] {
            tracker.add_document(id, None).expect("add");
        }
        tracker.mark_processing("a").expect("processing");
        tracker.mark_completed("a", Some(10)).expect("complete");
        tracker.mark_processing("b").expect("processing");
        tracker.mark_failed("b", "boom").expect("fail");
        tracker.mark_processing("c").expect("left processing");
        // d and e stay pending.

        let reset = tracker.reset_processing_status().expect("reset");
        assert_eq!(reset, 1);

        let stats = tracker.get_statistics().expect("stats");
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.processing, 0);

        // The work queue retries failures alongside pending documents.
        let pending = tracker.get_pending_documents(None).expect("pending");
        assert_eq!(pending.len(), 4);
        assert!(!pending.contains(&"a".to_string()));
    }

    #[test]
    fn completion_clears_a_prior_error_message() {
        let tracker = tracker();
        tracker.add_document("doc-1", None).expect("add");
        tracker.mark_failed("doc-1", "transient").expect("fail");
        tracker.mark_processing("doc-1").expect("retry");
        tracker.mark_completed("doc-1", Some(5)).expect("complete");

        let stats = tracker.get_statistics().expect("stats");
        assert_eq!(stats.failed, 0);
        assert!(stats.failed_documents.is_empty());
    }

    #[test]
    fn run_lifecycle_records_totals() {
        let tracker = tracker();
        let run_id = tracker
            .start_run("2024-01-01", "2024-12-31", &json!({"batch_size": 50}))
            .expect("start run");

        tracker.add_document("doc-1", None).expect("add");
        tracker.mark_processing("doc-1").expect("processing");
        tracker.mark_completed("doc-1", None).expect("complete");
        tracker.add_document("doc-2", None).expect("add");
        tracker.mark_failed("doc-2", "bad").expect("fail");

        tracker.end_run(run_id).expect("end run");

        let runs = tracker.get_run_history(10).expect("history");
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.run_id, run_id);
        assert_eq!(run.total_documents, 2);
        assert_eq!(run.completed_documents, 1);
        assert_eq!(run.failed_documents, 1);
        assert!(run.completed_at.is_some());
        assert!(run.parameters.contains("batch_size"));
    }

    #[test]
    fn statistics_cap_failure_listing_at_ten() {
        let tracker = tracker();
        for i in 0..15 {
            let id = format!("doc-{i}");
            tracker.add_document(&id, None).expect("add");
            tracker.mark_failed(&id, "err").expect("fail");
        }
        let stats = tracker.get_statistics().expect("stats");
        assert_eq!(stats.failed, 15);
        assert_eq!(stats.failed_documents.len(), 10);
    }

    #[test]
    fn trackers_are_scoped_by_document_type() {
        let conn_path = tempfile::NamedTempFile::new().expect("temp file");
        let scotus = ProgressTracker::open(conn_path.path(), "scotus").expect("scotus");
        let eo = ProgressTracker::open(conn_path.path(), "executive_order").expect("eo");

        scotus.add_document("shared-id", None).expect("add");
        eo.add_document("shared-id", None).expect("add");
        scotus.mark_processing("shared-id").expect("processing");
        scotus.mark_completed("shared-id", None).expect("complete");

        assert!(scotus.is_processed("shared-id").expect("scotus"));
        assert!(!eo.is_processed("shared-id").expect("eo"));
    }
}
