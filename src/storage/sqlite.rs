//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CrawlStore trait.

use crate::state::{CrawlResult, FrontierEntry, Record};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CrawlStore, StorageError, StorageResult};
use crate::storage::{EntryStatus, FailureRecord, PendingEntry, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params![run_id], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn insert_queued(tx: &Transaction<'_>, run_id: i64, entries: &[FrontierEntry]) -> StorageResult<()> {
    if entries.is_empty() {
        return Ok(());
    }

    let now = Utc::now().to_rfc3339();
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO entries
            (run_id, url, host, depth, priority, referrer, status, attempts, discovered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    for entry in entries {
        stmt.execute(params![
            run_id,
            entry.url.as_str(),
            entry.host(),
            entry.depth,
            entry.priority,
            entry.referrer.as_ref().map(|r| r.as_str()),
            EntryStatus::Queued.to_db_string(),
            entry.retry_count,
            now,
        ])?;
    }
    Ok(())
}

impl CrawlStore for SqliteStore {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Entries =====

    fn record_enqueued(&mut self, run_id: i64, entries: &[FrontierEntry]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        insert_queued(&tx, run_id, entries)?;
        tx.commit()?;
        Ok(())
    }

    fn record_retry(
        &mut self,
        run_id: i64,
        url: &str,
        attempts: u32,
        error: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE entries SET attempts = ?1, error = ?2
             WHERE run_id = ?3 AND url = ?4 AND status = ?5",
            params![
                attempts,
                error,
                run_id,
                url,
                EntryStatus::Queued.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn record_completion(
        &mut self,
        run_id: i64,
        result: &CrawlResult,
        enqueued: &[FrontierEntry],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        let fetched_at = result.fetched_at.to_rfc3339();

        // A child can finish before its parent's completion is recorded, so
        // the terminal row may be the first one written for the URL
        tx.execute(
            "INSERT INTO entries
                (run_id, url, host, depth, status, status_code, attempts, error,
                 extraction_error, discovered_at, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(run_id, url) DO UPDATE SET
                status = excluded.status,
                status_code = excluded.status_code,
                attempts = excluded.attempts,
                error = excluded.error,
                extraction_error = excluded.extraction_error,
                fetched_at = excluded.fetched_at",
            params![
                run_id,
                result.url.as_str(),
                result.url.host(),
                result.depth,
                EntryStatus::from(result.status).to_db_string(),
                result.status_code,
                result.attempts,
                result.error,
                result.extraction_error,
                fetched_at,
            ],
        )?;

        if !result.extracted_records.is_empty() {
            let entry_id: i64 = tx.query_row(
                "SELECT id FROM entries WHERE run_id = ?1 AND url = ?2",
                params![run_id, result.url.as_str()],
                |row| row.get(0),
            )?;

            for (position, record) in result.extracted_records.iter().enumerate() {
                tx.execute(
                    "INSERT INTO records (entry_id, position) VALUES (?1, ?2)",
                    params![entry_id, position as i64],
                )?;
                let record_id = tx.last_insert_rowid();

                let mut stmt = tx.prepare_cached(
                    "INSERT INTO record_fields (record_id, name, value) VALUES (?1, ?2, ?3)",
                )?;
                for (name, value) in record.iter() {
                    stmt.execute(params![record_id, name, value])?;
                }
            }
        }

        insert_queued(&tx, run_id, enqueued)?;
        tx.commit()?;
        Ok(())
    }

    fn load_ledger(&self, run_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM entries WHERE run_id = ?1 ORDER BY id")?;
        let urls = stmt
            .query_map(params![run_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    fn load_pending(&self, run_id: i64) -> StorageResult<Vec<PendingEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, depth, priority, referrer, attempts FROM entries
             WHERE run_id = ?1 AND status = ?2 ORDER BY id",
        )?;
        let pending = stmt
            .query_map(params![run_id, EntryStatus::Queued.to_db_string()], |row| {
                Ok(PendingEntry {
                    url: row.get(0)?,
                    depth: row.get(1)?,
                    priority: row.get(2)?,
                    referrer: row.get(3)?,
                    attempts: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pending)
    }

    // ===== Statistics =====

    fn count_by_status(&self, run_id: i64, status: EntryStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE run_id = ?1 AND status = ?2",
            params![run_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_entries(&self, run_id: i64) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM entries WHERE run_id = ?1", run_id)
    }

    fn count_records(&self, run_id: i64) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM records r JOIN entries e ON e.id = r.entry_id WHERE e.run_id = ?1",
            run_id,
        )
    }

    fn count_hosts(&self, run_id: i64) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(DISTINCT host) FROM entries WHERE run_id = ?1",
            run_id,
        )
    }

    fn depth_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<u32, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT depth, COUNT(*) FROM entries WHERE run_id = ?1 GROUP BY depth ORDER BY depth",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }
        Ok(breakdown)
    }

    fn failures(&self, run_id: i64, limit: usize) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, status_code, error, attempts FROM entries
             WHERE run_id = ?1 AND status = ?2 ORDER BY id LIMIT ?3",
        )?;
        let failures = stmt
            .query_map(
                params![run_id, EntryStatus::Failed.to_db_string(), limit as i64],
                |row| {
                    Ok(FailureRecord {
                        url: row.get(0)?,
                        status_code: row.get(1)?,
                        error: row.get(2)?,
                        attempts: row.get(3)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(failures)
    }

    fn load_records(&self, run_id: i64) -> StorageResult<Vec<(String, Record)>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, e.url, f.name, f.value
             FROM records r
             JOIN entries e ON e.id = r.entry_id
             LEFT JOIN record_fields f ON f.record_id = r.id
             WHERE e.run_id = ?1
             ORDER BY r.id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut records: Vec<(String, Record)> = Vec::new();
        let mut current = None;
        for row in rows {
            let (record_id, url, name, value) = row?;
            if current != Some(record_id) {
                records.push((url, Record::new()));
                current = Some(record_id);
            }
            if let (Some(name), Some(value), Some((_, record))) = (name, value, records.last_mut())
            {
                record.insert(name, value);
            }
        }
        Ok(records)
    }
}
