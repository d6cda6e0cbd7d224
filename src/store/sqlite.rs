//! SQLite record store implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::store::schema::initialize_schema;
use crate::store::traits::{RecordStore, StoreError, StoreResult};
use crate::store::{EnrichmentRow, FieldBag, RecordRow, RunCounts, RunKind, RunRow};
use crate::ShelfError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite record store backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(ShelfError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ShelfError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, ShelfError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn record_id(&self, identifier: &str) -> StoreResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM records WHERE identifier = ?1",
                params![identifier],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

impl RecordStore for SqliteStore {
    // ===== Run Ledger =====

    fn create_run(
        &mut self,
        kind: RunKind,
        source: Option<&str>,
        config_hash: &str,
    ) -> StoreResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (kind, source, config_hash, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![kind.to_db_string(), source, config_hash, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_run_counts(&mut self, run_id: i64, counts: &RunCounts) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE runs SET discovered = ?1, inserted = ?2, updated = ?3, skipped = ?4
             WHERE id = ?5",
            params![
                counts.discovered,
                counts.inserted,
                counts.updated,
                counts.skipped,
                run_id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64, counts: &RunCounts) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET finished_at = ?1, discovered = ?2, inserted = ?3,
                             updated = ?4, skipped = ?5
             WHERE id = ?6",
            params![
                now,
                counts.discovered,
                counts.inserted,
                counts.updated,
                counts.skipped,
                run_id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn latest_runs(&self, limit: usize) -> StoreResult<Vec<RunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, source, config_hash, started_at, finished_at,
                    discovered, inserted, updated, skipped
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunRow {
                id: row.get(0)?,
                kind: RunKind::from_db_string(&row.get::<_, String>(1)?)
                    .unwrap_or(RunKind::Full),
                source: row.get(2)?,
                config_hash: row.get(3)?,
                started_at: row.get(4)?,
                finished_at: row.get(5)?,
                counts: RunCounts {
                    discovered: row.get(6)?,
                    inserted: row.get(7)?,
                    updated: row.get(8)?,
                    skipped: row.get(9)?,
                },
            })
        })?;

        let mut runs = Vec::new();
        for run in rows {
            runs.push(run?);
        }
        Ok(runs)
    }

    // ===== Records =====

    fn upsert_identifier(&mut self, identifier: &str, run_id: i64) -> StoreResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO records (identifier, discovered_at, discovered_run)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(identifier) DO NOTHING",
            params![identifier, now, run_id],
        )?;
        Ok(inserted > 0)
    }

    fn get_record(&self, identifier: &str) -> StoreResult<Option<RecordRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, identifier, discovered_at, discovered_run
             FROM records WHERE identifier = ?1",
        )?;

        let record = stmt
            .query_row(params![identifier], |row| {
                Ok(RecordRow {
                    id: row.get(0)?,
                    identifier: row.get(1)?,
                    discovered_at: row.get(2)?,
                    discovered_run: row.get(3)?,
                })
            })
            .optional()?;

        Ok(record)
    }

    fn merge_enrichment(
        &mut self,
        identifier: &str,
        source: &str,
        fields: &FieldBag,
        crawled_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let record_id = self
            .record_id(identifier)?
            .ok_or_else(|| StoreError::UnknownIdentifier(identifier.to_string()))?;

        let fields_json = serde_json::to_string(fields)?;
        self.conn.execute(
            "INSERT INTO enrichments (record_id, source, crawled_at, fields)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(record_id, source) DO UPDATE SET
                crawled_at = excluded.crawled_at,
                fields = excluded.fields",
            params![record_id, source, crawled_at.to_rfc3339(), fields_json],
        )?;

        Ok(())
    }

    fn get_enrichment(&self, identifier: &str, source: &str) -> StoreResult<Option<EnrichmentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.record_id, e.source, e.crawled_at, e.fields
             FROM enrichments e
             JOIN records r ON r.id = e.record_id
             WHERE r.identifier = ?1 AND e.source = ?2",
        )?;

        let raw = stmt
            .query_row(params![identifier, source], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()?;

        match raw {
            Some((record_id, source, crawled_at, fields_json)) => {
                let fields: FieldBag = serde_json::from_str(&fields_json)?;
                Ok(Some(EnrichmentRow {
                    record_id,
                    source,
                    crawled_at,
                    fields,
                }))
            }
            None => Ok(None),
        }
    }

    // ===== Staleness =====

    fn identifiers_missing_timestamp(&self, source: &str) -> StoreResult<Vec<String>> {
        self.identifiers_lacking_fresh_enrichment(source, None)
    }

    fn identifiers_lacking_fresh_enrichment(
        &self,
        source: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<String>> {
        // RFC 3339 timestamps in UTC compare correctly as text
        let mut identifiers = Vec::new();

        match cutoff {
            Some(cutoff) => {
                let mut stmt = self.conn.prepare(
                    "SELECT r.identifier FROM records r
                     LEFT JOIN enrichments e ON e.record_id = r.id AND e.source = ?1
                     WHERE e.id IS NULL OR e.crawled_at < ?2
                     ORDER BY r.identifier",
                )?;
                let rows = stmt.query_map(params![source, cutoff.to_rfc3339()], |row| {
                    row.get::<_, String>(0)
                })?;
                for id in rows {
                    identifiers.push(id?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT r.identifier FROM records r
                     LEFT JOIN enrichments e ON e.record_id = r.id AND e.source = ?1
                     WHERE e.id IS NULL
                     ORDER BY r.identifier",
                )?;
                let rows = stmt.query_map(params![source], |row| row.get::<_, String>(0))?;
                for id in rows {
                    identifiers.push(id?);
                }
            }
        }

        Ok(identifiers)
    }

    // ===== Statistics =====

    fn count_records(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_enriched(&self, source: &str) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM enrichments WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn enrichment_sources(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT source FROM enrichments ORDER BY source")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut sources = Vec::new();
        for source in rows {
            sources.push(source?);
        }
        Ok(sources)
    }
}
