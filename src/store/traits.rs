//! Store traits and error types
//!
//! This module defines the trait interface for record store backends and
//! associated error types.

use crate::store::{EnrichmentRow, FieldBag, RecordRow, RunCounts, RunKind, RunRow};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Enrichment attempted for an identifier discovery never created.
    /// Fatal to that merge call only; the record store is left unchanged.
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Field encoding error: {0}")]
    FieldEncoding(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for record store backends
///
/// Every write defined here is safe to repeat: discovery upserts are
/// create-if-absent, enrichment merges overwrite exactly one (record, source)
/// field group and preserve everything else.
pub trait RecordStore {
    // ===== Run Ledger =====

    /// Creates a new run row
    ///
    /// # Arguments
    ///
    /// * `kind` - What the run executes
    /// * `source` - The single source for `RunKind::Enrichment` runs
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(
        &mut self,
        kind: RunKind,
        source: Option<&str>,
        config_hash: &str,
    ) -> StoreResult<i64>;

    /// Updates the summary counts of a run in place
    fn update_run_counts(&mut self, run_id: i64, counts: &RunCounts) -> StoreResult<()>;

    /// Marks a run finished, recording its final counts
    fn complete_run(&mut self, run_id: i64, counts: &RunCounts) -> StoreResult<()>;

    /// Gets the most recent runs, newest first
    fn latest_runs(&self, limit: usize) -> StoreResult<Vec<RunRow>>;

    // ===== Records =====

    /// Creates a bare record for `identifier` if none exists
    ///
    /// Safe under repeated calls with the same identifier; the existing
    /// record (and all its enrichments) is left untouched.
    ///
    /// # Returns
    ///
    /// `true` if a new record was created, `false` if one already existed
    fn upsert_identifier(&mut self, identifier: &str, run_id: i64) -> StoreResult<bool>;

    /// Gets a record by identifier
    fn get_record(&self, identifier: &str) -> StoreResult<Option<RecordRow>>;

    /// Overwrites `source`'s timestamp and field group on an existing record
    ///
    /// Fails with [`StoreError::UnknownIdentifier`] if discovery has not
    /// created the record; enrichment never creates identifiers. Data stored
    /// by other sources is preserved unchanged.
    fn merge_enrichment(
        &mut self,
        identifier: &str,
        source: &str,
        fields: &FieldBag,
        crawled_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Gets one source's enrichment of one record
    fn get_enrichment(&self, identifier: &str, source: &str) -> StoreResult<Option<EnrichmentRow>>;

    // ===== Staleness =====

    /// Identifiers `source` has never successfully enriched
    fn identifiers_missing_timestamp(&self, source: &str) -> StoreResult<Vec<String>>;

    /// Identifiers `source` has never enriched, or last enriched before
    /// `cutoff` when one is given
    ///
    /// Return order is an implementation detail; callers shuffle before
    /// dispatch.
    fn identifiers_lacking_fresh_enrichment(
        &self,
        source: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<String>>;

    // ===== Statistics =====

    /// Total number of discovered records
    fn count_records(&self) -> StoreResult<u64>;

    /// Number of records a source has enriched
    fn count_enriched(&self, source: &str) -> StoreResult<u64>;

    /// Distinct source names present in the enrichments table
    fn enrichment_sources(&self) -> StoreResult<Vec<String>>;
}
