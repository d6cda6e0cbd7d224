//! Record store module
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Identifier discovery upserts (create-if-absent, safe to repeat)
//! - Per-source enrichment merges that never touch other sources' data
//! - Staleness queries (which identifiers a source still has to visit)
//! - Run ledger with discovery/enrichment summary counts

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StoreError, StoreResult};

use crate::ShelfError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Initializes or opens a store database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized store
/// * `Err(ShelfError)` - Failed to initialize store
pub fn open_store(path: &Path) -> Result<SqliteStore, ShelfError> {
    SqliteStore::new(path)
}

/// One extracted field value
///
/// The untagged representation keeps the stored JSON flat: text stays a
/// string, counts stay numbers, tag clouds stay objects, related identifiers
/// stay arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    IdSet(BTreeSet<String>),
    Map(BTreeMap<String, String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

/// The field group one enrichment source extracted for one record
pub type FieldBag = BTreeMap<String, FieldValue>;

/// Represents a discovered record in the database
#[derive(Debug, Clone)]
pub struct RecordRow {
    pub id: i64,
    pub identifier: String,
    pub discovered_at: String,
    pub discovered_run: i64,
}

/// Represents one source's enrichment of one record
#[derive(Debug, Clone)]
pub struct EnrichmentRow {
    pub record_id: i64,
    pub source: String,
    pub crawled_at: String,
    pub fields: FieldBag,
}

/// Represents a crawl run with its summary counts
#[derive(Debug, Clone)]
pub struct RunRow {
    pub id: i64,
    pub kind: RunKind,
    pub source: Option<String>,
    pub config_hash: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub counts: RunCounts,
}

/// What a run executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Discovery followed by every configured enrichment source
    Full,
    /// Discovery only
    Discovery,
    /// A single enrichment source only
    Enrichment,
}

impl RunKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Discovery => "discovery",
            Self::Enrichment => "enrichment",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "discovery" => Some(Self::Discovery),
            "enrichment" => Some(Self::Enrichment),
            _ => None,
        }
    }
}

/// Summary counts for one run, logged at completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    /// Identifiers read out of listings (before dedup against the store)
    pub discovered: u64,
    /// New records created by discovery write-back
    pub inserted: u64,
    /// Enrichments merged (new or refreshed)
    pub updated: u64,
    /// Units skipped after a contained failure
    pub skipped: u64,
}

impl RunCounts {
    /// Adds another batch's counts into this one
    pub fn absorb(&mut self, other: &RunCounts) {
        self.discovered += other.discovered;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_kind_roundtrip() {
        for kind in &[RunKind::Full, RunKind::Discovery, RunKind::Enrichment] {
            let db_str = kind.to_db_string();
            let parsed = RunKind::from_db_string(db_str);
            assert_eq!(Some(*kind), parsed);
        }
    }

    #[test]
    fn test_run_kind_invalid() {
        assert_eq!(RunKind::from_db_string("invalid"), None);
    }

    #[test]
    fn test_field_value_json_shapes() {
        let mut bag = FieldBag::new();
        bag.insert("title".to_string(), "Paper Planner".into());
        bag.insert("rating_count".to_string(), 1520.into());
        bag.insert("rating".to_string(), 4.5.into());
        bag.insert(
            "related".to_string(),
            FieldValue::IdSet(BTreeSet::from(["a.one".to_string(), "b.two".to_string()])),
        );

        let json = serde_json::to_string(&bag).unwrap();
        assert!(json.contains(r#""title":"Paper Planner""#));
        assert!(json.contains(r#""rating_count":1520"#));
        assert!(json.contains(r#""related":["a.one","b.two"]"#));

        let back: FieldBag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bag);
    }

    #[test]
    fn test_field_value_map_roundtrip() {
        let mut cloud = BTreeMap::new();
        cloud.insert("sync".to_string(), "34".to_string());
        cloud.insert("offline".to_string(), "12".to_string());

        let mut bag = FieldBag::new();
        bag.insert("comment_terms".to_string(), FieldValue::Map(cloud.clone()));

        let json = serde_json::to_string(&bag).unwrap();
        let back: FieldBag = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("comment_terms"), Some(&FieldValue::Map(cloud)));
    }

    #[test]
    fn test_run_counts_absorb() {
        let mut total = RunCounts::default();
        total.absorb(&RunCounts {
            discovered: 10,
            inserted: 4,
            updated: 0,
            skipped: 1,
        });
        total.absorb(&RunCounts {
            discovered: 0,
            inserted: 0,
            updated: 7,
            skipped: 2,
        });

        assert_eq!(total.discovered, 10);
        assert_eq!(total.inserted, 4);
        assert_eq!(total.updated, 7);
        assert_eq!(total.skipped, 3);
    }
}
