//! Staleness selection
//!
//! Decides which identifiers a source still owes a visit. The default
//! treats absence as the only staleness signal: an identifier is stale
//! for a source until that source has stored its first enrichment, and
//! never again after that. Configuring a refresh window widens the
//! signal to age, re-selecting identifiers whose last enrichment has
//! fallen behind it.

use crate::store::{RecordStore, StoreResult};
use chrono::{Duration, Utc};

/// When an identifier counts as stale for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessPolicy {
    /// Stale only while no enrichment exists
    MissingOnly,
    /// Stale while no enrichment exists or the last one is older than
    /// the window
    OlderThan(Duration),
}

impl StalenessPolicy {
    /// Builds the policy from the configured refresh window
    pub fn from_refresh_days(refresh_after_days: Option<u32>) -> Self {
        match refresh_after_days {
            Some(days) => Self::OlderThan(Duration::days(i64::from(days))),
            None => Self::MissingOnly,
        }
    }
}

/// Identifiers `source` still has to visit under `policy`
///
/// Successful enrichment shrinks this set; failed attempts leave it
/// untouched, so a skipped identifier comes back on the next run.
pub fn select_stale(
    store: &dyn RecordStore,
    source: &str,
    policy: StalenessPolicy,
) -> StoreResult<Vec<String>> {
    match policy {
        StalenessPolicy::MissingOnly => store.identifiers_missing_timestamp(source),
        StalenessPolicy::OlderThan(window) => {
            let cutoff = Utc::now() - window;
            store.identifiers_lacking_fresh_enrichment(source, Some(cutoff))
        }
    }
}
