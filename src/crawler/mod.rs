//! Crawl engine
//!
//! This module contains the crawl logic itself, including:
//! - Listing pagination traversal and identifier harvest
//! - Staleness selection (what each source still owes a visit)
//! - The per-identifier enrichment loop with failure containment
//! - Overall run orchestration and summary counts

pub mod enrich;
pub mod orchestrator;
pub mod staleness;
pub mod traversal;

pub use enrich::enrich_all;
pub use orchestrator::Orchestrator;
pub use staleness::{select_stale, StalenessPolicy};
pub use traversal::{drain_to_footer, traverse};

use crate::config::Config;
use crate::store::RunCounts;

/// Runs a complete crawl pass
///
/// This is the main entry point for a full run. It will:
/// 1. Open the record store
/// 2. Launch or attach the browser session
/// 3. Traverse every configured listing and write identifiers back
/// 4. Enrich stale identifiers on every enabled source
/// 5. Record the run and its summary counts
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file
///
/// # Returns
///
/// * `Ok(RunCounts)` - Summary counts of the completed run
/// * `Err(ShelfError)` - The run could not start or the store failed
pub async fn crawl(config: Config, config_hash: String) -> crate::Result<RunCounts> {
    let mut orchestrator = Orchestrator::from_config(config, config_hash).await?;
    orchestrator.run().await
}
