//! Enrichment loop
//!
//! Visits the detail page of each selected identifier on one source,
//! extracts that source's field group, stamps the crawl time, and merges
//! the group into the store. The write lands before the next identifier
//! is touched, so an interrupted run keeps everything finished so far.
//!
//! Failures stay inside the identifier they hit: a navigation timeout
//! costs a cooldown and the identifier, a lost or erroring session costs
//! just the identifier, and a rejected merge is logged and dropped. No
//! error leaves the loop; a single stuck page never ends the batch.

use crate::render::{RenderError, RenderSession};
use crate::sources::EnrichmentSource;
use crate::store::{RecordStore, RunCounts, StoreError};
use crate::ShelfError;
use chrono::Utc;
use std::time::Duration;

/// Enriches each identifier via `source`, returning the summary counts
///
/// # Arguments
///
/// * `session` - The render session to drive
/// * `store` - Where merged field groups land
/// * `source` - The source being crawled
/// * `identifiers` - Identifiers to visit, already shuffled by the caller
/// * `timeout_cooldown` - Pause after a navigation timeout before moving on
pub async fn enrich_all(
    session: &mut dyn RenderSession,
    store: &mut dyn RecordStore,
    source: &dyn EnrichmentSource,
    identifiers: &[String],
    timeout_cooldown: Duration,
) -> RunCounts {
    let mut counts = RunCounts::default();

    for identifier in identifiers {
        tracing::info!("Enriching {} via {}", identifier, source.name());

        match enrich_one(session, store, source, identifier).await {
            Ok(()) => counts.updated += 1,
            Err(ShelfError::Render(RenderError::NavigationTimeout { url, waited })) => {
                counts.skipped += 1;
                tracing::warn!(
                    "Detail page {} not ready after {:?}; cooling down for {:?}",
                    url,
                    waited,
                    timeout_cooldown
                );
                tokio::time::sleep(timeout_cooldown).await;
            }
            Err(ShelfError::Store(StoreError::UnknownIdentifier(id))) => {
                counts.skipped += 1;
                tracing::error!(
                    "Merge rejected for {}: identifier was never discovered",
                    id
                );
            }
            Err(e) => {
                counts.skipped += 1;
                tracing::warn!(
                    "Skipping {} on {}: {}",
                    source.detail_url(identifier),
                    source.name(),
                    e
                );
            }
        }
    }

    counts
}

/// One identifier end to end: navigate, extract, stamp, merge
async fn enrich_one(
    session: &mut dyn RenderSession,
    store: &mut dyn RecordStore,
    source: &dyn EnrichmentSource,
    identifier: &str,
) -> crate::Result<()> {
    let url = source.detail_url(identifier);
    session
        .navigate(&url, source.ready_selector(), source.wait_timeout())
        .await?;

    let fields = source.extract(session, identifier).await?;
    store.merge_enrichment(identifier, source.name(), &fields, Utc::now())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileSourceConfig;
    use crate::render::scripted::{DetailScript, ScriptedSession};
    use crate::sources::{ProfileSource, StorefrontSource};
    use crate::store::{RunKind, SqliteStore};

    fn profile_source() -> ProfileSource {
        ProfileSource::new(&ProfileSourceConfig {
            base_url: "https://profile.example".to_string(),
            wait_timeout_secs: Some(1),
        })
    }

    fn session() -> ScriptedSession {
        ScriptedSession::new(&StorefrontSource::listing_selectors())
    }

    fn store_with_ids(ids: &[&str]) -> SqliteStore {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let run_id = store.create_run(RunKind::Enrichment, Some("profile"), "h").unwrap();
        for id in ids {
            store.upsert_identifier(id, run_id).unwrap();
        }
        store
    }

    fn minimal_profile_page(rank: &str) -> DetailScript {
        DetailScript::new().text(".overall-rank", rank)
    }

    #[tokio::test]
    async fn test_enrich_merges_each_identifier() {
        let source = profile_source();
        let mut session = session();
        let mut store = store_with_ids(&["com.a", "com.b"]);

        session.script_detail(&source.detail_url("com.a"), minimal_profile_page("#1"));
        session.script_detail(&source.detail_url("com.b"), minimal_profile_page("#2"));

        let ids = vec!["com.a".to_string(), "com.b".to_string()];
        let counts = enrich_all(
            &mut session,
            &mut store,
            &source,
            &ids,
            Duration::ZERO,
        )
        .await;

        assert_eq!(counts.updated, 2);
        assert_eq!(counts.skipped, 0);
        assert!(store.get_enrichment("com.a", "profile").unwrap().is_some());
        assert!(store.get_enrichment("com.b", "profile").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_timeout_contained_to_one_identifier() {
        let source = profile_source();
        let mut session = session();
        let mut store = store_with_ids(&["com.a", "com.slow", "com.c"]);

        session.script_detail(&source.detail_url("com.a"), minimal_profile_page("#1"));
        session.script_timeout(&source.detail_url("com.slow"));
        session.script_detail(&source.detail_url("com.c"), minimal_profile_page("#3"));

        let ids = vec![
            "com.a".to_string(),
            "com.slow".to_string(),
            "com.c".to_string(),
        ];
        let counts = enrich_all(
            &mut session,
            &mut store,
            &source,
            &ids,
            Duration::ZERO,
        )
        .await;

        // The identifiers around the timeout still landed
        assert_eq!(counts.updated, 2);
        assert_eq!(counts.skipped, 1);
        assert!(store.get_enrichment("com.a", "profile").unwrap().is_some());
        assert!(store
            .get_enrichment("com.slow", "profile")
            .unwrap()
            .is_none());
        assert!(store.get_enrichment("com.c", "profile").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_session_loss_skips_and_continues() {
        let source = profile_source();
        let mut session = session();
        let mut store = store_with_ids(&["com.doomed", "com.b"]);

        session.script_session_loss(&source.detail_url("com.doomed"));
        session.script_detail(&source.detail_url("com.b"), minimal_profile_page("#2"));

        let ids = vec!["com.doomed".to_string(), "com.b".to_string()];
        let counts = enrich_all(
            &mut session,
            &mut store,
            &source,
            &ids,
            Duration::ZERO,
        )
        .await;

        assert_eq!(counts.updated, 1);
        assert_eq!(counts.skipped, 1);
        assert!(store.get_enrichment("com.b", "profile").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undiscovered_identifier_rejected() {
        let source = profile_source();
        let mut session = session();
        // The store never saw this identifier
        let mut store = store_with_ids(&[]);

        session.script_detail(&source.detail_url("com.ghost"), minimal_profile_page("#9"));

        let ids = vec!["com.ghost".to_string()];
        let counts = enrich_all(
            &mut session,
            &mut store,
            &source,
            &ids,
            Duration::ZERO,
        )
        .await;

        assert_eq!(counts.updated, 0);
        assert_eq!(counts.skipped, 1);
        assert_eq!(store.count_enriched("profile").unwrap(), 0);
    }
}
