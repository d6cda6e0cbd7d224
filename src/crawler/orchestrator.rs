//! Crawl orchestration
//!
//! Runs a complete pass over the configured surface: every listing is
//! traversed and written back first, then every enabled source enriches
//! whatever the staleness policy still selects. Both phases visit their
//! units in shuffled order so partial runs spread coverage instead of
//! always dying on the same prefix.
//!
//! The orchestrator owns one render session and one store for the whole
//! pass and threads them through the phases; nothing here talks to a
//! browser or a database behind the caller's back.

use crate::config::{Config, ListingTarget};
use crate::crawler::staleness::{self, StalenessPolicy};
use crate::crawler::{enrich, traversal};
use crate::render::{ChromiumSession, RenderSession};
use crate::sources::{enabled_sources, EnrichmentSource, StorefrontSource};
use crate::store::{open_store, RecordStore, RunCounts, RunKind};
use crate::{ConfigError, ShelfError};
use rand::seq::SliceRandom;
use std::path::Path;
use std::time::{Duration, Instant};

/// Drives discovery and enrichment over one session and one store
pub struct Orchestrator {
    config: Config,
    config_hash: String,
    store: Box<dyn RecordStore>,
    session: Box<dyn RenderSession>,
}

impl Orchestrator {
    /// Assembles an orchestrator from explicit parts
    pub fn new(
        config: Config,
        config_hash: String,
        store: Box<dyn RecordStore>,
        session: Box<dyn RenderSession>,
    ) -> Self {
        Self {
            config,
            config_hash,
            store,
            session,
        }
    }

    /// Wires the production store and browser session from the
    /// configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration file, recorded per run
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(ShelfError)` - Store or browser setup failed
    pub async fn from_config(config: Config, config_hash: String) -> crate::Result<Self> {
        let store = open_store(Path::new(&config.store.database_path))?;
        let session = ChromiumSession::from_config(&config.render).await?;
        Ok(Self::new(
            config,
            config_hash,
            Box::new(store),
            Box::new(session),
        ))
    }

    /// Runs a full pass: discovery, then every enabled source
    pub async fn run(&mut self) -> crate::Result<RunCounts> {
        let run_id = self
            .store
            .create_run(RunKind::Full, None, &self.config_hash)?;
        let started = Instant::now();
        tracing::info!("Starting full run {}", run_id);

        let mut counts = self.discover(run_id).await?;

        let sources = enabled_sources(&self.config.sources);
        for source in &sources {
            self.enrich_source(run_id, source.as_ref(), &mut counts)
                .await?;
        }

        self.finish_run(run_id, started, &counts)?;
        Ok(counts)
    }

    /// Runs the discovery phase only
    pub async fn discover_only(&mut self) -> crate::Result<RunCounts> {
        let run_id = self
            .store
            .create_run(RunKind::Discovery, None, &self.config_hash)?;
        let started = Instant::now();
        tracing::info!("Starting discovery run {}", run_id);

        let counts = self.discover(run_id).await?;

        self.finish_run(run_id, started, &counts)?;
        Ok(counts)
    }

    /// Runs the enrichment phase for one enabled source only
    pub async fn enrich_only(&mut self, source_name: &str) -> crate::Result<RunCounts> {
        let sources = enabled_sources(&self.config.sources);
        let source = sources
            .iter()
            .find(|source| source.name() == source_name)
            .ok_or_else(|| {
                ShelfError::Config(ConfigError::Validation(format!(
                    "no enabled source named '{source_name}'"
                )))
            })?;

        let run_id =
            self.store
                .create_run(RunKind::Enrichment, Some(source_name), &self.config_hash)?;
        let started = Instant::now();
        tracing::info!("Starting enrichment run {} for {}", run_id, source_name);

        let mut counts = RunCounts::default();
        self.enrich_source(run_id, source.as_ref(), &mut counts)
            .await?;

        self.finish_run(run_id, started, &counts)?;
        Ok(counts)
    }

    /// Traverses every configured listing in shuffled order, writing each
    /// identifier back as soon as it is known
    ///
    /// A listing that fails outright is logged and skipped; the ones that
    /// merely time out have already yielded their empty set inside the
    /// traversal.
    async fn discover(&mut self, run_id: i64) -> crate::Result<RunCounts> {
        let mut counts = RunCounts::default();
        let selectors = StorefrontSource::listing_selectors();
        let timeout = Duration::from_secs(self.config.render.navigation_timeout_secs);

        let mut targets: Vec<ListingTarget> = self.config.listing.clone();
        targets.shuffle(&mut rand::thread_rng());

        for target in &targets {
            tracing::info!("Listing {} ({})", target.name, target.url);

            let identifiers = match traversal::traverse(
                self.session.as_mut(),
                &target.url,
                &selectors,
                timeout,
            )
            .await
            {
                Ok(identifiers) => identifiers,
                Err(e) => {
                    counts.skipped += 1;
                    tracing::error!("Listing {} failed: {}", target.name, e);
                    continue;
                }
            };

            counts.discovered += identifiers.len() as u64;
            for identifier in &identifiers {
                if self.store.upsert_identifier(identifier, run_id)? {
                    counts.inserted += 1;
                }
            }
            self.store.update_run_counts(run_id, &counts)?;

            tracing::info!(
                "Listing {} yielded {} identifiers",
                target.name,
                identifiers.len()
            );
        }

        Ok(counts)
    }

    /// Enriches everything the staleness policy selects for one source,
    /// in shuffled order
    async fn enrich_source(
        &mut self,
        run_id: i64,
        source: &dyn EnrichmentSource,
        counts: &mut RunCounts,
    ) -> crate::Result<()> {
        let policy = StalenessPolicy::from_refresh_days(self.config.crawl.refresh_after_days);
        let mut pending = staleness::select_stale(self.store.as_ref(), source.name(), policy)?;
        pending.shuffle(&mut rand::thread_rng());

        tracing::info!(
            "{} identifiers pending enrichment on {}",
            pending.len(),
            source.name()
        );

        let cooldown = Duration::from_secs(self.config.crawl.timeout_cooldown_secs);
        let batch = enrich::enrich_all(
            self.session.as_mut(),
            self.store.as_mut(),
            source,
            &pending,
            cooldown,
        )
        .await;

        counts.absorb(&batch);
        self.store.update_run_counts(run_id, counts)?;
        Ok(())
    }

    /// Marks the run finished and logs the summary counts
    fn finish_run(&mut self, run_id: i64, started: Instant, counts: &RunCounts) -> crate::Result<()> {
        self.store.complete_run(run_id, counts)?;
        tracing::info!(
            "Run {} finished in {:?}: {} discovered, {} inserted, {} updated, {} skipped",
            run_id,
            started.elapsed(),
            counts.discovered,
            counts.inserted,
            counts.updated,
            counts.skipped
        );
        Ok(())
    }
}
