//! Enrichment sources
//!
//! A source knows one site that documents store entries: how to reach the
//! detail page for an identifier, when that page counts as loaded, and
//! which fields to read off it. Sources own their selectors and their
//! field group; the crawler treats them uniformly through the
//! [`EnrichmentSource`] trait and stores each group under the source's
//! name without inspecting it.

mod profile;
mod storefront;

pub use profile::ProfileSource;
pub use storefront::StorefrontSource;

use crate::config::SourcesConfig;
use crate::render::{RenderResult, RenderSession};
use crate::store::FieldBag;
use async_trait::async_trait;
use std::time::Duration;

/// The selectors a listing traversal needs
///
/// The traversal engine is selector-agnostic; the source that owns the
/// listing layout supplies these.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    /// Marks the listing as loaded
    pub ready: &'static str,
    /// One listing card
    pub card: &'static str,
    /// Attribute on a card carrying the identifier
    pub identifier_attribute: &'static str,
    /// The paging control that reveals more cards
    pub load_more: &'static str,
    /// The last element of a fully revealed listing
    pub footer: &'static str,
}

/// One site worth of per-identifier fields
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// Stable name this source's field group is stored under
    fn name(&self) -> &'static str;

    /// Detail page URL for an identifier
    fn detail_url(&self, identifier: &str) -> String;

    /// Selector whose appearance marks the detail page as loaded
    fn ready_selector(&self) -> &'static str;

    /// How long navigation may wait for the detail page
    fn wait_timeout(&self) -> Duration;

    /// Reads this source's field group off the already-loaded detail page
    ///
    /// A field whose element is missing yields its empty substitute, never
    /// an error; only session-level failures propagate.
    async fn extract(
        &self,
        session: &mut dyn RenderSession,
        identifier: &str,
    ) -> RenderResult<FieldBag>;
}

/// Builds the sources enabled in the configuration
pub fn enabled_sources(config: &SourcesConfig) -> Vec<Box<dyn EnrichmentSource>> {
    let mut sources: Vec<Box<dyn EnrichmentSource>> = Vec::new();
    if let Some(storefront) = &config.storefront {
        sources.push(Box::new(StorefrontSource::new(storefront)));
    }
    if let Some(profile) = &config.profile {
        sources.push(Box::new(ProfileSource::new(profile)));
    }
    sources
}

/// Trimmed text of the first match, empty when nothing matches
pub(crate) async fn first_text(
    session: &mut dyn RenderSession,
    selector: &str,
) -> RenderResult<String> {
    let handles = session.find_all(selector).await?;
    match handles.first() {
        Some(handle) => Ok(session
            .text(handle)
            .await?
            .map(|t| t.trim().to_string())
            .unwrap_or_default()),
        None => Ok(String::new()),
    }
}

/// Trimmed texts of every match, in page order
///
/// A match with no text yields an empty entry, keeping positions aligned
/// with the element list.
pub(crate) async fn texts_of(
    session: &mut dyn RenderSession,
    selector: &str,
) -> RenderResult<Vec<String>> {
    let handles = session.find_all(selector).await?;
    let mut texts = Vec::with_capacity(handles.len());
    for handle in &handles {
        let text = session.text(handle).await?;
        texts.push(text.map(|t| t.trim().to_string()).unwrap_or_default());
    }
    Ok(texts)
}
