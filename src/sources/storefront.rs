//! Storefront detail-page source
//!
//! Reads the store's own detail page for an identifier and, last of all,
//! follows the related collection and harvests its cards. The related
//! navigation replaces the detail page in the session, which is why it
//! must come after every scalar field.

use crate::config::StorefrontSourceConfig;
use crate::crawler::traversal;
use crate::render::{RenderError, RenderResult, RenderSession};
use crate::sources::{first_text, EnrichmentSource, ListingSelectors};
use crate::store::{FieldBag, FieldValue};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Wait bound for storefront pages, listing and detail alike
const DETAIL_WAIT_SECS: u64 = 10;

/// The five histogram buckets, highest stars first
const RATING_BUCKETS: [(&str, &str); 5] = [
    ("5", "five"),
    ("4", "four"),
    ("3", "three"),
    ("2", "two"),
    ("1", "one"),
];

/// The store's own detail pages
pub struct StorefrontSource {
    base_url: String,
}

impl StorefrontSource {
    pub fn new(config: &StorefrontSourceConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Geometry of the store's listing pages, used by discovery and by
    /// the related-collection harvest
    pub fn listing_selectors() -> ListingSelectors {
        ListingSelectors {
            ready: ".card-list",
            card: ".card[data-docid]",
            identifier_attribute: "data-docid",
            load_more: ".show-more",
            footer: ".page-footer",
        }
    }

    fn related_url(&self, identifier: &str) -> String {
        format!("{}/collection/related?id={}", self.base_url, identifier)
    }

    /// Harvests the related collection for an identifier
    ///
    /// The collection loads everything by scrolling alone, so a plain
    /// drain to the footer suffices. A timeout costs only this field;
    /// the scalars already extracted still merge.
    async fn related_identifiers(
        &self,
        session: &mut dyn RenderSession,
        identifier: &str,
    ) -> RenderResult<BTreeSet<String>> {
        let url = self.related_url(identifier);
        let selectors = Self::listing_selectors();

        match session.navigate(&url, selectors.ready, self.wait_timeout()).await {
            Ok(()) => {}
            Err(RenderError::NavigationTimeout { .. }) => {
                tracing::warn!("Related collection for {} not ready, storing none", identifier);
                return Ok(BTreeSet::new());
            }
            Err(e) => return Err(e),
        }

        traversal::drain_to_footer(session, selectors.footer).await?;
        traversal::collect_identifiers(session, &selectors).await
    }
}

#[async_trait]
impl EnrichmentSource for StorefrontSource {
    fn name(&self) -> &'static str {
        "storefront"
    }

    fn detail_url(&self, identifier: &str) -> String {
        format!("{}/detail?id={}", self.base_url, identifier)
    }

    fn ready_selector(&self) -> &'static str {
        ".detail-title"
    }

    fn wait_timeout(&self) -> Duration {
        Duration::from_secs(DETAIL_WAIT_SECS)
    }

    async fn extract(
        &self,
        session: &mut dyn RenderSession,
        identifier: &str,
    ) -> RenderResult<FieldBag> {
        let mut fields = FieldBag::new();

        for (key, selector) in [
            ("title", ".detail-title"),
            ("author", ".detail-author"),
            ("category", ".detail-category"),
            ("description", ".detail-description"),
            ("recent_changes", ".whats-new"),
            ("installs", ".install-band"),
            ("version", ".current-version"),
            ("content_rating", ".content-rating"),
        ] {
            let text = first_text(session, selector).await?;
            fields.insert(key.to_string(), text.into());
        }

        let price_text = first_text(session, ".price-tag").await?;
        fields.insert("price".to_string(), parse_price(&price_text).into());

        let rating_text = first_text(session, ".rating-value").await?;
        fields.insert("rating".to_string(), parse_float(&rating_text).into());

        let count_text = first_text(session, ".rating-count").await?;
        fields.insert("rating_count".to_string(), parse_count(&count_text).into());

        let mut histogram = BTreeMap::new();
        for (stars, bucket) in RATING_BUCKETS {
            let selector = format!(".rating-bar.{bucket} .bar-count");
            histogram.insert(stars.to_string(), first_text(session, &selector).await?);
        }
        fields.insert(
            "ratings_by_star".to_string(),
            FieldValue::Map(histogram),
        );

        // Leaves the detail page, so nothing can be read after this
        let related = self.related_identifiers(session, identifier).await?;
        fields.insert("related".to_string(), FieldValue::IdSet(related));

        Ok(fields)
    }
}

/// Parses a currency amount, tolerating a `$` prefix and thousands
/// separators; anything unparseable counts as free
fn parse_price(text: &str) -> f64 {
    let cleaned = text.trim().trim_start_matches('$').replace(',', "");
    cleaned.parse().unwrap_or_else(|_| {
        if !cleaned.is_empty() {
            tracing::debug!("Unparseable price {:?}, storing 0", text);
        }
        0.0
    })
}

fn parse_float(text: &str) -> f64 {
    let cleaned = text.trim();
    cleaned.parse().unwrap_or_else(|_| {
        if !cleaned.is_empty() {
            tracing::debug!("Unparseable rating {:?}, storing 0", text);
        }
        0.0
    })
}

fn parse_count(text: &str) -> i64 {
    let cleaned = text.trim().replace(',', "");
    cleaned.parse().unwrap_or_else(|_| {
        if !cleaned.is_empty() {
            tracing::debug!("Unparseable count {:?}, storing 0", text);
        }
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scripted::{DetailScript, ScriptedSession};

    fn source() -> StorefrontSource {
        StorefrontSource::new(&StorefrontSourceConfig {
            base_url: "https://store.example/".to_string(),
        })
    }

    #[test]
    fn test_urls() {
        let source = source();
        assert_eq!(
            source.detail_url("com.acme.planner"),
            "https://store.example/detail?id=com.acme.planner"
        );
        assert_eq!(
            source.related_url("com.acme.planner"),
            "https://store.example/collection/related?id=com.acme.planner"
        );
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$1,299.99"), 1299.99);
        assert_eq!(parse_price("0.99"), 0.99);
        assert_eq!(parse_price(" $4.50 "), 4.5);
        assert_eq!(parse_price("Free"), 0.0);
        assert_eq!(parse_price(""), 0.0);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1,520"), 1520);
        assert_eq!(parse_count("12"), 12);
        assert_eq!(parse_count("lots"), 0);
    }

    fn full_detail_script() -> DetailScript {
        DetailScript::new()
            .text(".detail-title", "Paper Planner")
            .text(".detail-author", "Acme")
            .text(".detail-category", "Productivity")
            .text(".detail-description", "Plan on paper, sync anywhere.")
            .text(".whats-new", "Bug fixes")
            .text(".install-band", "1,000,000+")
            .text(".current-version", "2.4.1")
            .text(".content-rating", "Everyone")
            .text(".price-tag", "$2.99")
            .text(".rating-value", "4.5")
            .text(".rating-count", "1,520")
            .text(".rating-bar.five .bar-count", "900")
            .text(".rating-bar.four .bar-count", "400")
            .text(".rating-bar.three .bar-count", "120")
            .text(".rating-bar.two .bar-count", "60")
            .text(".rating-bar.one .bar-count", "40")
    }

    #[tokio::test]
    async fn test_extract_full_detail_page() {
        let source = source();
        let mut session = ScriptedSession::new(&StorefrontSource::listing_selectors());
        let detail_url = source.detail_url("com.acme.planner");
        let related_url = source.related_url("com.acme.planner");

        session.script_detail(&detail_url, full_detail_script());
        session.script_listing(&related_url, vec![vec!["com.other.notes", "com.third.todo"]]);

        session
            .navigate(&detail_url, source.ready_selector(), source.wait_timeout())
            .await
            .unwrap();
        let fields = source
            .extract(&mut session, "com.acme.planner")
            .await
            .unwrap();

        assert_eq!(fields.get("title"), Some(&"Paper Planner".into()));
        assert_eq!(fields.get("price"), Some(&FieldValue::Float(2.99)));
        assert_eq!(fields.get("rating"), Some(&FieldValue::Float(4.5)));
        assert_eq!(fields.get("rating_count"), Some(&FieldValue::Integer(1520)));

        let histogram = match fields.get("ratings_by_star") {
            Some(FieldValue::Map(map)) => map.clone(),
            other => panic!("unexpected histogram shape: {other:?}"),
        };
        assert_eq!(histogram.get("5").map(String::as_str), Some("900"));
        assert_eq!(histogram.get("1").map(String::as_str), Some("40"));

        let related = match fields.get("related") {
            Some(FieldValue::IdSet(set)) => set.clone(),
            other => panic!("unexpected related shape: {other:?}"),
        };
        assert!(related.contains("com.other.notes"));
        assert!(related.contains("com.third.todo"));
    }

    #[tokio::test]
    async fn test_extract_missing_fields_become_empty() {
        let source = source();
        let mut session = ScriptedSession::new(&StorefrontSource::listing_selectors());
        let detail_url = source.detail_url("com.bare.page");
        let related_url = source.related_url("com.bare.page");

        // Only a title; everything else is absent
        session.script_detail(&detail_url, DetailScript::new().text(".detail-title", "Bare"));
        session.script_timeout(&related_url);

        session
            .navigate(&detail_url, source.ready_selector(), source.wait_timeout())
            .await
            .unwrap();
        let fields = source.extract(&mut session, "com.bare.page").await.unwrap();

        assert_eq!(fields.get("title"), Some(&"Bare".into()));
        assert_eq!(fields.get("author"), Some(&"".into()));
        assert_eq!(fields.get("price"), Some(&FieldValue::Float(0.0)));
        assert_eq!(fields.get("rating_count"), Some(&FieldValue::Integer(0)));
        // The related collection timed out; the field is present but empty
        assert_eq!(
            fields.get("related"),
            Some(&FieldValue::IdSet(BTreeSet::new()))
        );
    }
}
