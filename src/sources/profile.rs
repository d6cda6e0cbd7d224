//! Third-party profile-page source
//!
//! The profile site aggregates analytics the store itself never shows:
//! overall ranking, binary size, embedded libraries, app age, comment
//! term clouds, and requested permissions. It renders slowly, hence the
//! longer wait bound.

use crate::config::ProfileSourceConfig;
use crate::render::{RenderResult, RenderSession};
use crate::sources::{first_text, texts_of, EnrichmentSource};
use crate::store::{FieldBag, FieldValue};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default wait bound; the profile site routinely takes most of it
const DEFAULT_WAIT_SECS: u64 = 60;

/// The three comment term clouds the profile page renders
const TERM_CLOUDS: [(&str, &str); 3] = [
    ("comment_terms_all", ".cloud.all .term"),
    ("comment_terms_positive", ".cloud.positive .term"),
    ("comment_terms_negative", ".cloud.negative .term"),
];

/// Third-party profile pages
pub struct ProfileSource {
    base_url: String,
    wait: Duration,
}

impl ProfileSource {
    pub fn new(config: &ProfileSourceConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            wait: Duration::from_secs(config.wait_timeout_secs.unwrap_or(DEFAULT_WAIT_SECS)),
        }
    }
}

#[async_trait]
impl EnrichmentSource for ProfileSource {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn detail_url(&self, identifier: &str) -> String {
        format!("{}/app/{}", self.base_url, identifier)
    }

    fn ready_selector(&self) -> &'static str {
        ".profile-header"
    }

    fn wait_timeout(&self) -> Duration {
        self.wait
    }

    async fn extract(
        &self,
        session: &mut dyn RenderSession,
        _identifier: &str,
    ) -> RenderResult<FieldBag> {
        let mut fields = FieldBag::new();

        let rank_text = first_text(session, ".overall-rank").await?;
        fields.insert("ranking".to_string(), parse_rank(&rank_text).into());

        let size_text = first_text(session, ".binary-size").await?;
        fields.insert("binary_size".to_string(), size_text.into());

        let library_text = first_text(session, ".library-count").await?;
        fields.insert(
            "library_count".to_string(),
            parse_count(&library_text).into(),
        );

        let age_text = first_text(session, ".app-age").await?;
        fields.insert("app_age".to_string(), age_text.into());

        for (key, selector) in TERM_CLOUDS {
            let cloud = term_cloud(session, selector).await?;
            fields.insert(key.to_string(), FieldValue::Map(cloud));
        }

        fields.insert(
            "permissions".to_string(),
            FieldValue::Map(permission_map(session).await?),
        );

        Ok(fields)
    }
}

/// Reads a term cloud: element text is the term, `data-weight` its weight
async fn term_cloud(
    session: &mut dyn RenderSession,
    selector: &str,
) -> RenderResult<BTreeMap<String, String>> {
    let handles = session.find_all(selector).await?;
    let mut cloud = BTreeMap::new();

    for handle in &handles {
        let term = match session.text(handle).await? {
            Some(text) => text.trim().to_string(),
            None => continue,
        };
        if term.is_empty() {
            continue;
        }
        let weight = session.attribute(handle, "data-weight").await?.unwrap_or_default();
        cloud.insert(term, weight);
    }
    Ok(cloud)
}

/// Pairs the permission name and detail columns by element position
///
/// The page renders them as two parallel lists; a detail with missing
/// text keeps its slot and leaves that permission with an empty
/// description.
async fn permission_map(
    session: &mut dyn RenderSession,
) -> RenderResult<BTreeMap<String, String>> {
    let names = texts_of(session, ".permission .perm-name").await?;
    let details = texts_of(session, ".permission .perm-detail").await?;

    let mut permissions = BTreeMap::new();
    for (index, name) in names.into_iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        permissions.insert(name, details.get(index).cloned().unwrap_or_default());
    }
    Ok(permissions)
}

/// Parses a rank like "#42" or "1,203"; unparseable ranks count as zero
fn parse_rank(text: &str) -> i64 {
    parse_count(text.trim().trim_start_matches('#'))
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
