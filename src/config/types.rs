use serde::Deserialize;

/// Main configuration structure for shelfcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub render: RenderConfig,
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub listing: Vec<ListingTarget>,
    pub sources: SourcesConfig,
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Render service (browser session) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Remote debugging endpoint of an already-running browser ("host:port").
    /// When absent, a local headless browser is launched instead.
    pub endpoint: Option<String>,

    /// Default bounded wait for a page's readiness marker (seconds)
    #[serde(rename = "navigation-timeout-secs")]
    pub navigation_timeout_secs: u64,

    /// Pause after each scroll or click, letting the page settle (milliseconds)
    #[serde(rename = "settle-millis")]
    pub settle_millis: u64,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Sleep after a detail-page navigation timeout before continuing (seconds)
    #[serde(rename = "timeout-cooldown-secs")]
    pub timeout_cooldown_secs: u64,

    /// Re-enrich records whose source timestamp is older than this many days.
    /// Absent selects the absence-only policy: enrich once, never revisit.
    #[serde(rename = "refresh-after-days")]
    pub refresh_after_days: Option<u32>,
}

/// A listing URL to discover identifiers from
#[derive(Debug, Clone, Deserialize)]
pub struct ListingTarget {
    /// Short name used in logs and run records
    pub name: String,

    /// The listing URL (one category/collection page)
    pub url: String,
}

/// Enabled enrichment sources; a source is enabled by being configured
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub storefront: Option<StorefrontSourceConfig>,
    pub profile: Option<ProfileSourceConfig>,
}

/// Storefront detail-page source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorefrontSourceConfig {
    /// Base URL of the storefront (detail and related-collection pages)
    #[serde(rename = "base-url")]
    pub base_url: String,
}

/// Third-party profile-site source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSourceConfig {
    /// Base URL of the profile site
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Readiness wait override for this site (seconds); it renders slowly,
    /// so the default navigation timeout is usually too tight.
    #[serde(rename = "wait-timeout-secs")]
    pub wait_timeout_secs: Option<u64>,
}
