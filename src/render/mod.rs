//! Render service abstraction
//!
//! The listing and detail pages this crawler reads are assembled by
//! client-side script, so every query runs against a live rendered DOM
//! rather than fetched HTML. This module defines the `RenderSession`
//! trait that abstracts over the browser engine (currently Chromium via
//! chromiumoxide) plus the handle and error types shared by all
//! implementations.

pub mod chromium;
#[cfg(test)]
pub mod scripted;

pub use chromium::ChromiumSession;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a rendered page
#[derive(Debug, Error)]
pub enum RenderError {
    /// The page never produced the awaited element within the timeout.
    /// Callers treat this as a contained, per-URL failure.
    #[error("Navigation to {url} timed out after {waited:?}")]
    NavigationTimeout { url: String, waited: Duration },

    /// The browser session died underneath us. The session has already
    /// been replaced; the caller moves on to its next navigation.
    #[error("Browser session lost: {0}")]
    SessionLost(String),

    /// Any other browser-side failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// The remote debugging endpoint could not be reached or understood
    #[error("Debugging endpoint error: {0}")]
    Endpoint(String),
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;

/// A handle to one element in the current page
///
/// Handles are positional: they name the nth match of a selector and stay
/// valid only while the page that produced them is loaded. A fresh
/// `find_all` after any mutation re-derives them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub selector: String,
    pub index: usize,
}

impl ElementHandle {
    pub fn new(selector: &str, index: usize) -> Self {
        Self {
            selector: selector.to_string(),
            index,
        }
    }
}

/// One live browser page the crawler drives
///
/// Methods take `&mut self`: each session is owned by exactly one crawl
/// flow at a time, and navigation invalidates all outstanding handles.
#[async_trait]
pub trait RenderSession: Send {
    /// Navigates to `url` and waits until `wait_for` matches a laid-out
    /// element, polling up to `timeout`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The page is loaded and the element is present
    /// * `Err(RenderError::NavigationTimeout)` - The element never appeared
    async fn navigate(&mut self, url: &str, wait_for: &str, timeout: Duration) -> RenderResult<()>;

    /// Finds every element matching `selector` in the current page
    ///
    /// An empty result is data, not an error.
    async fn find_all(&mut self, selector: &str) -> RenderResult<Vec<ElementHandle>>;

    /// Reads an attribute off an element, `None` when unset
    async fn attribute(&mut self, element: &ElementHandle, name: &str)
        -> RenderResult<Option<String>>;

    /// Reads the visible text of an element, `None` when the handle no
    /// longer resolves
    async fn text(&mut self, element: &ElementHandle) -> RenderResult<Option<String>>;

    /// Reads one computed CSS property of an element
    async fn computed_style(&mut self, element: &ElementHandle, property: &str)
        -> RenderResult<String>;

    /// Dispatches a click to an element without scrolling it into view
    async fn click(&mut self, element: &ElementHandle) -> RenderResult<()>;

    /// Scrolls the window to the bottom of the document and lets the page
    /// settle
    async fn scroll_to_bottom(&mut self) -> RenderResult<()>;

    /// Whether an element's box currently intersects the viewport
    async fn is_in_viewport(&mut self, element: &ElementHandle) -> RenderResult<bool>;
}
