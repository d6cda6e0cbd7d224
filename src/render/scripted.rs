//! Scripted render session for tests
//!
//! Models the physical behavior of a paged listing instead of replaying
//! canned call sequences: content reveals batch by batch as the load-more
//! control is clicked, the footer only enters the viewport once the page
//! has stopped growing, and scrolling is what arms the control. Detail
//! pages are plain selector lookup tables.

use crate::render::{ElementHandle, RenderError, RenderResult, RenderSession};
use crate::sources::ListingSelectors;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// What one URL does when navigated to
pub enum ScriptedPage {
    /// The readiness wait never completes
    TimesOut,
    /// The browser dies on arrival
    LosesSession,
    /// A listing revealing one batch per load-more click; the first batch
    /// is present at load. With `control_lingers` the control stays
    /// rendered after the final batch and further clicks reveal nothing.
    Listing {
        batches: Vec<Vec<String>>,
        control_lingers: bool,
    },
    /// A static page described by selector lookup tables
    Detail(DetailScript),
}

/// Selector lookup tables for a scripted detail page
#[derive(Default)]
pub struct DetailScript {
    texts: BTreeMap<String, Vec<Option<String>>>,
    attributes: BTreeMap<(String, String), Vec<Option<String>>>,
}

impl DetailScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one more match for `selector` with the given text
    pub fn text(mut self, selector: &str, value: &str) -> Self {
        self.texts
            .entry(selector.to_string())
            .or_default()
            .push(Some(value.to_string()));
        self
    }

    /// Appends one more match for `selector` that renders no text
    pub fn textless(mut self, selector: &str) -> Self {
        self.texts
            .entry(selector.to_string())
            .or_default()
            .push(None);
        self
    }

    /// Appends matches for `selector` with the given texts
    pub fn texts(mut self, selector: &str, values: &[&str]) -> Self {
        for value in values {
            self = self.text(selector, value);
        }
        self
    }

    /// Appends one more match for `selector` carrying an attribute value
    pub fn attr(mut self, selector: &str, name: &str, value: Option<&str>) -> Self {
        self.attributes
            .entry((selector.to_string(), name.to_string()))
            .or_default()
            .push(value.map(|v| v.to_string()));
        self
    }

    fn match_count(&self, selector: &str) -> usize {
        let by_text = self
            .texts
            .get(selector)
            .map(|values| values.len())
            .unwrap_or(0);
        let by_attr = self
            .attributes
            .iter()
            .filter(|((sel, _), _)| sel == selector)
            .map(|(_, values)| values.len())
            .max()
            .unwrap_or(0);
        by_text.max(by_attr)
    }
}

/// In-memory render session driven by per-URL scripts
pub struct ScriptedSession {
    selectors: ListingSelectors,
    pages: BTreeMap<String, ScriptedPage>,
    current: Option<String>,
    /// Number of listing batches currently revealed
    revealed: usize,
    at_bottom: bool,
    /// Every URL handed to navigate, in order
    pub visited: Vec<String>,
    /// Every element clicked, in order
    pub clicks: Vec<ElementHandle>,
    /// Number of scroll_to_bottom calls
    pub scrolls: usize,
}

impl ScriptedSession {
    pub fn new(selectors: &ListingSelectors) -> Self {
        Self {
            selectors: selectors.clone(),
            pages: BTreeMap::new(),
            current: None,
            revealed: 0,
            at_bottom: false,
            visited: Vec::new(),
            clicks: Vec::new(),
            scrolls: 0,
        }
    }

    /// Scripts `url` as a listing with the given identifier batches
    pub fn script_listing(&mut self, url: &str, batches: Vec<Vec<&str>>) {
        self.insert_listing(url, batches, false);
    }

    /// Scripts `url` as a listing whose load-more control stays rendered
    /// after the final batch; clicking it then reveals nothing
    pub fn script_lingering_listing(&mut self, url: &str, batches: Vec<Vec<&str>>) {
        self.insert_listing(url, batches, true);
    }

    fn insert_listing(&mut self, url: &str, batches: Vec<Vec<&str>>, control_lingers: bool) {
        let batches = batches
            .into_iter()
            .map(|batch| batch.into_iter().map(|id| id.to_string()).collect())
            .collect();
        self.pages.insert(
            url.to_string(),
            ScriptedPage::Listing {
                batches,
                control_lingers,
            },
        );
    }

    /// Scripts `url` as a static detail page
    pub fn script_detail(&mut self, url: &str, script: DetailScript) {
        self.pages
            .insert(url.to_string(), ScriptedPage::Detail(script));
    }

    /// Scripts `url` to never become ready
    pub fn script_timeout(&mut self, url: &str) {
        self.pages.insert(url.to_string(), ScriptedPage::TimesOut);
    }

    /// Scripts `url` to kill the browser session
    pub fn script_session_loss(&mut self, url: &str) {
        self.pages
            .insert(url.to_string(), ScriptedPage::LosesSession);
    }

    fn current_page(&self) -> Option<&ScriptedPage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }

    fn listing_batches(&self) -> Option<&Vec<Vec<String>>> {
        match self.current_page() {
            Some(ScriptedPage::Listing { batches, .. }) => Some(batches),
            _ => None,
        }
    }

    /// Identifiers of every revealed card, in page order
    fn revealed_ids(&self) -> Vec<String> {
        self.listing_batches()
            .map(|batches| {
                batches
                    .iter()
                    .take(self.revealed)
                    .flatten()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The load-more control shows at the bottom of a still-growing
    /// listing, and at the bottom indefinitely when scripted to linger
    fn load_more_visible(&self) -> bool {
        match self.current_page() {
            Some(ScriptedPage::Listing {
                batches,
                control_lingers,
            }) => self.at_bottom && (self.revealed < batches.len() || *control_lingers),
            _ => false,
        }
    }

    /// The footer can only be reached once all batches are revealed
    fn footer_in_view(&self) -> bool {
        match self.listing_batches() {
            Some(batches) => self.at_bottom && self.revealed == batches.len(),
            None => true,
        }
    }
}

#[async_trait]
impl RenderSession for ScriptedSession {
    async fn navigate(&mut self, url: &str, _wait_for: &str, timeout: Duration) -> RenderResult<()> {
        self.visited.push(url.to_string());

        match self.pages.get(url) {
            None => Err(RenderError::Browser(format!("no scripted page for {url}"))),
            Some(ScriptedPage::TimesOut) => Err(RenderError::NavigationTimeout {
                url: url.to_string(),
                waited: timeout,
            }),
            Some(ScriptedPage::LosesSession) => {
                Err(RenderError::SessionLost("scripted session loss".to_string()))
            }
            Some(ScriptedPage::Listing { batches, .. }) => {
                self.current = Some(url.to_string());
                self.revealed = batches.len().min(1);
                self.at_bottom = false;
                Ok(())
            }
            Some(ScriptedPage::Detail(_)) => {
                self.current = Some(url.to_string());
                self.revealed = 0;
                self.at_bottom = false;
                Ok(())
            }
        }
    }

    async fn find_all(&mut self, selector: &str) -> RenderResult<Vec<ElementHandle>> {
        let count = match self.current_page() {
            Some(ScriptedPage::Listing { .. }) => {
                if selector == self.selectors.card {
                    self.revealed_ids().len()
                } else if selector == self.selectors.load_more
                    || selector == self.selectors.footer
                {
                    1
                } else {
                    0
                }
            }
            Some(ScriptedPage::Detail(script)) => script.match_count(selector),
            _ => 0,
        };

        Ok((0..count)
            .map(|index| ElementHandle::new(selector, index))
            .collect())
    }

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> RenderResult<Option<String>> {
        match self.current_page() {
            Some(ScriptedPage::Listing { .. }) => {
                if element.selector == self.selectors.card
                    && name == self.selectors.identifier_attribute
                {
                    Ok(self.revealed_ids().get(element.index).cloned())
                } else {
                    Ok(None)
                }
            }
            Some(ScriptedPage::Detail(script)) => Ok(script
                .attributes
                .get(&(element.selector.clone(), name.to_string()))
                .and_then(|values| values.get(element.index))
                .cloned()
                .flatten()),
            _ => Ok(None),
        }
    }

    async fn text(&mut self, element: &ElementHandle) -> RenderResult<Option<String>> {
        match self.current_page() {
            Some(ScriptedPage::Detail(script)) => Ok(script
                .texts
                .get(&element.selector)
                .and_then(|values| values.get(element.index))
                .cloned()
                .flatten()),
            _ => Ok(None),
        }
    }

    async fn computed_style(
        &mut self,
        element: &ElementHandle,
        property: &str,
    ) -> RenderResult<String> {
        if property == "display" && element.selector == self.selectors.load_more {
            if self.load_more_visible() {
                return Ok("block".to_string());
            }
            return Ok("none".to_string());
        }
        Ok(String::new())
    }

    async fn click(&mut self, element: &ElementHandle) -> RenderResult<()> {
        self.clicks.push(element.clone());

        // A click only lands while the control is actually showing, and
        // only reveals while batches remain hidden; the freshly appended
        // batch pushes the bottom away again
        let hidden_remaining = self
            .listing_batches()
            .map(|batches| self.revealed < batches.len())
            .unwrap_or(false);
        if element.selector == self.selectors.load_more
            && self.load_more_visible()
            && hidden_remaining
        {
            self.revealed += 1;
            self.at_bottom = false;
        }
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> RenderResult<()> {
        self.scrolls += 1;
        self.at_bottom = true;
        // Yield so a traversal that stops making progress can be timed
        // out by tests instead of spinning the executor
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn is_in_viewport(&mut self, element: &ElementHandle) -> RenderResult<bool> {
        if element.selector == self.selectors.footer {
            return Ok(self.footer_in_view());
        }
        Ok(true)
    }
}
