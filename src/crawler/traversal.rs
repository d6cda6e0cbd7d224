//! Listing pagination traversal
//!
//! Storefront listings render incrementally: scrolling surfaces a
//! load-more control near the bottom, clicking it appends a batch of
//! cards, and the page footer only becomes reachable once every batch is
//! in. The traversal drives that cycle to exhaustion and then reads the
//! card identifiers off the fully revealed page.
//!
//! Termination is anchored to the footer, not to a fixed click count:
//! the loop ends only with the footer in view and the control either
//! hidden or clicked one final time without dislodging the footer, so a
//! listing is never abandoned while more content is one click away.

use crate::render::{ElementHandle, RenderError, RenderResult, RenderSession};
use crate::sources::ListingSelectors;
use std::collections::BTreeSet;
use std::time::Duration;

/// Where the traversal currently is in the reveal cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrollPhase {
    /// Scrolling down to surface either the control or the footer
    Scrolling,
    /// The control is showing and must be clicked before anything else
    LoadMoreVisible,
    /// Footer in view; confirm exhaustion before finishing
    NearFooter,
}

/// Traverses one listing to exhaustion and returns its identifiers
///
/// # Arguments
///
/// * `session` - The render session to drive
/// * `url` - The listing URL
/// * `selectors` - Listing geometry, owned by the source being listed
/// * `timeout` - Bound on the initial navigation wait
///
/// # Returns
///
/// The deduplicated identifier set of every card the listing revealed.
/// A navigation timeout is contained here: the listing yields an empty
/// set and the caller moves on. All other failures propagate.
pub async fn traverse(
    session: &mut dyn RenderSession,
    url: &str,
    selectors: &ListingSelectors,
    timeout: Duration,
) -> RenderResult<BTreeSet<String>> {
    match session.navigate(url, selectors.ready, timeout).await {
        Ok(()) => {}
        Err(RenderError::NavigationTimeout { url, waited }) => {
            tracing::warn!(
                "Listing {} not ready after {:?}, yielding no identifiers",
                url,
                waited
            );
            return Ok(BTreeSet::new());
        }
        Err(e) => return Err(e),
    }

    let mut phase = ScrollPhase::Scrolling;
    loop {
        match phase {
            ScrollPhase::Scrolling => {
                session.scroll_to_bottom().await?;
                if footer_in_view(session, selectors).await? {
                    phase = ScrollPhase::NearFooter;
                } else if control_visible(session, selectors).await? {
                    phase = ScrollPhase::LoadMoreVisible;
                }
            }
            ScrollPhase::LoadMoreVisible => {
                let control = require_control(session, selectors).await?;
                session.click(&control).await?;
                session.scroll_to_bottom().await?;
                phase = ScrollPhase::Scrolling;
            }
            ScrollPhase::NearFooter => {
                // The control can surface or stay rendered with the
                // footer already in view. Click it once more; only a
                // footer still in view after that means the listing is
                // spent.
                if !control_visible(session, selectors).await? {
                    break;
                }
                let control = require_control(session, selectors).await?;
                session.click(&control).await?;
                session.scroll_to_bottom().await?;
                if footer_in_view(session, selectors).await? {
                    break;
                }
                phase = ScrollPhase::Scrolling;
            }
        }
    }

    drain_to_footer(session, selectors.footer).await?;
    collect_identifiers(session, selectors).await
}

/// Scrolls until the footer sits inside the viewport
///
/// Extraction happens against the fully scrolled page. A page without the
/// footer counts as already drained.
pub async fn drain_to_footer(
    session: &mut dyn RenderSession,
    footer_selector: &str,
) -> RenderResult<()> {
    let footer = match session.find_all(footer_selector).await?.into_iter().next() {
        Some(footer) => footer,
        None => return Ok(()),
    };

    while !session.is_in_viewport(&footer).await? {
        session.scroll_to_bottom().await?;
    }
    Ok(())
}

/// Reads the identifier attribute off every card currently in the page
///
/// Cards without the attribute, or with an empty one, are dropped.
pub(crate) async fn collect_identifiers(
    session: &mut dyn RenderSession,
    selectors: &ListingSelectors,
) -> RenderResult<BTreeSet<String>> {
    let cards = session.find_all(selectors.card).await?;

    let mut identifiers = BTreeSet::new();
    for card in &cards {
        if let Some(id) = session
            .attribute(card, selectors.identifier_attribute)
            .await?
        {
            if !id.is_empty() {
                identifiers.insert(id);
            }
        }
    }
    Ok(identifiers)
}

/// Whether the load-more control is currently showing
///
/// The control stays in the DOM the whole time; visibility is its
/// computed display property.
async fn control_visible(
    session: &mut dyn RenderSession,
    selectors: &ListingSelectors,
) -> RenderResult<bool> {
    let handles = session.find_all(selectors.load_more).await?;
    match handles.first() {
        Some(control) => Ok(session.computed_style(control, "display").await? == "block"),
        None => Ok(false),
    }
}

/// Whether the footer currently sits inside the viewport
async fn footer_in_view(
    session: &mut dyn RenderSession,
    selectors: &ListingSelectors,
) -> RenderResult<bool> {
    let handles = session.find_all(selectors.footer).await?;
    match handles.first() {
        Some(footer) => session.is_in_viewport(footer).await,
        None => Err(RenderError::Browser(format!(
            "listing has no footer matching {}",
            selectors.footer
        ))),
    }
}

/// The control handle, required because it was just observed visible
async fn require_control(
    session: &mut dyn RenderSession,
    selectors: &ListingSelectors,
) -> RenderResult<ElementHandle> {
    session
        .find_all(selectors.load_more)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            RenderError::Browser(format!(
                "load-more control {} vanished between visibility check and click",
                selectors.load_more
            ))
        })
}
