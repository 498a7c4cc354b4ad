//! Citation navigation: jump the viewer to a page an answer cites.
//!
//! Best effort only. A citation may point past the rendered pages (render
//! still streaming, or the backend and renderer disagree on page count); such
//! citations do nothing.

use crate::render::Viewer;
use std::sync::Arc;
use tracing::debug;

/// Presentation-layer hook that performs the actual smooth scroll.
pub trait ScrollTarget: Send + Sync {
    fn scroll_into_view(&self, bounds_key: &str);
}

/// Scroll target for headless sessions.
pub struct NoopScroll;

impl ScrollTarget for NoopScroll {
    fn scroll_into_view(&self, _bounds_key: &str) {}
}

#[derive(Clone)]
pub struct CitationNavigator {
    target: Arc<dyn ScrollTarget>,
}

impl CitationNavigator {
    pub fn new(target: Arc<dyn ScrollTarget>) -> Self {
        Self { target }
    }

    /// Request one scroll to `page` if it is rendered. Returns whether a
    /// request was issued.
    pub fn navigate(&self, viewer: &Viewer, page: u32) -> bool {
        match self.resolve(viewer, page) {
            Some(key) => {
                self.scroll_to(&key);
                true
            }
            None => false,
        }
    }

    /// The `bounds_key` of `page` if it has been rendered.
    pub fn resolve(&self, viewer: &Viewer, page: u32) -> Option<String> {
        let key = viewer.find(page).map(|rendered| rendered.bounds_key.clone());
        if key.is_none() {
            debug!(page, rendered = viewer.len(), "citation target not rendered");
        }
        key
    }

    pub fn scroll_to(&self, bounds_key: &str) {
        self.target.scroll_into_view(bounds_key);
    }
}
