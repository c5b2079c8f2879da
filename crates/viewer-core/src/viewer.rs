//! Viewer session: the composition root
//!
//! Ties a [`PdfProvider`] to the viewport, resolver, navigator and
//! highlight renderer, and sequences the operations an embedding shell
//! calls: open a document, search, step through matches, zoom, resize.
//! Geometry is rebuilt whenever the effective scale changes, and the
//! current query is re-resolved against the fresh index so highlights and
//! scroll targets stay aligned with what is on screen.

use std::time::Instant;

use crate::error::{ViewerError, ViewerResult};
use crate::geometry::GeometryIndex;
use crate::highlight::{HighlightRenderer, OverlayOp, OverlaySurface};
use crate::loader::{load_document, LoadTracker, LoadedDocument};
use crate::resolve::{normalize_query, FieldRef, MatchRect, Resolver};
use crate::session::{MatchNavigator, SearchSession};
use crate::viewport::{
    scroll_to_show, RescaleDebouncer, ScrollState, ViewportConfig, ViewportController,
};
use pdf_provider::{DocumentSource, PdfProvider, RgbaImage};

/// One open document plus everything needed to search and display it.
///
/// Single-threaded by design; an embedding shell that loads documents off
/// the UI thread uses [`LoadTracker`] tickets to discard superseded
/// results before applying them here.
pub struct ViewerSession<P: PdfProvider> {
    provider: P,
    viewport: ViewportController,
    resolver: Resolver,
    navigator: MatchNavigator,
    renderer: HighlightRenderer,
    tracker: LoadTracker,
    debouncer: RescaleDebouncer,
    scroll: ScrollState,
    document: Option<LoadedDocument>,
    last_field: Option<FieldRef>,
}

impl<P: PdfProvider> ViewerSession<P> {
    pub fn new(provider: P) -> Self {
        Self::with_viewport_config(provider, ViewportConfig::default())
    }

    pub fn with_viewport_config(provider: P, config: ViewportConfig) -> Self {
        let debouncer = RescaleDebouncer::new(config.resize_debounce);
        Self {
            provider,
            viewport: ViewportController::new(config),
            resolver: Resolver::default(),
            navigator: MatchNavigator::new(),
            renderer: HighlightRenderer::default(),
            tracker: LoadTracker::new(),
            debouncer,
            scroll: ScrollState::default(),
            document: None,
            last_field: None,
        }
    }

    // --- document lifecycle -------------------------------------------

    /// Open `source`, replacing any open document. Returns the page count.
    ///
    /// The previous document and search state are dropped before the open
    /// starts; on failure the session ends up with no document rather than
    /// a half-loaded one.
    pub fn open(&mut self, source: DocumentSource) -> ViewerResult<u32> {
        let ticket = self.tracker.begin();
        self.viewport.set_loading(true);
        self.close_current();
        self.navigator.clear();
        self.last_field = None;
        self.scroll = ScrollState::default();

        let result = load_document(&mut self.provider, source, &self.viewport);
        self.viewport.set_loading(false);

        match result {
            Ok(loaded) => {
                if !self.tracker.is_current(ticket) {
                    if let Err(error) = self.provider.close(loaded.handle) {
                        tracing::warn!(%error, "failed to close superseded document");
                    }
                    return Err(ViewerError::DocumentLoad(
                        "load superseded by a newer open".to_owned(),
                    ));
                }
                let page_count = loaded.page_count;
                self.viewport.set_page_count(page_count);
                self.document = Some(loaded);
                Ok(page_count)
            }
            Err(error) => {
                self.viewport.set_page_count(0);
                Err(error)
            }
        }
    }

    /// Close the open document, if any, and reset search state.
    pub fn close(&mut self) {
        self.close_current();
        self.navigator.clear();
        self.last_field = None;
        self.viewport.set_page_count(0);
        self.scroll = ScrollState::default();
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn index(&self) -> Option<&GeometryIndex> {
        self.document.as_ref().map(|doc| &doc.index)
    }

    // --- search -------------------------------------------------------

    /// Resolve `field` and make the result the current session. The first
    /// match, if any, becomes active and the scroll target moves to it.
    ///
    /// With no document open this installs an idle session and matches
    /// nothing.
    pub fn search(&mut self, field: FieldRef) -> &SearchSession {
        let session = match self.document.as_ref() {
            None => SearchSession::empty(),
            Some(doc) => {
                let matches = self.resolver.resolve(&field, &doc.index);
                SearchSession::new(session_query(&field), matches)
            }
        };

        self.last_field = self.document.is_some().then_some(field);
        self.navigator.replace(session);
        self.scroll_to_active();
        self.navigator.session()
    }

    pub fn session(&self) -> &SearchSession {
        self.navigator.session()
    }

    /// Advance to the next match (wrapping) and scroll to it.
    pub fn next_match(&mut self) -> Option<MatchRect> {
        self.navigator.next();
        self.scroll_to_active();
        self.navigator.session().active_match().cloned()
    }

    /// Step back to the previous match (wrapping) and scroll to it.
    pub fn prev_match(&mut self) -> Option<MatchRect> {
        self.navigator.prev();
        self.scroll_to_active();
        self.navigator.session().active_match().cloned()
    }

    /// Drop the current search. The next overlay plan repaints any pages
    /// that carried highlights.
    pub fn clear_search(&mut self) {
        self.navigator.clear();
        self.last_field = None;
    }

    /// Register the handler invoked whenever the search is cleared.
    pub fn set_clear_handler(&mut self, handler: impl FnMut() + 'static) {
        self.navigator.set_clear_handler(handler);
    }

    // --- overlays -----------------------------------------------------

    /// Overlay plan for the current session; see
    /// [`HighlightRenderer::plan`].
    pub fn overlay_plan(&mut self) -> Vec<OverlayOp> {
        self.renderer.plan(self.navigator.session())
    }

    /// Plan and execute overlays against `surface` in one step.
    pub fn render_overlays<S: OverlaySurface>(&mut self, surface: &mut S) -> ViewerResult<()> {
        let session = self.navigator.session().clone();
        self.renderer.render_to(surface, &session)
    }

    // --- viewport -----------------------------------------------------

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn scroll(&self) -> ScrollState {
        self.scroll
    }

    pub fn zoom_in(&mut self) -> ViewerResult<f32> {
        self.viewport.zoom_in();
        self.rebuild_geometry()?;
        Ok(self.viewport.zoom())
    }

    pub fn zoom_out(&mut self) -> ViewerResult<f32> {
        self.viewport.zoom_out();
        self.rebuild_geometry()?;
        Ok(self.viewport.zoom())
    }

    pub fn reset_zoom(&mut self) -> ViewerResult<f32> {
        self.viewport.reset_zoom();
        self.rebuild_geometry()?;
        Ok(self.viewport.zoom())
    }

    /// Record a container resize. The rebuild is debounced; call
    /// [`poll_resize`](Self::poll_resize) from the shell's tick to apply
    /// the settled size.
    pub fn resize(&mut self, width: f32, height: f32, now: Instant) {
        self.debouncer.request(width, height, now);
    }

    /// Apply a settled resize, if one is due. Returns whether geometry was
    /// rebuilt.
    pub fn poll_resize(&mut self, now: Instant) -> ViewerResult<bool> {
        match self.debouncer.poll(now) {
            Some((width, height)) => {
                self.viewport.set_container(width, height);
                self.rebuild_geometry()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn go_to_next_page(&mut self) -> u32 {
        self.viewport.go_to_next_page()
    }

    pub fn go_to_prev_page(&mut self) -> u32 {
        self.viewport.go_to_prev_page()
    }

    pub fn finish_navigation(&mut self) {
        self.viewport.finish_navigation();
    }

    // --- rendering ----------------------------------------------------

    /// Rasterize a page (1-based) at the scale it is currently laid out at.
    pub fn render_page(&self, page_number: u32) -> ViewerResult<RgbaImage> {
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| ViewerError::DocumentLoad("no document open".to_owned()))?;

        let page_index = page_number
            .checked_sub(1)
            .filter(|index| *index < doc.page_count)
            .ok_or_else(|| ViewerError::PageRender {
                page: page_number,
                reason: "page out of range".to_owned(),
            })?;

        let scale = doc
            .scales
            .get(page_index as usize)
            .copied()
            .unwrap_or_default();

        self.provider
            .render_page(doc.handle, page_index, scale.render_scale)
            .map_err(|error| ViewerError::PageRender {
                page: page_number,
                reason: error.to_string(),
            })
    }

    // --- internals ----------------------------------------------------

    fn close_current(&mut self) {
        if let Some(doc) = self.document.take() {
            if let Err(error) = self.provider.close(doc.handle) {
                tracing::warn!(%error, "failed to close previous document");
            }
        }
    }

    fn scroll_to_active(&mut self) {
        let Some(hit) = self.navigator.session().active_match() else {
            return;
        };
        let Some(doc) = self.document.as_ref() else {
            return;
        };

        // Match rectangles are page-local; shift into the coordinate space
        // of the scroll container, where pages stack vertically.
        let target = hit.rect.translated(0.0, page_offset(doc, hit.page, self.viewport.config()));
        let (width, height) = self.viewport.container();
        self.scroll = scroll_to_show(self.scroll, width, height, target, self.viewport.config());
    }

    /// Re-layout and re-index the document at the current viewport state,
    /// then re-resolve the current query against the fresh geometry. The
    /// active match position is carried over, clamped to the new list.
    fn rebuild_geometry(&mut self) -> ViewerResult<()> {
        let Some(doc) = self.document.as_mut() else {
            return Ok(());
        };

        doc.scales = self.viewport.layout(&doc.page_sizes);
        doc.index = GeometryIndex::build(&self.provider, doc.handle, &doc.scales)?;

        if let Some(field) = self.last_field.as_ref() {
            let preferred = self.navigator.session().active_index();
            let matches = self.resolver.resolve(field, &doc.index);
            let mut session = SearchSession::new(session_query(field), matches);
            session.clamp_active(preferred);
            self.navigator.replace(session);
        }

        self.scroll_to_active();
        Ok(())
    }
}

impl<P: PdfProvider> std::fmt::Debug for ViewerSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("viewport", &self.viewport)
            .field("session", self.navigator.session())
            .field("has_document", &self.document.is_some())
            .finish()
    }
}

/// Top edge of `page_number` (1-based) within the scroll container: the
/// display heights of all preceding pages plus the inter-page gaps.
fn page_offset(doc: &LoadedDocument, page_number: u32, config: &ViewportConfig) -> f32 {
    let preceding = page_number.saturating_sub(1) as usize;
    let mut offset = 0.0;
    for index in 0..preceding.min(doc.page_sizes.len()) {
        let (_, height_pt) = doc.page_sizes[index];
        let scale = doc.scales.get(index).copied().unwrap_or_default();
        offset += height_pt * scale.display_scale + config.page_gap_px;
    }
    offset
}

fn session_query(field: &FieldRef) -> String {
    match field {
        FieldRef::Text(raw) => normalize_query(raw),
        FieldRef::Location { .. } => String::new(),
    }
}
