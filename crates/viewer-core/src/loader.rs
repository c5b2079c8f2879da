//! Document loading with stale-result protection
//!
//! Opening a document is a multi-step sequence (open, measure pages, lay
//! out scales, index text) and the user can start another open before the
//! first finishes. Each load takes a ticket from a [`LoadTracker`];
//! results are applied only if the ticket is still current, so a slow open
//! can never clobber the state of a newer one.

use crate::error::{ViewerError, ViewerResult};
use crate::geometry::GeometryIndex;
use crate::viewport::{PageScale, ViewportController};
use pdf_provider::{DocHandle, DocumentSource, PdfProvider};

/// Monotonic load generation counter.
#[derive(Debug, Default)]
pub struct LoadTracker {
    generation: u64,
}

/// Proof of which load a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new load, invalidating every outstanding ticket.
    pub fn begin(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket(self.generation)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.generation
    }
}

/// Everything derived from one successful open, applied atomically.
#[derive(Debug)]
pub struct LoadedDocument {
    pub handle: DocHandle,
    pub page_count: u32,
    /// Intrinsic page sizes in PDF points, page order.
    pub page_sizes: Vec<(f32, f32)>,
    /// Scales the document was laid out and indexed at.
    pub scales: Vec<PageScale>,
    pub index: GeometryIndex,
}

/// Open `source`, measure every page, lay it out against the viewport and
/// build the text index.
///
/// Fails without side effects on the caller's state: the handle is closed
/// again if any later step fails, so a failed load leaves nothing open in
/// the provider.
pub fn load_document<P: PdfProvider>(
    provider: &mut P,
    source: DocumentSource,
    viewport: &ViewportController,
) -> ViewerResult<LoadedDocument> {
    let handle = provider
        .open(source)
        .map_err(|error| ViewerError::DocumentLoad(error.to_string()))?;

    match load_opened(provider, handle, viewport) {
        Ok(loaded) => Ok(loaded),
        Err(error) => {
            if let Err(close_error) = provider.close(handle) {
                tracing::warn!(%close_error, "failed to close document after load error");
            }
            Err(error)
        }
    }
}

fn load_opened<P: PdfProvider>(
    provider: &mut P,
    handle: DocHandle,
    viewport: &ViewportController,
) -> ViewerResult<LoadedDocument> {
    let page_count = provider
        .page_count(handle)
        .map_err(|error| ViewerError::DocumentLoad(error.to_string()))?;

    let mut page_sizes = Vec::with_capacity(page_count as usize);
    for page_index in 0..page_count {
        let size = provider
            .page_size(handle, page_index)
            .map_err(|error| ViewerError::DocumentLoad(error.to_string()))?;
        page_sizes.push((size.width_pt, size.height_pt));
    }

    let scales = viewport.layout(&page_sizes);
    let index = GeometryIndex::build(provider, handle, &scales)?;

    tracing::info!(pages = page_count, "document loaded");
    Ok(LoadedDocument { handle, page_count, page_sizes, scales, index })
}
