//! Viewer error taxonomy
//!
//! Only document-level failures propagate to callers. Per-page render and
//! extraction failures are isolated where they occur: the page gets a
//! placeholder or an empty text-run list and its siblings continue. Search
//! itself never fails; an empty match list is a normal result.

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// The rendering provider could not open or parse the document.
    /// No partial document state is retained after this.
    #[error("failed to load document: {0}")]
    DocumentLoad(String),

    /// A single page failed to rasterize.
    #[error("page {page} failed to render: {reason}")]
    PageRender { page: u32, reason: String },

    /// Text geometry extraction failed for a single page.
    #[error("page {page} text extraction failed: {reason}")]
    PageExtraction { page: u32, reason: String },

    /// An overlay surface rejected a draw operation.
    #[error("overlay surface error: {0}")]
    Surface(String),
}

pub type ViewerResult<T> = Result<T, ViewerError>;
