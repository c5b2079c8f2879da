//! Text-location and field-highlighting core for the document viewer.
//!
//! Given a PDF opened through a [`pdf_provider::PdfProvider`], this crate
//! indexes per-page text geometry, resolves field names and values to
//! on-page rectangles through a cascade of matching strategies, and drives
//! highlight overlays, scrolling and zoom for an embedding shell. The
//! entry point is [`ViewerSession`]; the individual pieces are usable on
//! their own.

pub mod error;
pub mod geometry;
pub mod highlight;
pub mod loader;
pub mod resolve;
pub mod session;
pub mod viewer;
pub mod viewport;

pub use error::{ViewerError, ViewerResult};
pub use geometry::{GeometryIndex, PageGeometry, Rect, TextRun};
pub use highlight::{
    Color, HighlightConfig, HighlightRenderer, HighlightStyle, OverlayOp, OverlaySurface,
};
pub use loader::{LoadTicket, LoadTracker, LoadedDocument};
pub use resolve::{normalize_query, FieldRef, MatchKind, MatchRect, Resolver, ResolverConfig};
pub use session::{MatchNavigator, SearchSession};
pub use viewer::ViewerSession;
pub use viewport::{
    scroll_to_show, PageScale, RescaleDebouncer, ScrollState, ViewportConfig, ViewportController,
};
