//! Per-page text geometry index
//!
//! Built once per loaded document at the active render scale and rebuilt
//! whenever the scale changes (zoom, container resize), since the viewport
//! transform baked into each page depends on it. Extraction failures are
//! isolated per page: a failing page contributes an empty run list and the
//! rest of the document stays searchable.

use crate::viewport::PageScale;
use pdf_provider::{DocHandle, PageSize, PdfProvider, TextItem};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle. Interpretation of the coordinate space is up to
/// the producer; [`MatchRect`](crate::resolve::MatchRect) rectangles are in
/// display-pixel space with the origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Equivalent rectangle with `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    pub fn width(self) -> f32 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(self) -> f32 {
        (self.y2 - self.y1).abs()
    }

    pub fn center(self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x1: self.x1 * factor,
            y1: self.y1 * factor,
            x2: self.x2 * factor,
            y2: self.y2 * factor,
        }
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self { x1: self.x1 + dx, y1: self.y1 + dy, x2: self.x2 + dx, y2: self.y2 + dy }
    }
}

/// One contiguous piece of extracted text with its PDF-space geometry.
///
/// `x`/`y` are PDF points with the origin at the bottom-left of the page;
/// `y` is the text baseline. Immutable once extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<TextItem> for TextRun {
    fn from(item: TextItem) -> Self {
        Self { text: item.text, x: item.x, y: item.y, width: item.width, height: item.height }
    }
}

/// Geometry for a single page at the scales it was indexed under.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    /// 1-based page number.
    pub page_number: u32,
    pub width_pt: f32,
    pub height_pt: f32,
    /// Internal raster resolution, display pixels per PDF point before the
    /// CSS-style correction.
    pub render_scale: f32,
    /// On-screen size multiplier. May differ from `render_scale` when the
    /// surface is rendered oversampled for crispness.
    pub display_scale: f32,
    /// Text runs in document order.
    pub runs: Vec<TextRun>,
    /// All run text joined with single spaces, for page-level matching.
    pub page_text: String,
}

impl PageGeometry {
    /// Map a PDF-space rectangle (bottom-up) to display pixels (top-down).
    ///
    /// Two steps, both required: the page viewport transform at the render
    /// scale, then the `display_scale / render_scale` correction for
    /// surfaces whose internal resolution differs from their on-screen size.
    /// Skipping the correction misaligns highlights whenever the device
    /// pixel ratio or a container-driven rescale is in play.
    pub fn to_display_rect(&self, pdf_rect: Rect) -> Rect {
        let rendered = Rect {
            x1: pdf_rect.x1 * self.render_scale,
            y1: (self.height_pt - pdf_rect.y2) * self.render_scale,
            x2: pdf_rect.x2 * self.render_scale,
            y2: (self.height_pt - pdf_rect.y1) * self.render_scale,
        };

        rendered.scaled(self.display_correction()).normalized()
    }

    /// Factor correcting render-space pixels to on-screen pixels.
    pub fn display_correction(&self) -> f32 {
        if self.render_scale > 0.0 {
            self.display_scale / self.render_scale
        } else {
            1.0
        }
    }

    /// Whole page in display-pixel space.
    pub fn display_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width_pt * self.display_scale, self.height_pt * self.display_scale)
    }

    /// Whole-run bounding box in display-pixel space.
    pub fn run_display_rect(&self, run: &TextRun) -> Rect {
        self.to_display_rect(Rect::new(run.x, run.y - run.height, run.x + run.width, run.y))
    }
}

/// Text geometry for every page of a loaded document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryIndex {
    pages: Vec<PageGeometry>,
}

impl GeometryIndex {
    /// Index every page of `handle`, in page order.
    ///
    /// `layout` supplies the render/display scale per page (missing entries
    /// fall back to 1.0/1.0). A page whose extraction fails is logged and
    /// indexed with no runs; only provider-level failures before the first
    /// page abort the build.
    pub fn build<P: PdfProvider>(
        provider: &P,
        handle: DocHandle,
        layout: &[PageScale],
    ) -> crate::error::ViewerResult<Self> {
        let page_count = provider
            .page_count(handle)
            .map_err(|error| crate::error::ViewerError::DocumentLoad(error.to_string()))?;

        let mut pages = Vec::with_capacity(page_count as usize);

        for page_index in 0..page_count {
            let page_number = page_index + 1;
            let scale = layout.get(page_index as usize).copied().unwrap_or_default();

            let size = match provider.page_size(handle, page_index) {
                Ok(size) => size,
                Err(error) => {
                    tracing::warn!(page = page_number, %error, "page size unavailable");
                    PageSize::default()
                }
            };

            let runs: Vec<TextRun> = match provider.text_content(handle, page_index) {
                Ok(items) => items.into_iter().map(TextRun::from).collect(),
                Err(error) => {
                    tracing::warn!(page = page_number, %error, "text extraction failed");
                    Vec::new()
                }
            };

            let page_text =
                runs.iter().map(|run| run.text.as_str()).collect::<Vec<_>>().join(" ");

            pages.push(PageGeometry {
                page_number,
                width_pt: size.width_pt,
                height_pt: size.height_pt,
                render_scale: scale.render_scale,
                display_scale: scale.display_scale,
                runs,
                page_text,
            });
        }

        tracing::debug!(pages = pages.len(), "geometry index built");
        Ok(Self { pages })
    }

    pub fn pages(&self) -> &[PageGeometry] {
        &self.pages
    }

    pub fn page(&self, page_number: u32) -> Option<&PageGeometry> {
        page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    #[cfg(test)]
    pub(crate) fn from_pages(pages: Vec<PageGeometry>) -> Self {
        Self { pages }
    }
}
