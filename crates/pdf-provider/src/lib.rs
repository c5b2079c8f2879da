//! PDF rendering and text-extraction boundary
//!
//! The viewer core never talks to a PDF library directly; it goes through the
//! [`PdfProvider`] trait defined here. Three backends are provided:
//!
//! - [`LopdfProvider`], the dependency-light default. Parses page geometry
//!   with lopdf, extracts text without glyph positions (positions are
//!   synthesized from a nominal layout), and rasterizes placeholder page
//!   images.
//! - `PdfiumProvider` (feature `pdfium`), real glyph geometry and rendering
//!   through the PDFium library.
//! - [`ScriptedProvider`], which serves caller-supplied page layouts and is
//!   used by tests that need exact, known text geometry.

use image::{ImageBuffer, Rgba};
use lopdf::Document;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "pdfium")]
mod pdfium;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumProvider;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Opaque handle to an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocHandle(u64);

impl DocHandle {
    pub fn raw(self) -> u64 {
        self.0
    }

    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Where the document bytes come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for DocumentSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for DocumentSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Intrinsic page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        // US Letter
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// One positioned run of extracted text.
///
/// Coordinates are PDF points with the origin at the bottom-left of the
/// page; `y` is the text baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid document handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported by this backend")]
    EncryptedUnsupported,
    #[error("text extraction failed: {0}")]
    TextExtraction(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// The rendering/extraction contract the viewer core depends on.
///
/// Page indices are zero-based at this boundary; the viewer core exposes
/// 1-based page numbers to its callers.
pub trait PdfProvider {
    fn open(&mut self, source: DocumentSource) -> ProviderResult<DocHandle>;
    fn page_count(&self, handle: DocHandle) -> ProviderResult<u32>;
    fn page_size(&self, handle: DocHandle, page_index: u32) -> ProviderResult<PageSize>;
    /// Extract positioned text for one page, in reading order.
    fn text_content(&self, handle: DocHandle, page_index: u32) -> ProviderResult<Vec<TextItem>>;
    /// Rasterize one page at `scale` display pixels per PDF point.
    fn render_page(&self, handle: DocHandle, page_index: u32, scale: f32)
        -> ProviderResult<RgbaImage>;
    fn close(&mut self, handle: DocHandle) -> ProviderResult<()>;
}

// --- lopdf-backed default backend -----------------------------------------

/// Nominal layout used when the backend has text but no glyph positions.
const SYNTH_MARGIN_PT: f32 = 72.0;
const SYNTH_LEADING_PT: f32 = 14.0;
const SYNTH_FONT_HEIGHT_PT: f32 = 12.0;
const SYNTH_CHAR_WIDTH_PT: f32 = 6.0;

#[derive(Debug, Clone)]
struct LoadedDoc {
    document: Document,
    page_sizes: Vec<PageSize>,
}

/// Default backend built on lopdf.
///
/// Page sizes come from each page's MediaBox. Text comes from
/// `Document::extract_text`, which yields content without glyph geometry, so
/// run positions are synthesized from a fixed line layout: callers get usable
/// (if approximate) rectangles instead of none at all. Rendering produces a
/// blank bordered page; real rasterization needs the `pdfium` backend.
#[derive(Debug, Default)]
pub struct LopdfProvider {
    next_handle: u64,
    docs: HashMap<DocHandle, LoadedDoc>,
}

impl LopdfProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn doc(&self, handle: DocHandle) -> ProviderResult<&LoadedDoc> {
        self.docs.get(&handle).ok_or(ProviderError::InvalidHandle(handle.raw()))
    }

    fn check_page(&self, handle: DocHandle, page_index: u32) -> ProviderResult<()> {
        let page_count = self.doc(handle)?.page_sizes.len() as u32;
        if page_index >= page_count {
            return Err(ProviderError::PageOutOfRange { page: page_index, page_count });
        }
        Ok(())
    }

    fn page_sizes_of(document: &Document) -> ProviderResult<Vec<PageSize>> {
        let pages = document.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let media_box = document
                .get_dictionary(object_id)
                .ok()
                .and_then(|dict| dict.get(b"MediaBox").ok())
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                });

            sizes.push(media_box.unwrap_or_default());
        }

        if sizes.is_empty() {
            return Err(ProviderError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }
}

impl PdfProvider for LopdfProvider {
    fn open(&mut self, source: DocumentSource) -> ProviderResult<DocHandle> {
        let bytes = match source {
            DocumentSource::Path(path) => fs::read(path)?,
            DocumentSource::Bytes(bytes) => bytes,
        };

        if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(ProviderError::EncryptedUnsupported);
        }

        let document = Document::load_mem(&bytes)?;
        let page_sizes = Self::page_sizes_of(&document)?;

        self.next_handle += 1;
        let handle = DocHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = page_sizes.len(), "opened document");
        self.docs.insert(handle, LoadedDoc { document, page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocHandle) -> ProviderResult<u32> {
        Ok(self.doc(handle)?.page_sizes.len() as u32)
    }

    fn page_size(&self, handle: DocHandle, page_index: u32) -> ProviderResult<PageSize> {
        self.check_page(handle, page_index)?;
        Ok(self.doc(handle)?.page_sizes[page_index as usize])
    }

    fn text_content(&self, handle: DocHandle, page_index: u32) -> ProviderResult<Vec<TextItem>> {
        self.check_page(handle, page_index)?;
        let loaded = self.doc(handle)?;
        let size = loaded.page_sizes[page_index as usize];

        // lopdf page numbers are 1-based.
        let text = loaded
            .document
            .extract_text(&[page_index + 1])
            .map_err(|error| ProviderError::TextExtraction(error.to_string()))?;

        let mut items = Vec::new();
        let mut baseline = size.height_pt - SYNTH_MARGIN_PT;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            items.push(TextItem {
                text: line.to_owned(),
                x: SYNTH_MARGIN_PT,
                y: baseline,
                width: SYNTH_CHAR_WIDTH_PT * line.chars().count() as f32,
                height: SYNTH_FONT_HEIGHT_PT,
            });
            baseline -= SYNTH_LEADING_PT;
        }

        Ok(items)
    }

    fn render_page(
        &self,
        handle: DocHandle,
        page_index: u32,
        scale: f32,
    ) -> ProviderResult<RgbaImage> {
        self.check_page(handle, page_index)?;
        let size = self.doc(handle)?.page_sizes[page_index as usize];
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let width = (size.width_pt * scale).round().max(1.0) as u32;
        let height = (size.height_pt * scale).round().max(1.0) as u32;

        Ok(placeholder_page(width, height))
    }

    fn close(&mut self, handle: DocHandle) -> ProviderResult<()> {
        self.docs
            .remove(&handle)
            .map(|_| ())
            .ok_or(ProviderError::InvalidHandle(handle.raw()))
    }
}

/// Blank white page with a one-pixel gray border.
fn placeholder_page(width: u32, height: u32) -> RgbaImage {
    const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BORDER: Rgba<u8> = Rgba([214, 214, 214, 255]);

    let mut image = RgbaImage::from_pixel(width, height, PAPER);
    if width < 3 || height < 3 {
        return image;
    }

    for x in 0..width {
        image.put_pixel(x, 0, BORDER);
        image.put_pixel(x, height - 1, BORDER);
    }
    for y in 0..height {
        image.put_pixel(0, y, BORDER);
        image.put_pixel(width - 1, y, BORDER);
    }

    image
}

// --- scripted backend ------------------------------------------------------

/// One page of a scripted document.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    pub size: PageSize,
    pub items: Vec<TextItem>,
    /// When set, `text_content` for this page fails, for exercising
    /// per-page extraction error isolation.
    pub fail_extraction: bool,
}

impl ScriptedPage {
    pub fn new(size: PageSize) -> Self {
        Self { size, items: Vec::new(), fail_extraction: false }
    }

    pub fn with_item(mut self, text: &str, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.items.push(TextItem { text: text.to_owned(), x, y, width, height });
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_extraction = true;
        self
    }
}

/// Backend that serves pre-staged page layouts.
///
/// `open` consumes the most recently staged document, ignoring the source
/// bytes entirely. Rendering produces the same placeholder pages as
/// [`LopdfProvider`].
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    next_handle: u64,
    staged: Vec<Vec<ScriptedPage>>,
    docs: HashMap<DocHandle, Vec<ScriptedPage>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a document to be returned by the next `open` call.
    pub fn stage(&mut self, pages: Vec<ScriptedPage>) {
        self.staged.push(pages);
    }

    fn doc(&self, handle: DocHandle) -> ProviderResult<&Vec<ScriptedPage>> {
        self.docs.get(&handle).ok_or(ProviderError::InvalidHandle(handle.raw()))
    }

    fn page(&self, handle: DocHandle, page_index: u32) -> ProviderResult<&ScriptedPage> {
        let pages = self.doc(handle)?;
        pages.get(page_index as usize).ok_or(ProviderError::PageOutOfRange {
            page: page_index,
            page_count: pages.len() as u32,
        })
    }
}

impl PdfProvider for ScriptedProvider {
    fn open(&mut self, _source: DocumentSource) -> ProviderResult<DocHandle> {
        let pages = self
            .staged
            .pop()
            .ok_or_else(|| ProviderError::Backend("no staged document".to_owned()))?;

        self.next_handle += 1;
        let handle = DocHandle(self.next_handle);
        self.docs.insert(handle, pages);
        Ok(handle)
    }

    fn page_count(&self, handle: DocHandle) -> ProviderResult<u32> {
        Ok(self.doc(handle)?.len() as u32)
    }

    fn page_size(&self, handle: DocHandle, page_index: u32) -> ProviderResult<PageSize> {
        Ok(self.page(handle, page_index)?.size)
    }

    fn text_content(&self, handle: DocHandle, page_index: u32) -> ProviderResult<Vec<TextItem>> {
        let page = self.page(handle, page_index)?;
        if page.fail_extraction {
            return Err(ProviderError::TextExtraction(format!(
                "scripted failure on page {page_index}"
            )));
        }
        Ok(page.items.clone())
    }

    fn render_page(
        &self,
        handle: DocHandle,
        page_index: u32,
        scale: f32,
    ) -> ProviderResult<RgbaImage> {
        let size = self.page(handle, page_index)?.size;
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let width = (size.width_pt * scale).round().max(1.0) as u32;
        let height = (size.height_pt * scale).round().max(1.0) as u32;
        Ok(placeholder_page(width, height))
    }

    fn close(&mut self, handle: DocHandle) -> ProviderResult<()> {
        self.docs
            .remove(&handle)
            .map(|_| ())
            .ok_or(ProviderError::InvalidHandle(handle.raw()))
    }
}
