//! PDFium-backed provider (feature `pdfium`)
//!
//! Real glyph geometry and rasterization. Characters are grouped into
//! whitespace-delimited runs; run coordinates stay in PDF space (bottom-up,
//! points) as required by the [`PdfProvider`] contract.

use crate::{
    DocHandle, DocumentSource, PageSize, PdfProvider, ProviderError, ProviderResult, RgbaImage,
    TextItem,
};
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::path::Path;

pub struct PdfiumProvider {
    next_handle: u64,
    docs: HashMap<DocHandle, PdfDocument<'static>>,
}

impl PdfiumProvider {
    pub fn new() -> Self {
        Self { next_handle: 0, docs: HashMap::new() }
    }

    /// Bind the PDFium library, preferring a copy next to the executable.
    fn bind() -> ProviderResult<Pdfium> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(Path::to_path_buf));

        if let Some(dir) = exe_dir {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            {
                return Ok(Pdfium::new(bindings));
            }
        }

        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|error| ProviderError::Backend(error.to_string()))?;

        Ok(Pdfium::new(bindings))
    }

    fn doc(&self, handle: DocHandle) -> ProviderResult<&PdfDocument<'static>> {
        self.docs.get(&handle).ok_or(ProviderError::InvalidHandle(handle.raw()))
    }

    fn page(&self, handle: DocHandle, page_index: u32) -> ProviderResult<PdfPage<'_>> {
        let document = self.doc(handle)?;
        let page_count = document.pages().len() as u32;
        document.pages().get(page_index as u16).map_err(|_| ProviderError::PageOutOfRange {
            page: page_index,
            page_count,
        })
    }
}

impl Default for PdfiumProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProvider for PdfiumProvider {
    fn open(&mut self, source: DocumentSource) -> ProviderResult<DocHandle> {
        // The document borrows the Pdfium binding and the source bytes for
        // 'static, so both are leaked for the lifetime of the process.
        let pdfium: &'static Pdfium = Box::leak(Box::new(Self::bind()?));

        let document = match source {
            DocumentSource::Path(path) => pdfium
                .load_pdf_from_file(&path, None)
                .map_err(|error| ProviderError::Backend(error.to_string()))?,
            DocumentSource::Bytes(bytes) => {
                let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
                pdfium
                    .load_pdf_from_byte_slice(bytes, None)
                    .map_err(|error| ProviderError::Backend(error.to_string()))?
            }
        };

        self.next_handle += 1;
        let handle = DocHandle::from_raw(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = document.pages().len(), "opened document");
        self.docs.insert(handle, document);

        Ok(handle)
    }

    fn page_count(&self, handle: DocHandle) -> ProviderResult<u32> {
        Ok(self.doc(handle)?.pages().len() as u32)
    }

    fn page_size(&self, handle: DocHandle, page_index: u32) -> ProviderResult<PageSize> {
        let page = self.page(handle, page_index)?;
        Ok(PageSize { width_pt: page.width().value, height_pt: page.height().value })
    }

    fn text_content(&self, handle: DocHandle, page_index: u32) -> ProviderResult<Vec<TextItem>> {
        let page = self.page(handle, page_index)?;
        let text_page = page
            .text()
            .map_err(|error| ProviderError::TextExtraction(error.to_string()))?;

        let mut items = Vec::new();
        let mut run = RunBuilder::default();

        for ch in text_page.chars().iter() {
            let Some(c) = ch.unicode_char() else { continue };
            let Ok(bounds) = ch.loose_bounds() else { continue };

            if c.is_whitespace() {
                run.flush_into(&mut items);
                continue;
            }

            run.push(
                c,
                bounds.left().value,
                bounds.right().value,
                bounds.bottom().value,
                bounds.top().value,
            );
        }
        run.flush_into(&mut items);

        Ok(items)
    }

    fn render_page(
        &self,
        handle: DocHandle,
        page_index: u32,
        scale: f32,
    ) -> ProviderResult<RgbaImage> {
        let page = self.page(handle, page_index)?;
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let width = (page.width().value * scale).round().max(1.0) as i32;
        let height = (page.height().value * scale).round().max(1.0) as i32;

        let config = PdfRenderConfig::new().set_target_width(width).set_target_height(height);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|error| ProviderError::Render(error.to_string()))?;

        let pixels = bitmap.as_rgba_bytes().to_vec();
        RgbaImage::from_raw(bitmap.width() as u32, bitmap.height() as u32, pixels)
            .ok_or_else(|| ProviderError::Render("bitmap size mismatch".to_owned()))
    }

    fn close(&mut self, handle: DocHandle) -> ProviderResult<()> {
        self.docs
            .remove(&handle)
            .map(|_| ())
            .ok_or(ProviderError::InvalidHandle(handle.raw()))
    }
}

/// Accumulates one whitespace-delimited run of characters.
#[derive(Debug, Default)]
struct RunBuilder {
    text: String,
    start_x: Option<f32>,
    max_x: f32,
    bottom: f32,
    top: f32,
}

impl RunBuilder {
    fn push(&mut self, c: char, left: f32, right: f32, bottom: f32, top: f32) {
        if self.start_x.is_none() {
            self.start_x = Some(left);
            self.bottom = bottom;
            self.top = top;
        } else {
            self.bottom = self.bottom.min(bottom);
            self.top = self.top.max(top);
        }
        self.max_x = self.max_x.max(right);
        self.text.push(c);
    }

    fn flush_into(&mut self, items: &mut Vec<TextItem>) {
        if let Some(start_x) = self.start_x.take() {
            if !self.text.is_empty() {
                items.push(TextItem {
                    text: std::mem::take(&mut self.text),
                    x: start_x,
                    y: self.bottom,
                    width: self.max_x - start_x,
                    height: self.top - self.bottom,
                });
            }
        }
        self.text.clear();
        self.max_x = 0.0;
    }
}
