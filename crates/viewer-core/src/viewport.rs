//! Display scale, zoom, scrolling and page navigation
//!
//! Pages are fit to a fixed on-screen height when the container is wide
//! enough, and to the container width otherwise. The internal raster
//! resolution is oversampled relative to the display scale so zoomed-out
//! pages stay crisp. Scrolling brings a target rectangle into view with a
//! small margin and re-centers only when the target is small relative to the
//! viewport, which keeps navigation between nearby matches stable instead of
//! jumping on every step.

use crate::geometry::Rect;
use std::time::{Duration, Instant};

/// Scale pair for one page: what the raster is rendered at versus what it
/// is shown at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageScale {
    pub display_scale: f32,
    pub render_scale: f32,
}

impl Default for PageScale {
    fn default() -> Self {
        Self { display_scale: 1.0, render_scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub struct ViewportConfig {
    /// Target on-screen page height when the container is unconstrained.
    pub target_height_px: f32,
    /// Containers at or below this width fit to width instead.
    pub narrow_container_px: f32,
    /// Hard cap on the computed display scale (before zoom).
    pub max_display_scale: f32,
    /// Raster resolution multiplier over the display scale.
    pub render_oversample: f32,
    /// Pages are never rasterized below this scale.
    pub min_render_scale: f32,
    /// Padding left between a scrolled-to rectangle and the viewport edge.
    pub scroll_margin_px: f32,
    /// Targets smaller than this fraction of the viewport get centered.
    pub center_fraction: f32,
    /// Vertical gap between stacked pages in the scroll container.
    pub page_gap_px: f32,
    pub zoom_step: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Container-driven rescale debounce; zoom changes apply immediately.
    pub resize_debounce: Duration,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            target_height_px: 455.0,
            narrow_container_px: 400.0,
            max_display_scale: 3.0,
            render_oversample: 2.0,
            min_render_scale: 1.0,
            scroll_margin_px: 20.0,
            center_fraction: 0.8,
            page_gap_px: 16.0,
            zoom_step: 1.2,
            min_zoom: 0.5,
            max_zoom: 3.0,
            resize_debounce: Duration::from_millis(250),
        }
    }
}

/// Scroll offsets of the page container, in display pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollState {
    pub top: f32,
    pub left: f32,
}

/// Owns zoom, per-page display scale and page-by-page navigation state for
/// the active document.
#[derive(Debug, Clone)]
pub struct ViewportController {
    config: ViewportConfig,
    zoom: f32,
    container_width: f32,
    container_height: f32,
    current_page: u32,
    page_count: u32,
    loading: bool,
    navigating: bool,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportController {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            zoom: 1.0,
            container_width: 800.0,
            container_height: 600.0,
            current_page: 1,
            page_count: 0,
            loading: false,
            navigating: false,
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn set_container(&mut self, width: f32, height: f32) {
        self.container_width = width;
        self.container_height = height;
    }

    pub fn container(&self) -> (f32, f32) {
        (self.container_width, self.container_height)
    }

    // --- zoom ---------------------------------------------------------

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom * self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom / self.config.zoom_step)
    }

    pub fn reset_zoom(&mut self) -> f32 {
        self.zoom = 1.0;
        self.zoom
    }

    pub fn set_zoom(&mut self, level: f32) -> f32 {
        self.zoom = level.clamp(self.config.min_zoom, self.config.max_zoom);
        self.zoom
    }

    // --- scale --------------------------------------------------------

    /// On-screen scale for a page of the given intrinsic size.
    pub fn display_scale_for(&self, page_width_pt: f32, page_height_pt: f32) -> f32 {
        if page_width_pt <= 0.0 || page_height_pt <= 0.0 {
            return self.zoom;
        }

        let width_fit = self.container_width / page_width_pt;
        let fit = if self.container_width > self.config.narrow_container_px {
            (self.config.target_height_px / page_height_pt)
                .min(width_fit)
                .min(self.config.max_display_scale)
        } else {
            width_fit.min(self.config.max_display_scale)
        };

        fit * self.zoom
    }

    /// Raster scale backing a display scale: oversampled for crispness,
    /// never below the native floor.
    pub fn render_scale_for(&self, display_scale: f32) -> f32 {
        (display_scale * self.config.render_oversample).max(self.config.min_render_scale)
    }

    pub fn page_scale_for(&self, page_width_pt: f32, page_height_pt: f32) -> PageScale {
        let display_scale = self.display_scale_for(page_width_pt, page_height_pt);
        PageScale { display_scale, render_scale: self.render_scale_for(display_scale) }
    }

    /// Scales for a whole document, one entry per page.
    pub fn layout(&self, page_sizes: &[(f32, f32)]) -> Vec<PageScale> {
        page_sizes
            .iter()
            .map(|&(width_pt, height_pt)| self.page_scale_for(width_pt, height_pt))
            .collect()
    }

    // --- page navigation ----------------------------------------------

    pub fn set_page_count(&mut self, page_count: u32) {
        self.page_count = page_count;
        self.current_page = self.current_page.clamp(1, page_count.max(1));
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Advance one page. Guarded no-op while loading or while a previous
    /// navigation's scroll is still in flight; call
    /// [`finish_navigation`](Self::finish_navigation) when the scroll
    /// settles.
    pub fn go_to_next_page(&mut self) -> u32 {
        if self.can_navigate() && self.current_page < self.page_count {
            self.current_page += 1;
            self.navigating = true;
        }
        self.current_page
    }

    /// Step back one page, same guards as [`go_to_next_page`](Self::go_to_next_page).
    pub fn go_to_prev_page(&mut self) -> u32 {
        if self.can_navigate() && self.current_page > 1 {
            self.current_page -= 1;
            self.navigating = true;
        }
        self.current_page
    }

    pub fn finish_navigation(&mut self) {
        self.navigating = false;
    }

    fn can_navigate(&self) -> bool {
        !self.loading && !self.navigating && self.page_count > 0
    }
}

/// Minimal scroll adjustment that makes `target` visible inside a viewport
/// of `viewport_width` x `viewport_height`, container coordinates.
///
/// A fully or partially visible target smaller than
/// `config.center_fraction` of the viewport on an axis is centered on that
/// axis; anything else is brought just inside the edge it overflows, with
/// `config.scroll_margin_px` of padding. Offsets never go negative.
pub fn scroll_to_show(
    scroll: ScrollState,
    viewport_width: f32,
    viewport_height: f32,
    target: Rect,
    config: &ViewportConfig,
) -> ScrollState {
    let target = target.normalized();
    let margin = config.scroll_margin_px;

    let mut top = scroll.top;
    if target.y1 < scroll.top {
        top = target.y1 - margin;
    } else if target.y2 > scroll.top + viewport_height {
        top = target.y2 - viewport_height + margin;
    } else if target.height() < viewport_height * config.center_fraction {
        let (_, center_y) = target.center();
        top = center_y - viewport_height / 2.0;
    }

    let mut left = scroll.left;
    if target.x1 < scroll.left {
        left = target.x1 - margin;
    } else if target.x2 > scroll.left + viewport_width {
        left = target.x2 - viewport_width + margin;
    } else if target.width() < viewport_width * config.center_fraction {
        let (center_x, _) = target.center();
        left = center_x - viewport_width / 2.0;
    }

    ScrollState { top: top.max(0.0), left: left.max(0.0) }
}

/// Coalesces rapid container-width changes to the latest value, applied
/// after a quiet period. Zoom changes bypass this and apply immediately.
#[derive(Debug)]
pub struct RescaleDebouncer {
    delay: Duration,
    pending: Option<(Instant, (f32, f32))>,
}

impl RescaleDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Record a new container size; any previously pending size is dropped.
    pub fn request(&mut self, width: f32, height: f32, now: Instant) {
        self.pending = Some((now, (width, height)));
    }

    /// The coalesced size, once the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<(f32, f32)> {
        match self.pending {
            Some((requested_at, size)) if now.duration_since(requested_at) >= self.delay => {
                self.pending = None;
                Some(size)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ViewportController {
        ViewportController::default()
    }

    #[test]
    fn zoom_is_clamped_after_many_steps() {
        let mut viewport = controller();

        for _ in 0..50 {
            viewport.zoom_in();
        }
        assert_eq!(viewport.zoom(), 3.0);

        for _ in 0..50 {
            viewport.zoom_out();
        }
        assert_eq!(viewport.zoom(), 0.5);

        assert_eq!(viewport.reset_zoom(), 1.0);
    }

    #[test]
    fn wide_container_fits_fixed_height() {
        let mut viewport = controller();
        viewport.set_container(800.0, 600.0);

        // 455 / 910 = 0.5, smaller than the width fit.
        let scale = viewport.display_scale_for(612.0, 910.0);
        assert!((scale - 0.5).abs() < 1e-6);
    }

    #[test]
    fn narrow_container_fits_width() {
        let mut viewport = controller();
        viewport.set_container(300.0, 600.0);

        let scale = viewport.display_scale_for(600.0, 800.0);
        assert!((scale - 0.5).abs() < 1e-6);
    }

    #[test]
    fn display_scale_is_capped() {
        let mut viewport = controller();
        viewport.set_container(5000.0, 600.0);

        // Tiny page, huge container: capped at 3.0.
        let scale = viewport.display_scale_for(50.0, 50.0);
        assert_eq!(scale, 3.0);
    }

    #[test]
    fn render_scale_is_oversampled_with_floor() {
        let viewport = controller();

        assert_eq!(viewport.render_scale_for(1.5), 3.0);
        // Small display scales still rasterize at native resolution.
        assert_eq!(viewport.render_scale_for(0.25), 1.0);
    }

    #[test]
    fn zoom_multiplies_display_scale() {
        let mut viewport = controller();
        viewport.set_container(800.0, 600.0);

        let base = viewport.display_scale_for(612.0, 910.0);
        viewport.zoom_in();
        let zoomed = viewport.display_scale_for(612.0, 910.0);
        assert!((zoomed - base * 1.2).abs() < 1e-6);
    }

    #[test]
    fn page_navigation_clamps_to_bounds() {
        let mut viewport = controller();
        viewport.set_page_count(3);

        assert_eq!(viewport.go_to_prev_page(), 1);
        viewport.finish_navigation();

        assert_eq!(viewport.go_to_next_page(), 2);
        viewport.finish_navigation();
        assert_eq!(viewport.go_to_next_page(), 3);
        viewport.finish_navigation();
        assert_eq!(viewport.go_to_next_page(), 3);
    }

    #[test]
    fn navigation_is_noop_while_loading() {
        let mut viewport = controller();
        viewport.set_page_count(5);
        viewport.set_loading(true);

        assert_eq!(viewport.go_to_next_page(), 1);
        assert_eq!(viewport.go_to_prev_page(), 1);

        viewport.set_loading(false);
        assert_eq!(viewport.go_to_next_page(), 2);
    }

    #[test]
    fn navigation_is_noop_while_scroll_in_flight() {
        let mut viewport = controller();
        viewport.set_page_count(5);

        assert_eq!(viewport.go_to_next_page(), 2);
        // Previous navigation not finished yet.
        assert_eq!(viewport.go_to_next_page(), 2);

        viewport.finish_navigation();
        assert_eq!(viewport.go_to_next_page(), 3);
    }

    #[test]
    fn scroll_brings_target_above_viewport_into_view() {
        let config = ViewportConfig::default();
        let scroll = ScrollState { top: 500.0, left: 0.0 };

        let target = Rect::new(10.0, 100.0, 60.0, 120.0);
        let moved = scroll_to_show(scroll, 400.0, 300.0, target, &config);
        assert_eq!(moved.top, 80.0); // y1 - 20 margin
    }

    #[test]
    fn scroll_brings_target_below_viewport_into_view() {
        let config = ViewportConfig::default();
        let scroll = ScrollState::default();

        let target = Rect::new(10.0, 700.0, 60.0, 740.0);
        let moved = scroll_to_show(scroll, 400.0, 300.0, target, &config);
        assert_eq!(moved.top, 740.0 - 300.0 + 20.0);
    }

    #[test]
    fn small_visible_target_gets_centered() {
        let config = ViewportConfig::default();
        let scroll = ScrollState { top: 100.0, left: 0.0 };

        // Already inside the 100..400 window, much smaller than 80% of it.
        let target = Rect::new(150.0, 200.0, 170.0, 220.0);
        let moved = scroll_to_show(scroll, 400.0, 300.0, target, &config);
        assert_eq!(moved.top, 210.0 - 150.0); // centered on y = 210
    }

    #[test]
    fn large_visible_target_is_left_alone() {
        let config = ViewportConfig::default();
        let scroll = ScrollState { top: 100.0, left: 50.0 };

        // Fills most of the viewport on both axes: no adjustment.
        let target = Rect::new(60.0, 110.0, 440.0, 390.0);
        let moved = scroll_to_show(scroll, 400.0, 300.0, target, &config);
        assert_eq!(moved, scroll);
    }

    #[test]
    fn scroll_never_goes_negative() {
        let config = ViewportConfig::default();
        let scroll = ScrollState { top: 200.0, left: 200.0 };

        let target = Rect::new(5.0, 5.0, 15.0, 15.0);
        let moved = scroll_to_show(scroll, 400.0, 300.0, target, &config);
        assert_eq!(moved.top, 0.0);
        assert_eq!(moved.left, 0.0);
    }

    #[test]
    fn debouncer_coalesces_to_latest_request() {
        let mut debouncer = RescaleDebouncer::new(Duration::from_millis(250));
        let start = Instant::now();

        debouncer.request(500.0, 400.0, start);
        debouncer.request(600.0, 400.0, start + Duration::from_millis(100));

        // First request's deadline passed, but it was superseded.
        assert_eq!(debouncer.poll(start + Duration::from_millis(300)), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(350)),
            Some((600.0, 400.0))
        );
        assert!(!debouncer.is_pending());
    }
}
