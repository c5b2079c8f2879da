//! Overlay planning and painting for search sessions
//!
//! The renderer never erases pixels: clearing an overlay means repainting
//! the page from source underneath it, so repeated draws within a session
//! can't corrupt page content. Planning is separated from painting: the
//! plan is a flat list of [`OverlayOp`]s that any [`OverlaySurface`]
//! implementation can execute.

use crate::error::ViewerResult;
use crate::geometry::Rect;
use crate::resolve::MatchKind;
use crate::session::SearchSession;

/// RGBA color, components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightStyle {
    pub color: Color,
    pub line_width: f32,
}

#[derive(Debug, Clone)]
pub struct HighlightConfig {
    /// Fraction of a text match's own height by which its top edge is
    /// shifted upward before drawing. Compensates a systematic
    /// baseline-vs-glyph-box offset in extracted geometry; empirically
    /// tuned, adjust per document corpus.
    pub baseline_lift: f32,
    /// Draw boxes for word-partial matches (they always drive scrolling).
    pub draw_word_partial: bool,
    /// Draw boxes for char-overlap page matches. Off by default: the tier
    /// is too imprecise for a box, so it only drives scrolling.
    pub draw_char_overlap: bool,
    pub style: HighlightStyle,
    pub active_style: HighlightStyle,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        let red = Color::rgb(0.86, 0.08, 0.08);
        Self {
            baseline_lift: 0.75,
            draw_word_partial: true,
            draw_char_overlap: false,
            style: HighlightStyle { color: red, line_width: 2.0 },
            active_style: HighlightStyle { color: red, line_width: 3.0 },
        }
    }
}

/// One drawing instruction, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayOp {
    /// Re-render the page from source, restoring content under any previous
    /// overlay.
    Repaint { page: u32 },
    Stroke { page: u32, rect: Rect, style: HighlightStyle },
}

/// Executes overlay plans. Implemented by the actual page surface; tests
/// implement it with a recorder.
pub trait OverlaySurface {
    fn repaint_page(&mut self, page: u32) -> ViewerResult<()>;
    fn stroke_rect(&mut self, page: u32, rect: Rect, style: HighlightStyle) -> ViewerResult<()>;
}

/// Plans and applies highlight overlays for the current session, keeping
/// track of which pages carry paint from the previous one.
#[derive(Debug, Clone, Default)]
pub struct HighlightRenderer {
    config: HighlightConfig,
    painted_pages: Vec<u32>,
}

impl HighlightRenderer {
    pub fn new(config: HighlightConfig) -> Self {
        Self { config, painted_pages: Vec::new() }
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    /// Build the overlay plan for `session`: repaint every page that held an
    /// overlay or is about to get one, then stroke the eligible matches,
    /// active match last with the heavier style.
    pub fn plan(&mut self, session: &SearchSession) -> Vec<OverlayOp> {
        let mut strokes: Vec<OverlayOp> = Vec::new();
        let mut target_pages: Vec<u32> = Vec::new();

        for (index, hit) in session.matches().iter().enumerate() {
            if !self.is_drawn(hit.kind) {
                continue;
            }

            let style = if session.active_index() == Some(index) {
                self.config.active_style
            } else {
                self.config.style
            };

            strokes.push(OverlayOp::Stroke {
                page: hit.page,
                rect: self.boxed_rect(hit.kind, hit.rect),
                style,
            });
            target_pages.push(hit.page);
        }

        let mut repaint_pages: Vec<u32> = self
            .painted_pages
            .iter()
            .copied()
            .chain(target_pages.iter().copied())
            .collect();
        repaint_pages.sort_unstable();
        repaint_pages.dedup();

        target_pages.sort_unstable();
        target_pages.dedup();
        self.painted_pages = target_pages;

        let mut ops: Vec<OverlayOp> =
            repaint_pages.into_iter().map(|page| OverlayOp::Repaint { page }).collect();
        ops.extend(strokes);
        ops
    }

    /// Plan and execute against a surface in one step.
    pub fn render_to<S: OverlaySurface>(
        &mut self,
        surface: &mut S,
        session: &SearchSession,
    ) -> ViewerResult<()> {
        for op in self.plan(session) {
            match op {
                OverlayOp::Repaint { page } => surface.repaint_page(page)?,
                OverlayOp::Stroke { page, rect, style } => {
                    surface.stroke_rect(page, rect, style)?
                }
            }
        }
        Ok(())
    }

    fn is_drawn(&self, kind: MatchKind) -> bool {
        match kind {
            MatchKind::ExactSubstring | MatchKind::ExplicitBbox => true,
            MatchKind::WordPartial => self.config.draw_word_partial,
            MatchKind::CharOverlap => self.config.draw_char_overlap,
        }
    }

    /// Apply the baseline lift to text-derived rectangles; authoritative
    /// boxes and page-level fallbacks are drawn as-is.
    fn boxed_rect(&self, kind: MatchKind, rect: Rect) -> Rect {
        if !kind.is_text_derived() {
            return rect;
        }
        let rect = rect.normalized();
        Rect { y1: rect.y1 - rect.height() * self.config.baseline_lift, ..rect }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::MatchRect;
    use crate::session::SearchSession;

    fn hit(page: u32, kind: MatchKind) -> MatchRect {
        MatchRect { page, rect: Rect::new(10.0, 100.0, 50.0, 120.0), run_index: None, kind }
    }

    #[derive(Default)]
    struct Recorder {
        repaints: Vec<u32>,
        strokes: Vec<(u32, Rect, f32)>,
    }

    impl OverlaySurface for Recorder {
        fn repaint_page(&mut self, page: u32) -> crate::error::ViewerResult<()> {
            self.repaints.push(page);
            Ok(())
        }

        fn stroke_rect(
            &mut self,
            page: u32,
            rect: Rect,
            style: HighlightStyle,
        ) -> crate::error::ViewerResult<()> {
            self.strokes.push((page, rect, style.line_width));
            Ok(())
        }
    }

    #[test]
    fn repaints_precede_strokes() {
        let mut renderer = HighlightRenderer::default();
        let session =
            SearchSession::new("q", vec![hit(1, MatchKind::ExactSubstring)]);

        let ops = renderer.plan(&session);
        assert_eq!(ops[0], OverlayOp::Repaint { page: 1 });
        assert!(matches!(ops[1], OverlayOp::Stroke { page: 1, .. }));
    }

    #[test]
    fn active_match_uses_heavier_stroke() {
        let mut renderer = HighlightRenderer::default();
        let session = SearchSession::new(
            "q",
            vec![hit(1, MatchKind::ExactSubstring), hit(2, MatchKind::ExactSubstring)],
        );

        let mut surface = Recorder::default();
        renderer.render_to(&mut surface, &session).unwrap();

        assert_eq!(surface.strokes.len(), 2);
        assert_eq!(surface.strokes[0].2, 3.0); // active (index 0)
        assert_eq!(surface.strokes[1].2, 2.0);
    }

    #[test]
    fn text_matches_are_lifted_explicit_boxes_are_not() {
        let mut renderer = HighlightRenderer::default();
        let session = SearchSession::new(
            "q",
            vec![hit(1, MatchKind::ExactSubstring), hit(1, MatchKind::ExplicitBbox)],
        );

        let mut surface = Recorder::default();
        renderer.render_to(&mut surface, &session).unwrap();

        let lifted = surface.strokes[0].1;
        let as_given = surface.strokes[1].1;
        // Height 20, lifted by 15: top edge moves from 100 to 85.
        assert_eq!(lifted.y1, 85.0);
        assert_eq!(lifted.y2, 120.0);
        assert_eq!(as_given, Rect::new(10.0, 100.0, 50.0, 120.0));
    }

    #[test]
    fn char_overlap_is_scroll_only_by_default() {
        let mut renderer = HighlightRenderer::default();
        let session = SearchSession::new("q", vec![hit(3, MatchKind::CharOverlap)]);

        let ops = renderer.plan(&session);
        assert!(ops.is_empty());

        let mut opt_in = HighlightRenderer::new(HighlightConfig {
            draw_char_overlap: true,
            ..HighlightConfig::default()
        });
        let ops = opt_in.plan(&session);
        assert!(ops.iter().any(|op| matches!(op, OverlayOp::Stroke { page: 3, .. })));
    }

    #[test]
    fn new_session_repaints_previously_painted_pages() {
        let mut renderer = HighlightRenderer::default();

        let first = SearchSession::new("q", vec![hit(2, MatchKind::ExactSubstring)]);
        renderer.plan(&first);

        // Next session has matches on a different page: page 2 must still be
        // repainted to clear its stale overlay.
        let second = SearchSession::new("r", vec![hit(4, MatchKind::ExactSubstring)]);
        let ops = renderer.plan(&second);
        assert_eq!(
            ops.iter().filter(|op| matches!(op, OverlayOp::Repaint { .. })).count(),
            2
        );
        assert!(ops.contains(&OverlayOp::Repaint { page: 2 }));
        assert!(ops.contains(&OverlayOp::Repaint { page: 4 }));
    }

    #[test]
    fn empty_session_clears_without_drawing() {
        let mut renderer = HighlightRenderer::default();
        renderer.plan(&SearchSession::new("q", vec![hit(1, MatchKind::ExactSubstring)]));

        let ops = renderer.plan(&SearchSession::empty());
        assert_eq!(ops, vec![OverlayOp::Repaint { page: 1 }]);

        // And nothing is tracked anymore.
        assert!(renderer.plan(&SearchSession::empty()).is_empty());
    }
}
