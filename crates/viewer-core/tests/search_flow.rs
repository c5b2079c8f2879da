//! End-to-end flow: open a document, resolve field queries through the
//! full strategy cascade, navigate matches and plan overlays.

use pdf_provider::{DocumentSource, PageSize, PdfProvider, ScriptedPage, ScriptedProvider};
use viewer_core::{
    FieldRef, GeometryIndex, MatchKind, OverlayOp, Rect, Resolver, ViewerSession,
    ViewportController,
};

fn letter() -> PageSize {
    PageSize { width_pt: 612.0, height_pt: 792.0 }
}

/// Two-page policy document: the number appears on both pages, the insured
/// name only on the first, and the second page carries a noisy scan line.
fn policy_provider() -> ScriptedProvider {
    let mut provider = ScriptedProvider::new();
    provider.stage(vec![
        ScriptedPage::new(letter())
            .with_item("Policy Number POL123456789", 100.0, 700.0, 260.0, 12.0)
            .with_item("Named Insured: Dana Whitfield", 100.0, 650.0, 230.0, 12.0)
            .with_item("Effective Date 2025-03-01", 100.0, 600.0, 190.0, 12.0),
        ScriptedPage::new(letter())
            .with_item("POL123456789 Schedule of Coverages", 72.0, 720.0, 270.0, 12.0)
            .with_item("T0TAL PREM1UM DUE", 72.0, 680.0, 140.0, 12.0),
    ]);
    provider
}

#[test]
fn field_value_resolves_to_sub_rectangles_on_both_pages() {
    let mut session = ViewerSession::new(policy_provider());
    session.open(DocumentSource::Bytes(Vec::new())).unwrap();

    let result = session.search("POL123456789".into());
    assert_eq!(result.len(), 2);

    let first = result.matches()[0].clone();
    let second = result.matches()[1].clone();
    assert_eq!((first.page, second.page), (1, 2));
    assert_eq!(first.kind, MatchKind::ExactSubstring);
    assert_eq!(second.kind, MatchKind::ExactSubstring);

    // Page 1: the value is a 12-character suffix of a 26-character run, so
    // the box covers less than half the run's width.
    let page = session.index().unwrap().page(1).unwrap();
    let run_rect = page.run_display_rect(&page.runs[0]);
    assert!(first.rect.width() < run_rect.width() / 2.0 + 1.0);
    assert!(first.rect.x1 > run_rect.x1);
}

#[test]
fn camel_case_field_name_finds_spaced_label() {
    let mut session = ViewerSession::new(policy_provider());
    session.open(DocumentSource::Bytes(Vec::new())).unwrap();

    let result = session.search("effectiveDate".into());
    assert_eq!(result.len(), 1);
    assert_eq!(result.matches()[0].page, 1);
    assert_eq!(result.matches()[0].kind, MatchKind::ExactSubstring);
}

#[test]
fn noisy_scan_line_falls_back_to_page_match() {
    let mut session = ViewerSession::new(policy_provider());
    session.open(DocumentSource::Bytes(Vec::new())).unwrap();

    // "premium" never appears verbatim (the scan line has digits in place
    // of letters), so the exact and word-partial tiers fail on page 2 and
    // char overlap marks the whole page.
    let result = session.search("premium".into());
    let page_two = result
        .matches()
        .iter()
        .find(|hit| hit.page == 2)
        .expect("page 2 should match");
    assert_eq!(page_two.kind, MatchKind::CharOverlap);
    assert_eq!(page_two.run_index, None);
}

#[test]
fn navigation_wraps_and_overlays_follow() {
    let mut session = ViewerSession::new(policy_provider());
    session.open(DocumentSource::Bytes(Vec::new())).unwrap();

    session.search("POL123456789".into());
    assert_eq!(session.session().active_index(), Some(0));

    session.next_match();
    let plan = session.overlay_plan();

    // Both pages get repainted and both matches stroked.
    let repaints: Vec<u32> = plan
        .iter()
        .filter_map(|op| match op {
            OverlayOp::Repaint { page } => Some(*page),
            _ => None,
        })
        .collect();
    assert_eq!(repaints, vec![1, 2]);
    assert_eq!(
        plan.iter().filter(|op| matches!(op, OverlayOp::Stroke { .. })).count(),
        2
    );

    session.next_match();
    assert_eq!(session.session().active_index(), Some(0));
}

#[test]
fn explicit_location_bypasses_text_search() {
    let mut session = ViewerSession::new(policy_provider());
    session.open(DocumentSource::Bytes(Vec::new())).unwrap();

    let bbox = Rect::new(40.0, 50.0, 140.0, 70.0);
    let result = session.search(FieldRef::Location { page: 2, bbox });

    assert_eq!(result.len(), 1);
    assert_eq!(result.matches()[0].rect, bbox);
    assert_eq!(result.matches()[0].kind, MatchKind::ExplicitBbox);
}

#[test]
fn resolver_is_stable_across_direct_and_session_use() {
    let mut provider = policy_provider();
    let handle = provider.open(DocumentSource::Bytes(Vec::new())).unwrap();

    let viewport = ViewportController::default();
    let sizes = vec![(612.0, 792.0); 2];
    let index = GeometryIndex::build(&provider, handle, &viewport.layout(&sizes)).unwrap();

    let direct = Resolver::default().resolve(&"POL123456789".into(), &index);

    let mut session = ViewerSession::new(policy_provider());
    session.open(DocumentSource::Bytes(Vec::new())).unwrap();
    let via_session = session.search("POL123456789".into());

    assert_eq!(direct, via_session.matches());
}
