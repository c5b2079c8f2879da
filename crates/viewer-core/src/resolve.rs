//! Query resolution against the geometry index
//!
//! A query is either free text (a field label or value) or an explicit
//! page + bounding box handed over by the form editor. Text queries run a
//! cascade of matching strategies per page, ordered from precise to
//! permissive, so that noisy extractions (scans, OCR artifacts) still
//! navigate the user somewhere plausible:
//!
//! 1. explicit bbox: authoritative, bypasses search entirely
//! 2. exact substring: sub-rectangle of the matching character span
//! 3. word partial: whole-run boxes for long query words, only on pages
//!    with no exact match
//! 4. char overlap: whole-page fallback for short queries on pages where
//!    most query characters appear somewhere in the page text
//!
//! Resolution never fails; the worst outcome is an empty match list.

use crate::geometry::{GeometryIndex, PageGeometry, Rect};
use serde::{Deserialize, Serialize};

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    ExactSubstring,
    WordPartial,
    CharOverlap,
    ExplicitBbox,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactSubstring => "exact-substring",
            Self::WordPartial => "word-partial",
            Self::CharOverlap => "char-overlap",
            Self::ExplicitBbox => "explicit-bbox",
        }
    }

    /// True for matches derived from extracted text geometry (as opposed to
    /// an authoritative caller-supplied box or a whole-page fallback).
    pub fn is_text_derived(self) -> bool {
        matches!(self, Self::ExactSubstring | Self::WordPartial)
    }
}

/// A resolved hit, in display-pixel space of the page it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRect {
    /// 1-based page number.
    pub page: u32,
    pub rect: Rect,
    /// Index of the owning run within the page, when one exists.
    pub run_index: Option<usize>,
    pub kind: MatchKind,
}

/// What the form editor passes on field interaction: a plain string to
/// search for, or an authoritative `{page, bbox}` location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRef {
    Location { page: u32, bbox: Rect },
    Text(String),
}

impl From<&str> for FieldRef {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldRef {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Tuning knobs for the permissive strategies. The defaults were calibrated
/// against sample documents and are not contractual.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Query words must be strictly longer than this to participate in
    /// word-partial matching.
    pub min_partial_word_len: usize,
    /// Char-overlap only runs for queries up to this many characters.
    pub char_overlap_max_query_len: usize,
    /// Fraction of query characters that must appear in the page text.
    pub char_overlap_threshold: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_partial_word_len: 3,
            char_overlap_max_query_len: 10,
            char_overlap_threshold: 0.7,
        }
    }
}

/// Normalize a field name or search term for comparison against page text:
/// underscores become spaces, camelCase boundaries are split, whitespace is
/// collapsed, and everything is lowercased. `policyEffectiveDate` and
/// `policy_effective_date` both normalize to `policy effective date`.
pub fn normalize_query(raw: &str) -> String {
    let mut spaced = String::with_capacity(raw.len() + 8);
    let mut prev_lower = false;

    for c in raw.chars() {
        if c == '_' {
            spaced.push(' ');
            prev_lower = false;
            continue;
        }
        if prev_lower && c.is_uppercase() {
            spaced.push(' ');
        }
        prev_lower = c.is_lowercase();
        spaced.push(c);
    }

    spaced.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a query to an ordered match list: ascending page number,
    /// then document order of runs, then occurrence order within a run.
    /// Re-resolving against an unchanged index yields an identical list.
    pub fn resolve(&self, field: &FieldRef, index: &GeometryIndex) -> Vec<MatchRect> {
        match field {
            FieldRef::Location { page, bbox } => {
                // Authoritative: emit the box as given, no search.
                vec![MatchRect {
                    page: *page,
                    rect: bbox.normalized(),
                    run_index: None,
                    kind: MatchKind::ExplicitBbox,
                }]
            }
            FieldRef::Text(raw) => {
                let term = normalize_query(raw);
                if term.is_empty() {
                    return Vec::new();
                }

                let mut matches = Vec::new();
                for page in index.pages() {
                    matches.extend(self.resolve_page(page, &term));
                }

                tracing::debug!(query = %term, count = matches.len(), "query resolved");
                matches
            }
        }
    }

    /// Strategy cascade for one page. The first tier that produces anything
    /// wins; later tiers only run when earlier ones came up empty.
    fn resolve_page(&self, page: &PageGeometry, term: &str) -> Vec<MatchRect> {
        let exact = exact_substring_matches(page, term);
        if !exact.is_empty() {
            return exact;
        }

        let partial = self.word_partial_matches(page, term);
        if !partial.is_empty() {
            return partial;
        }

        if term.chars().count() <= self.config.char_overlap_max_query_len {
            if let Some(fallback) = self.char_overlap_match(page, term) {
                return vec![fallback];
            }
        }

        Vec::new()
    }

    /// Tier 3: any sufficiently long query word appearing in a run marks the
    /// whole run.
    fn word_partial_matches(&self, page: &PageGeometry, term: &str) -> Vec<MatchRect> {
        let words: Vec<&str> = term
            .split_whitespace()
            .filter(|word| word.chars().count() > self.config.min_partial_word_len)
            .collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut matches = Vec::new();
        for (run_index, run) in page.runs.iter().enumerate() {
            let haystack = run.text.to_lowercase();
            if words.iter().any(|word| haystack.contains(word)) {
                matches.push(MatchRect {
                    page: page.page_number,
                    rect: page.run_display_rect(run),
                    run_index: Some(run_index),
                    kind: MatchKind::WordPartial,
                });
            }
        }
        matches
    }

    /// Tier 4: if most of the query's characters occur anywhere in the page
    /// text, mark the whole page. Imprecise by design; exists so that noisy
    /// extractions still navigate the user to a plausible page.
    fn char_overlap_match(&self, page: &PageGeometry, term: &str) -> Option<MatchRect> {
        let haystack = page.page_text.to_lowercase();
        if haystack.is_empty() {
            return None;
        }

        let mut total = 0usize;
        let mut present = 0usize;
        for c in term.chars().filter(|c| !c.is_whitespace()) {
            total += 1;
            if haystack.contains(c) {
                present += 1;
            }
        }
        if total == 0 {
            return None;
        }

        let fraction = present as f32 / total as f32;
        if fraction > self.config.char_overlap_threshold {
            Some(MatchRect {
                page: page.page_number,
                rect: page.display_rect(),
                run_index: None,
                kind: MatchKind::CharOverlap,
            })
        } else {
            None
        }
    }
}

/// Tier 2: every occurrence of `term` inside a run, boxed to just the
/// matched character span. Character width is estimated as
/// `run.width / char_count`, which is exact for monospace and close enough
/// for highlight boxes elsewhere.
fn exact_substring_matches(page: &PageGeometry, term: &str) -> Vec<MatchRect> {
    let term_chars = term.chars().count();
    if term_chars == 0 {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for (run_index, run) in page.runs.iter().enumerate() {
        let char_count = run.text.chars().count();
        if char_count == 0 {
            continue;
        }

        let haystack = run.text.to_lowercase();
        let char_width = run.width / char_count as f32;

        let mut search_from = 0usize;
        while let Some(found) = haystack[search_from..].find(term) {
            let byte_start = search_from + found;
            let char_start = haystack[..byte_start].chars().count();

            let x1 = run.x + char_width * char_start as f32;
            let x2 = x1 + char_width * term_chars as f32;
            let pdf_rect = Rect::new(x1, run.y - run.height, x2, run.y);

            matches.push(MatchRect {
                page: page.page_number,
                rect: page.to_display_rect(pdf_rect),
                run_index: Some(run_index),
                kind: MatchKind::ExactSubstring,
            });

            // Advance one character so overlapping occurrences are found.
            let step = haystack[byte_start..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
            search_from = byte_start + step;
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PageGeometry, TextRun};

    fn page_with_runs(page_number: u32, runs: Vec<TextRun>) -> PageGeometry {
        let page_text = runs.iter().map(|run| run.text.as_str()).collect::<Vec<_>>().join(" ");
        PageGeometry {
            page_number,
            width_pt: 612.0,
            height_pt: 792.0,
            render_scale: 1.0,
            display_scale: 1.0,
            runs,
            page_text,
        }
    }

    fn run(text: &str, x: f32, y: f32, width: f32) -> TextRun {
        TextRun { text: text.to_owned(), x, y, width, height: 12.0 }
    }

    fn index_of(pages: Vec<PageGeometry>) -> GeometryIndex {
        GeometryIndex::from_pages(pages)
    }

    #[test]
    fn normalize_splits_camel_case_and_underscores() {
        assert_eq!(normalize_query("policyEffectiveDate"), "policy effective date");
        assert_eq!(normalize_query("policy_effective_date"), "policy effective date");
        assert_eq!(normalize_query("  Policy   Number "), "policy number");
        assert_eq!(normalize_query(""), "");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn exact_substring_boxes_only_the_matched_span() {
        let full_run = run("Policy Number POL123456789", 100.0, 700.0, 260.0);
        let index = index_of(vec![page_with_runs(1, vec![full_run.clone()])]);

        let matches = Resolver::default().resolve(&"POL123456789".into(), &index);
        assert_eq!(matches.len(), 1);
        let hit = &matches[0];
        assert_eq!(hit.page, 1);
        assert_eq!(hit.kind, MatchKind::ExactSubstring);
        assert_eq!(hit.run_index, Some(0));

        // Sub-rectangle, not the whole run: 12 of 26 characters.
        let run_width = 260.0;
        assert!(hit.rect.width() < run_width);
        let char_width = run_width / 26.0;
        assert!((hit.rect.width() - char_width * 12.0).abs() < 0.01);
        // Starts after "Policy Number " (14 chars).
        assert!((hit.rect.x1 - (100.0 + char_width * 14.0)).abs() < 0.01);
    }

    #[test]
    fn camel_case_query_matches_spaced_page_text() {
        let index = index_of(vec![page_with_runs(
            1,
            vec![run("Policy Effective Date: 2025-01-01", 72.0, 700.0, 200.0)],
        )]);

        let matches = Resolver::default().resolve(&"policyEffectiveDate".into(), &index);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, MatchKind::ExactSubstring);
    }

    #[test]
    fn blank_query_resolves_to_empty_list() {
        let index = index_of(vec![page_with_runs(1, vec![run("anything", 0.0, 10.0, 50.0)])]);
        let resolver = Resolver::default();

        assert!(resolver.resolve(&"".into(), &index).is_empty());
        assert!(resolver.resolve(&"   ".into(), &index).is_empty());
    }

    #[test]
    fn explicit_bbox_bypasses_search() {
        let index = index_of(vec![page_with_runs(1, vec![])]);
        let bbox = Rect::new(10.0, 20.0, 110.0, 40.0);

        let matches = Resolver::default()
            .resolve(&FieldRef::Location { page: 2, bbox }, &index);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].page, 2);
        assert_eq!(matches[0].rect, bbox);
        assert_eq!(matches[0].kind, MatchKind::ExplicitBbox);
    }

    #[test]
    fn matches_are_ordered_by_page_then_run() {
        let index = index_of(vec![
            page_with_runs(
                1,
                vec![
                    run("total premium", 72.0, 700.0, 80.0),
                    run("premium due", 72.0, 650.0, 70.0),
                ],
            ),
            page_with_runs(2, vec![run("premium schedule", 72.0, 700.0, 100.0)]),
        ]);

        let matches = Resolver::default().resolve(&"premium".into(), &index);
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].page, 1);
        assert_eq!(matches[0].run_index, Some(0));
        assert_eq!(matches[1].page, 1);
        assert_eq!(matches[1].run_index, Some(1));
        assert_eq!(matches[2].page, 2);
    }

    #[test]
    fn repeated_resolution_is_idempotent() {
        let index = index_of(vec![page_with_runs(
            1,
            vec![run("Named Insured: Rohan Kumar", 72.0, 700.0, 180.0)],
        )]);
        let resolver = Resolver::default();

        let first = resolver.resolve(&"rohan".into(), &index);
        let second = resolver.resolve(&"rohan".into(), &index);
        assert_eq!(first, second);
    }

    #[test]
    fn word_partial_only_runs_when_exact_fails() {
        let index = index_of(vec![page_with_runs(
            1,
            vec![run("Effective Date of Coverage", 72.0, 700.0, 160.0)],
        )]);

        // "effective" appears, "2031" does not; no exact match for the whole
        // phrase, so the long word promotes the whole run.
        let matches = Resolver::default().resolve(&"effective 2031".into(), &index);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, MatchKind::WordPartial);
        assert_eq!(matches[0].run_index, Some(0));
    }

    #[test]
    fn word_partial_ignores_short_words() {
        let index = index_of(vec![page_with_runs(1, vec![run("due to the", 72.0, 700.0, 60.0)])]);

        // No exact match, the only query word is too short for tier 3, and
        // none of its characters appear in the page text for tier 4.
        let matches = Resolver::default().resolve(&"xyz".into(), &index);
        assert!(matches.is_empty());
    }

    #[test]
    fn char_overlap_marks_whole_page_for_short_noisy_queries() {
        let index = index_of(vec![page_with_runs(
            1,
            vec![run("P0LICY NUM8ER 12345", 72.0, 700.0, 140.0)],
        )]);

        // "policy" never appears verbatim (zero in place of o), but most of
        // its characters do.
        let matches = Resolver::default().resolve(&"policy".into(), &index);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, MatchKind::CharOverlap);
        assert_eq!(matches[0].run_index, None);
        assert_eq!(matches[0].rect, index.pages()[0].display_rect());
    }

    #[test]
    fn char_overlap_skips_long_queries() {
        let index = index_of(vec![page_with_runs(
            1,
            vec![run("abcdefghijklmnopqrstuvwxyz", 72.0, 700.0, 200.0)],
        )]);

        // Every character is present, but the query exceeds the length gate.
        let matches = Resolver::default().resolve(&"zyxwvutsrqp".into(), &index);
        assert!(matches.is_empty());
    }

    #[test]
    fn char_overlap_respects_threshold() {
        let index = index_of(vec![page_with_runs(1, vec![run("aaaa", 72.0, 700.0, 30.0)])]);
        let resolver = Resolver::default();

        // 1 of 4 distinct characters present: below 0.7.
        assert!(resolver.resolve(&"awxy".into(), &index).is_empty());
        // 3 of 4 present: 0.75 > 0.7.
        let index = index_of(vec![page_with_runs(1, vec![run("awx", 72.0, 700.0, 30.0)])]);
        assert_eq!(resolver.resolve(&"awxy".into(), &index).len(), 1);
    }

    #[test]
    fn field_ref_deserializes_both_shapes() {
        let text: FieldRef = serde_json::from_str("\"Policy Number\"").unwrap();
        assert_eq!(text, FieldRef::Text("Policy Number".to_owned()));

        let location: FieldRef = serde_json::from_str(
            r#"{"page": 3, "bbox": {"x1": 1.0, "y1": 2.0, "x2": 3.0, "y2": 4.0}}"#,
        )
        .unwrap();
        assert_eq!(
            location,
            FieldRef::Location { page: 3, bbox: Rect::new(1.0, 2.0, 3.0, 4.0) }
        );
    }

    #[test]
    fn overlapping_occurrences_are_all_reported() {
        let index = index_of(vec![page_with_runs(1, vec![run("aaa", 0.0, 10.0, 30.0)])]);

        let matches = Resolver::default().resolve(&"aa".into(), &index);
        assert_eq!(matches.len(), 2);
    }
}
