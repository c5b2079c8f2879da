//! Search sessions and match navigation
//!
//! A [`SearchSession`] is the immutable outcome of one resolution: the query,
//! its ordered match list, and the active position. Sessions are replaced
//! wholesale by the next search; the match list is never mutated in place.
//! [`MatchNavigator`] owns the current session and steps through it with
//! wrapping next/prev.

use crate::resolve::MatchRect;

/// The current query's resolved matches plus navigation position.
///
/// Invariant: `active` is `None` or a valid index into `matches`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSession {
    query: String,
    matches: Vec<MatchRect>,
    active: Option<usize>,
}

impl SearchSession {
    /// Idle session: no query, no matches.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolved session. The first match, if any, starts active.
    pub fn new(query: impl Into<String>, matches: Vec<MatchRect>) -> Self {
        let active = if matches.is_empty() { None } else { Some(0) };
        Self { query: query.into(), matches, active }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[MatchRect] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// No query submitted (or cleared).
    pub fn is_idle(&self) -> bool {
        self.query.is_empty() && self.matches.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_match(&self) -> Option<&MatchRect> {
        self.active.and_then(|index| self.matches.get(index))
    }

    /// Advance to the next match, wrapping. No-op on an empty list.
    pub fn next(&mut self) -> Option<usize> {
        let len = self.matches.len();
        if len == 0 {
            return None;
        }
        let next = match self.active {
            Some(index) => (index + 1) % len,
            None => 0,
        };
        self.active = Some(next);
        self.active
    }

    /// Step back to the previous match, wrapping. No-op on an empty list.
    pub fn prev(&mut self) -> Option<usize> {
        let len = self.matches.len();
        if len == 0 {
            return None;
        }
        let prev = match self.active {
            Some(0) | None => len - 1,
            Some(index) => index - 1,
        };
        self.active = Some(prev);
        self.active
    }

    /// Keep the active position when the list is re-resolved to a new length
    /// (e.g. after a zoom-driven geometry rebuild).
    pub(crate) fn clamp_active(&mut self, preferred: Option<usize>) {
        self.active = match (preferred, self.matches.len()) {
            (_, 0) => None,
            (Some(index), len) => Some(index.min(len - 1)),
            (None, _) => Some(0),
        };
    }
}

/// Steps through the current [`SearchSession`] and keeps external highlight
/// state in sync through an injected clear handler (instead of ambient
/// global callbacks).
#[derive(Default)]
pub struct MatchNavigator {
    session: SearchSession,
    on_clear: Option<Box<dyn FnMut()>>,
}

impl MatchNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler invoked whenever the session is cleared, so the
    /// field-click origin can drop its "current highlight" state.
    pub fn set_clear_handler(&mut self, handler: impl FnMut() + 'static) {
        self.on_clear = Some(Box::new(handler));
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    /// Replace the session wholesale.
    pub fn replace(&mut self, session: SearchSession) -> &SearchSession {
        self.session = session;
        &self.session
    }

    pub fn next(&mut self) -> Option<&MatchRect> {
        self.session.next();
        self.session.active_match()
    }

    pub fn prev(&mut self) -> Option<&MatchRect> {
        self.session.prev();
        self.session.active_match()
    }

    /// Reset to an idle session and notify the clear handler.
    pub fn clear(&mut self) {
        self.session = SearchSession::empty();
        if let Some(handler) = self.on_clear.as_mut() {
            handler();
        }
    }
}

impl std::fmt::Debug for MatchNavigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchNavigator")
            .field("session", &self.session)
            .field("has_clear_handler", &self.on_clear.is_some())
            .finish()
    }
}
