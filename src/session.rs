// src/session.rs

use std::fmt;
use std::rc::Rc;

use log::{debug, warn};

use crate::error::SearchError;
use crate::geo::GeoPoint;
use crate::rank::{rank, Candidate, RankedResult};

/* ---------------- REQUESTS ---------------- */

// Tag of one search, strictly increasing within a `SearchState` lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// Something that happened to the search screen.
#[derive(Debug, Clone)]
pub enum Event {
    // The collaborators answered for `request`.
    Resolved {
        request: RequestId,
        reference: GeoPoint,
        candidates: Vec<Candidate>,
    },
    // Locating or searching failed for `request`.
    Failed {
        request: RequestId,
        error: SearchError,
    },
    Select(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IgnoreReason {
    Stale { request: RequestId, latest: RequestId },
    UnknownMarker(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Updated,
    Ignored(IgnoreReason),
    Failed(SearchError),
}

/* ---------------- STATE ---------------- */

// Everything the search screen shows. Never mutated: every event yields
// a new value, and a new ranking replaces the old one as a whole.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    issued: u64,
    reference: Option<GeoPoint>,
    ranked: Option<Rc<RankedResult>>,
    selected: Option<String>,
    notice: Option<String>,
}

pub struct Transition {
    pub state: SearchState,
    pub outcome: Outcome,
}

impl SearchState {
    pub fn reference(&self) -> Option<GeoPoint> {
        self.reference
    }

    pub fn ranked(&self) -> Option<&Rc<RankedResult>> {
        self.ranked.as_ref()
    }

    pub fn selected(&self) -> Option<&Candidate> {
        let id = self.selected.as_deref()?;
        self.ranked.as_ref()?.get(id)
    }

    // User-facing message left by the last failed search, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn latest_request(&self) -> Option<RequestId> {
        (self.issued > 0).then_some(RequestId(self.issued))
    }

    // Issues the tag for a new search; older tags become stale.
    pub fn begin_search(&self) -> (SearchState, RequestId) {
        let request = RequestId(self.issued + 1);
        debug!("search {request} started");
        let state = SearchState {
            issued: request.0,
            ..self.clone()
        };
        (state, request)
    }

    pub fn apply(&self, event: Event) -> Transition {
        match event {
            Event::Resolved { request, reference, candidates } => {
                if let Some(stale) = self.stale(request) {
                    return self.ignore(stale);
                }
                if candidates.is_empty() {
                    return self.fail(SearchError::CandidateFetchFailed(format!(
                        "no results near {reference}"
                    )));
                }
                match rank(reference, candidates) {
                    Ok(ranked) => Transition {
                        state: SearchState {
                            issued: self.issued,
                            reference: Some(reference),
                            ranked: Some(Rc::new(ranked)),
                            selected: None,
                            notice: None,
                        },
                        outcome: Outcome::Updated,
                    },
                    Err(error) => self.fail(error),
                }
            }
            Event::Failed { request, error } => match self.stale(request) {
                Some(stale) => self.ignore(stale),
                None => self.fail(error),
            },
            Event::Select(id) => {
                let known = self.ranked.as_ref().is_some_and(|r| r.get(&id).is_some());
                if !known {
                    return self.ignore(IgnoreReason::UnknownMarker(id));
                }
                Transition {
                    state: SearchState {
                        selected: Some(id),
                        ..self.clone()
                    },
                    outcome: Outcome::Updated,
                }
            }
        }
    }

    fn stale(&self, request: RequestId) -> Option<IgnoreReason> {
        let latest = RequestId(self.issued);
        (request < latest).then_some(IgnoreReason::Stale { request, latest })
    }

    fn ignore(&self, reason: IgnoreReason) -> Transition {
        warn!("event ignored: {reason:?}");
        Transition {
            state: self.clone(),
            outcome: Outcome::Ignored(reason),
        }
    }

    // Keeps whatever was on screen and records the message.
    fn fail(&self, error: SearchError) -> Transition {
        warn!("search failed: {error}");
        Transition {
            state: SearchState {
                notice: Some(error.to_string()),
                ..self.clone()
            },
            outcome: Outcome::Failed(error),
        }
    }
}

/* ---------------- TEST ---------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn pizzas() -> Vec<Candidate> {
        vec![
            Candidate::new("far", "Far Pies", GeoPoint::new(0.0, 1.0)),
            Candidate::new("near", "Near Slices", GeoPoint::new(0.0, 0.1)),
        ]
    }

    fn resolved(request: RequestId, candidates: Vec<Candidate>) -> Event {
        Event::Resolved {
            request,
            reference: GeoPoint::new(0.0, 0.0),
            candidates,
        }
    }

    #[test]
    fn test_request_ids_increase() {
        let state = SearchState::default();
        assert_eq!(state.latest_request(), None);
        let (state, first) = state.begin_search();
        let (state, second) = state.begin_search();
        assert!(first < second);
        assert_eq!(state.latest_request(), Some(second));
    }

    #[test]
    fn test_resolved_search_replaces_result() {
        let (state, request) = SearchState::default().begin_search();
        let t = state.apply(resolved(request, pizzas()));
        assert_eq!(t.outcome, Outcome::Updated);

        let ranked = t.state.ranked().unwrap();
        assert_eq!(ranked.nearest().map(Candidate::id), Some("near"));
        assert_eq!(t.state.reference(), Some(GeoPoint::new(0.0, 0.0)));
        assert!(t.state.notice().is_none());
        // The input state is untouched.
        assert!(state.ranked().is_none());
    }

    #[test]
    fn test_out_of_order_completion_keeps_latest() {
        let state = SearchState::default();
        let (state, old) = state.begin_search();
        let (state, new) = state.begin_search();

        let newer = vec![Candidate::new("new", "New", GeoPoint::new(1.0, 1.0))];
        let t = state.apply(resolved(new, newer));
        assert_eq!(t.outcome, Outcome::Updated);

        let late = t.state.apply(resolved(old, pizzas()));
        assert_eq!(
            late.outcome,
            Outcome::Ignored(IgnoreReason::Stale { request: old, latest: new })
        );
        assert_eq!(late.state.ranked().unwrap().nearest().map(Candidate::id), Some("new"));
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let (state, old) = SearchState::default().begin_search();
        let (state, _new) = state.begin_search();
        let t = state.apply(Event::Failed {
            request: old,
            error: SearchError::LocationUnavailable("denied".to_string()),
        });
        assert!(matches!(t.outcome, Outcome::Ignored(IgnoreReason::Stale { .. })));
        assert!(t.state.notice().is_none());
    }

    #[test]
    fn test_failure_keeps_previous_result() {
        let (state, first) = SearchState::default().begin_search();
        let shown = state.apply(resolved(first, pizzas())).state;

        let (state, second) = shown.begin_search();
        let t = state.apply(Event::Failed {
            request: second,
            error: SearchError::GeocodingFailed { address: "Atlantis".to_string() },
        });
        assert!(matches!(t.outcome, Outcome::Failed(SearchError::GeocodingFailed { .. })));
        assert!(t.state.notice().unwrap().contains("Atlantis"));
        assert!(Rc::ptr_eq(t.state.ranked().unwrap(), shown.ranked().unwrap()));
    }

    #[test]
    fn test_empty_results_fail_without_clearing() {
        let (state, first) = SearchState::default().begin_search();
        let shown = state.apply(resolved(first, pizzas())).state;

        let (state, second) = shown.begin_search();
        let t = state.apply(resolved(second, Vec::new()));
        assert!(matches!(t.outcome, Outcome::Failed(SearchError::CandidateFetchFailed(_))));
        assert_eq!(t.state.ranked().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_coordinate_surfaces_as_failure() {
        let (state, request) = SearchState::default().begin_search();
        let t = state.apply(Event::Resolved {
            request,
            reference: GeoPoint::new(f64::NAN, 0.0),
            candidates: pizzas(),
        });
        assert!(matches!(t.outcome, Outcome::Failed(SearchError::InvalidCoordinate { .. })));
        assert!(t.state.ranked().is_none());
    }

    #[test]
    fn test_selection() {
        let (state, request) = SearchState::default().begin_search();
        let state = state.apply(resolved(request, pizzas())).state;

        let unknown = state.apply(Event::Select("nope".to_string()));
        assert_eq!(
            unknown.outcome,
            Outcome::Ignored(IgnoreReason::UnknownMarker("nope".to_string()))
        );

        let picked = state.apply(Event::Select("far".to_string())).state;
        assert_eq!(picked.selected().map(Candidate::display_name), Some("Far Pies"));
    }

    #[test]
    fn test_new_result_clears_selection() {
        let (state, first) = SearchState::default().begin_search();
        let state = state.apply(resolved(first, pizzas())).state;
        let state = state.apply(Event::Select("near".to_string())).state;

        let (state, second) = state.begin_search();
        let state = state.apply(resolved(second, pizzas())).state;
        assert!(state.selected().is_none());
    }
}
