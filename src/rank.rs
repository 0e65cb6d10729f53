// src/rank.rs

use crate::distance::{bearing_degrees, equirectangular_miles};
use crate::error::SearchError;
use crate::geo::GeoPoint;

/* ---------------- DOMAIN TYPES ---------------- */

// One place returned by a search.
// `distance_from_reference` stays `None` until the ranker fills it in.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    id: String,
    display_name: String,
    location: GeoPoint,
    distance_from_reference: Option<f64>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            location,
            distance_from_reference: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    // Miles, as estimated by the ranker.
    pub fn distance_from_reference(&self) -> Option<f64> {
        self.distance_from_reference
    }
}

// Candidates ordered nearest first, plus the compass angle towards the
// nearest one. The bearing is `None` exactly when there are no candidates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RankedResult {
    candidates: Vec<Candidate>,
    bearing_to_nearest_degrees: Option<f64>,
}

impl RankedResult {
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn nearest(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn bearing_to_nearest_degrees(&self) -> Option<f64> {
        self.bearing_to_nearest_degrees
    }

    pub fn get(&self, id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }
}

impl<'a> IntoIterator for &'a RankedResult {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/* ---------------- RANKING ---------------- */

fn check_finite(subject: &str, point: GeoPoint) -> Result<(), SearchError> {
    if point.is_finite() {
        return Ok(());
    }
    Err(SearchError::InvalidCoordinate {
        subject: subject.to_string(),
        latitude: point.latitude(),
        longitude: point.longitude(),
    })
}

// Orders `candidates` by equirectangular distance from `reference`.
//
// Every candidate comes back, in ascending distance; equal distances keep
// their input order. Any non-finite coordinate, in the reference or in a
// candidate, fails the whole ranking.
pub fn rank(reference: GeoPoint, candidates: Vec<Candidate>) -> Result<RankedResult, SearchError> {
    check_finite("reference point", reference)?;

    let mut ranked = Vec::with_capacity(candidates.len());
    for mut candidate in candidates {
        check_finite(&format!("candidate '{}'", candidate.id), candidate.location)?;
        candidate.distance_from_reference = Some(equirectangular_miles(reference, candidate.location));
        ranked.push(candidate);
    }

    // Stable: ties stay in input order.
    ranked.sort_by(|a, b| {
        let da = a.distance_from_reference.unwrap_or(f64::INFINITY);
        let db = b.distance_from_reference.unwrap_or(f64::INFINITY);
        da.total_cmp(&db)
    });

    let bearing_to_nearest_degrees = ranked
        .first()
        .map(|nearest| bearing_degrees(reference, nearest.location));

    Ok(RankedResult {
        candidates: ranked,
        bearing_to_nearest_degrees,
    })
}

/* ---------------- TEST ---------------- */
