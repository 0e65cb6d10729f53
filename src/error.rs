// src/error.rs

use thiserror::Error;

// Failures of one search, from locating the user to ranking results.
// None of them is fatal: the caller shows the message and keeps the
// previous result on screen.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("invalid coordinate for {subject}: ({latitude}, {longitude})")]
    InvalidCoordinate {
        subject: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("could not resolve address '{address}'")]
    GeocodingFailed { address: String },

    #[error("candidate search failed: {0}")]
    CandidateFetchFailed(String),
}
