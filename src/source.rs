// src/source.rs

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use log::{debug, warn};
use serde::Deserialize;

use crate::distance::haversine_km;
use crate::error::SearchError;
use crate::geo::{parse_point, CoordFormat, GeoPoint};
use crate::rank::Candidate;

/* ---------------- CONSTANTES ---------------- */

// Radius used by the places search when none is given.
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 15.0;

const PLACES_HEADERS: &[&str] = &["id", "name", "lat", "lon"];
const GAZETTEER_HEADERS: &[&str] = &["address", "lat", "lon"];

/* ---------------- CONTRACTS ---------------- */

// Where the reference point comes from.
pub trait LocationSource {
    fn locate(&self) -> Result<GeoPoint, SearchError>;
}

// Where unranked candidates come from.
pub trait CandidateSource {
    fn search(&self, center: GeoPoint, radius_km: f64) -> Result<Vec<Candidate>, SearchError>;
}

/* ---------------- DEVICE FIX ---------------- */

// A position fix handed over by the device (or the command line).
// `None` stands for a denied or failed fix.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(Option<GeoPoint>);

impl FixedLocation {
    pub fn new(fix: Option<GeoPoint>) -> Self {
        Self(fix)
    }
}

impl LocationSource for FixedLocation {
    fn locate(&self) -> Result<GeoPoint, SearchError> {
        self.0
            .ok_or_else(|| SearchError::LocationUnavailable("no position fix available".to_string()))
    }
}

/* ---------------- GAZETTEER ---------------- */

fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_headers(headers: &csv::StringRecord, required: &[&str]) -> Result<(), String> {
    let present: HashSet<_> = headers.iter().collect();
    match required.iter().find(|h| !present.contains(**h)) {
        Some(missing) => Err(format!("missing header field '{missing}'")),
        None => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
struct GazetteerRow {
    address: String,
    lat: String,
    lon: String,
}

// Offline address book: free-text address to point.
#[derive(Debug, Default)]
pub struct Gazetteer {
    entries: Vec<(String, GeoPoint)>,
}

impl Gazetteer {
    pub fn from_path(path: impl AsRef<Path>, format: CoordFormat) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SearchError::LocationUnavailable(format!("cannot open gazetteer {}: {e}", path.display()))
        })?;
        Self::from_reader(file, format)
    }

    // Rows that do not parse are skipped; a gazetteer is a lookup table,
    // not a search result.
    pub fn from_reader<R: Read>(input: R, format: CoordFormat) -> Result<Self, SearchError> {
        let unavailable = |e: String| SearchError::LocationUnavailable(format!("gazetteer: {e}"));

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);
        let headers = reader.headers().map_err(|e| unavailable(e.to_string()))?;
        check_headers(headers, GAZETTEER_HEADERS).map_err(unavailable)?;

        let mut entries = Vec::new();
        for (index, row) in reader.deserialize::<GazetteerRow>().enumerate() {
            let line = index + 2;
            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    warn!("gazetteer line {line} ignored: {e}");
                    continue;
                }
            };
            match parse_point(&row.lat, &row.lon, format) {
                Ok(point) => entries.push((normalize_address(&row.address), point)),
                Err(e) => warn!("gazetteer line {line} ignored: {e}"),
            }
        }

        debug!("gazetteer loaded with {} address(es)", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // First entry whose address matches, ignoring case and spacing.
    pub fn geocode(&self, address: &str) -> Result<GeoPoint, SearchError> {
        let wanted = normalize_address(address);
        self.entries
            .iter()
            .find(|(known, _)| *known == wanted)
            .map(|(_, point)| *point)
            .ok_or_else(|| SearchError::GeocodingFailed {
                address: address.to_string(),
            })
    }
}

// An address selected by the user, resolved through a gazetteer.
pub struct AddressQuery<'a> {
    gazetteer: &'a Gazetteer,
    address: String,
}

impl<'a> AddressQuery<'a> {
    pub fn new(gazetteer: &'a Gazetteer, address: impl Into<String>) -> Self {
        Self {
            gazetteer,
            address: address.into(),
        }
    }
}

impl LocationSource for AddressQuery<'_> {
    fn locate(&self) -> Result<GeoPoint, SearchError> {
        self.gazetteer.geocode(&self.address)
    }
}

/* ---------------- PLACES ---------------- */

#[derive(Debug, Deserialize)]
struct PlaceRow {
    id: String,
    name: String,
    lat: String,
    lon: String,
}

// Places search backed by a CSV file loaded once.
#[derive(Debug, Default)]
pub struct CsvPlaces {
    places: Vec<Candidate>,
    skipped: u64,
}

impl CsvPlaces {
    pub fn from_path(
        path: impl AsRef<Path>,
        format: CoordFormat,
        strict: bool,
    ) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SearchError::CandidateFetchFailed(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::from_reader(file, format, strict)
    }

    // Malformed rows are counted and skipped, or fail the load in strict
    // mode. Duplicate ids always fail: ids must be unique in one ranking.
    pub fn from_reader<R: Read>(input: R, format: CoordFormat, strict: bool) -> Result<Self, SearchError> {
        let failed = SearchError::CandidateFetchFailed;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);
        let headers = reader.headers().map_err(|e| failed(e.to_string()))?;
        check_headers(headers, PLACES_HEADERS).map_err(failed)?;

        let mut places = Vec::new();
        let mut seen = HashSet::new();
        let mut skipped = 0;

        for (index, row) in reader.deserialize::<PlaceRow>().enumerate() {
            let line = index + 2;
            let parsed = row
                .map_err(|e| e.to_string())
                .and_then(|r| {
                    parse_point(&r.lat, &r.lon, format)
                        .map(|point| Candidate::new(r.id, r.name, point))
                        .map_err(|e| format!("invalid {format} coordinate ({e})"))
                });

            let candidate = match parsed {
                Ok(c) => c,
                Err(e) if strict => return Err(failed(format!("line {line}: {e}"))),
                Err(e) => {
                    debug!("places line {line} ignored: {e}");
                    skipped += 1;
                    continue;
                }
            };

            if !seen.insert(candidate.id().to_string()) {
                return Err(failed(format!("line {line}: duplicate id '{}'", candidate.id())));
            }
            places.push(candidate);
        }

        if skipped > 0 {
            warn!("{skipped} ignored line(s) in places file");
        }

        Ok(Self { places, skipped })
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl CandidateSource for CsvPlaces {
    fn search(&self, center: GeoPoint, radius_km: f64) -> Result<Vec<Candidate>, SearchError> {
        if !(radius_km.is_finite() && radius_km >= 0.0) {
            return Err(SearchError::CandidateFetchFailed(format!(
                "invalid search radius {radius_km} km"
            )));
        }

        let mut found = Vec::new();
        for place in &self.places {
            let km = haversine_km(center, place.location())
                .map_err(|e| SearchError::CandidateFetchFailed(e.to_string()))?;
            if km <= radius_km {
                found.push(place.clone());
            }
        }

        debug!("{} of {} place(s) within {radius_km} km of {center}", found.len(), self.places.len());
        Ok(found)
    }
}

/* ---------------- TEST ---------------- */

#[cfg(test)]
mod tests {
    use super::*;

    const PLACES: &str = "\
id,name,lat,lon
p1,Downtown Slice,29.7604,-95.3698
p2,Midtown Pie,29.7420,-95.3790
p3,Galveston Crust,29.3013,-94.7977
";

    const GAZETTEER: &str = "\
address,lat,lon
\"901 Bagby St, Houston\",29.7600,-95.3692
Nowhere,not-a-number,0
\"901 Bagby St, Houston\",0,0
";

    #[test]
    fn test_fixed_location() {
        let p = GeoPoint::new(1.0, 2.0);
        assert_eq!(FixedLocation::new(Some(p)).locate(), Ok(p));
        assert!(matches!(
            FixedLocation::new(None).locate(),
            Err(SearchError::LocationUnavailable(_))
        ));
    }

    #[test]
    fn test_gazetteer_first_match_ignores_case_and_spacing() -> Result<(), SearchError> {
        let gazetteer = Gazetteer::from_reader(GAZETTEER.as_bytes(), CoordFormat::Dd)?;
        assert_eq!(gazetteer.len(), 2);

        let query = AddressQuery::new(&gazetteer, "  901 BAGBY st,   houston ");
        assert_eq!(query.locate()?, GeoPoint::new(29.76, -95.3692));
        Ok(())
    }

    #[test]
    fn test_gazetteer_unknown_address() -> Result<(), SearchError> {
        let gazetteer = Gazetteer::from_reader(GAZETTEER.as_bytes(), CoordFormat::Dd)?;
        assert_eq!(
            AddressQuery::new(&gazetteer, "Nowhere").locate(),
            Err(SearchError::GeocodingFailed {
                address: "Nowhere".to_string()
            })
        );
        Ok(())
    }

    #[test]
    fn test_gazetteer_missing_header() {
        let err = Gazetteer::from_reader("name,lat,lon\n".as_bytes(), CoordFormat::Dd).unwrap_err();
        assert!(matches!(err, SearchError::LocationUnavailable(ref m) if m.contains("address")));
    }

    #[test]
    fn test_places_radius_filter_keeps_file_order() -> Result<(), SearchError> {
        let places = CsvPlaces::from_reader(PLACES.as_bytes(), CoordFormat::Dd, true)?;
        assert_eq!(places.len(), 3);

        let houston = GeoPoint::new(29.760427, -95.369804);
        let near = places.search(houston, DEFAULT_SEARCH_RADIUS_KM)?;
        let ids: Vec<&str> = near.iter().map(Candidate::id).collect();
        assert_eq!(ids, ["p1", "p2"]);
        assert!(near.iter().all(|c| c.distance_from_reference().is_none()));

        let wide = places.search(houston, 100.0)?;
        assert_eq!(wide.len(), 3);
        Ok(())
    }

    #[test]
    fn test_places_invalid_radius() -> Result<(), SearchError> {
        let places = CsvPlaces::from_reader(PLACES.as_bytes(), CoordFormat::Dd, true)?;
        assert!(places.search(GeoPoint::new(0.0, 0.0), -1.0).is_err());
        assert!(places.search(GeoPoint::new(0.0, 0.0), f64::NAN).is_err());
        Ok(())
    }

    #[test]
    fn test_places_dms_format() -> Result<(), SearchError> {
        let data = "id,name,lat,lon\nx,Eiffel Pizza,\"48°51'29\"\"N\",\"2°17'40\"\"E\"\n";
        let places = CsvPlaces::from_reader(data.as_bytes(), CoordFormat::Dms, true)?;
        let found = places.search(GeoPoint::new(48.85, 2.29), 5.0)?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_name(), "Eiffel Pizza");
        Ok(())
    }

    #[test]
    fn test_places_bad_rows_skipped_or_fatal() -> Result<(), SearchError> {
        let data = format!("{PLACES}p4,Broken,95.0,-95.0\np5,Short\n");

        let lenient = CsvPlaces::from_reader(data.as_bytes(), CoordFormat::Dd, false)?;
        assert_eq!(lenient.len(), 3);
        assert_eq!(lenient.skipped(), 2);

        let strict = CsvPlaces::from_reader(data.as_bytes(), CoordFormat::Dd, true).unwrap_err();
        assert!(matches!(strict, SearchError::CandidateFetchFailed(ref m) if m.starts_with("line 5")));
        Ok(())
    }

    #[test]
    fn test_places_duplicate_id() {
        let data = format!("{PLACES}p1,Again,29.0,-95.0\n");
        let err = CsvPlaces::from_reader(data.as_bytes(), CoordFormat::Dd, false).unwrap_err();
        assert!(matches!(err, SearchError::CandidateFetchFailed(ref m) if m.contains("duplicate id 'p1'")));
    }

    #[test]
    fn test_places_missing_header() {
        let err = CsvPlaces::from_reader("id,name,lat\n".as_bytes(), CoordFormat::Dd, false).unwrap_err();
        assert!(matches!(err, SearchError::CandidateFetchFailed(ref m) if m.contains("'lon'")));
    }
}
