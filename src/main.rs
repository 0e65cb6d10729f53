// src/main.rs

/*
ARCHITECTURE OVERVIEW

This binary finds the pizza places nearest to the user and points a
compass at the closest one.

High-level flow:
1. Parse CLI arguments (places file, position fix or address, format,
   search radius, output).
2. Load the places CSV (`source`), skipping or rejecting bad rows.
3. Open a search in `session::SearchState` and resolve the reference point:
   - a position fix given as --lat/--lon in the selected format
   - or an address looked up in a gazetteer CSV
4. Ask the places source for candidates within the radius.
5. Feed the answer back into the session, which ranks it (`rank`) and
   keeps only the latest request's result.
6. Write the ranked rows, nearest first, with the compass bearing on the
   nearest row.

Key design choices:
- Distances are a flat equirectangular estimate (69.2 miles per degree),
  fine for places in one city, wrong across continents.
- The search radius is applied with a great-circle distance.
- Every failure is a `SearchError`; the session keeps the previous result
  and the CLI reports the message.
*/

use std::fs::File;
use std::io;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use csv::Writer;
use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;

mod distance;
use crate::distance::round;

mod error;
use crate::error::SearchError;

mod geo;
use crate::geo::dd_to_dms;
use crate::geo::parse_point;
use crate::geo::CoordFormat;
use crate::geo::CoordinateKind;
use crate::geo::GeoPoint;

mod rank;
use crate::rank::Candidate;
use crate::rank::RankedResult;

mod session;
use crate::session::Event;
use crate::session::Outcome;
use crate::session::SearchState;
use crate::session::Transition;

mod source;
use crate::source::AddressQuery;
use crate::source::CandidateSource;
use crate::source::CsvPlaces;
use crate::source::FixedLocation;
use crate::source::Gazetteer;
use crate::source::LocationSource;
use crate::source::DEFAULT_SEARCH_RADIUS_KM;

/* ---------------- CLI ---------------- */

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Places CSV file (id,name,lat,lon)
    #[arg(short, long)]
    places: PathBuf,

    /// Latitude of the position fix
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<String>,

    /// Longitude of the position fix
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<String>,

    /// Address to search around instead of a position fix
    #[arg(short, long, conflicts_with = "lat", requires = "gazetteer")]
    address: Option<String>,

    /// Gazetteer CSV file (address,lat,lon) used to resolve --address
    #[arg(short, long)]
    gazetteer: Option<PathBuf>,

    /// Coordinate format of the fix and of both CSV files
    #[arg(short = 'f', long, value_enum, default_value_t = CoordFormat::Dd)]
    input_format: CoordFormat,

    /// Search radius in kilometers
    #[arg(short, long, default_value_t = DEFAULT_SEARCH_RADIUS_KM)]
    radius_km: f64,

    /// Only write the N nearest places
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    limit: Option<u64>,

    /// Open the details of one place by id
    #[arg(short, long)]
    select: Option<String>,

    /// Output CSV file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Strict mode: stop on the first malformed places row
    #[arg(long)]
    strict: bool,
}

/* ---------------- MAIN ERROR ---------------- */

#[derive(Error, Debug)]
enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Search(#[from] SearchError),
}

/* ---------------- OUTPUT CSV STRUCTS ---------------- */

#[derive(Debug, Serialize)]
struct OutputRecord<'a> {
    rank: usize,
    id: &'a str,
    name: &'a str,
    lat_dd: f64,
    lon_dd: f64,
    lat_dms: String,
    lon_dms: String,
    distance_miles: f64,
    // Only on the nearest row.
    bearing_deg: Option<f64>,
}

/* ---------------- MAIN ---------------- */

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    colog::init();

    let places = CsvPlaces::from_path(&cli.places, cli.input_format, cli.strict)?;
    info!(
        "{} place(s) loaded from {} ({} skipped)",
        places.len(),
        cli.places.display(),
        places.skipped()
    );

    let state = search(&cli, &places)?;
    let Some(ranked) = state.ranked() else {
        return Ok(());
    };

    let sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = Writer::from_writer(sink);
    let limit = cli.limit.map(|n| usize::try_from(n).unwrap_or(usize::MAX));
    let written = write_ranked(&mut writer, ranked, limit)?;
    writer.flush()?;

    debug!("{written} of {} ranked place(s) written", ranked.len());
    Ok(())
}

// Runs one search through the session, then opens the place picked
// with --select. A failed search surfaces the session's notice.
fn search(cli: &Cli, places: &dyn CandidateSource) -> Result<SearchState, SearchError> {
    let (state, request) = SearchState::default().begin_search();
    debug!("latest search is {:?}", state.latest_request());

    let event = match resolve_location(cli)
        .and_then(|location| run_search(location.as_ref(), places, cli.radius_km))
    {
        Ok((reference, candidates)) => Event::Resolved {
            request,
            reference,
            candidates,
        },
        Err(error) => Event::Failed { request, error },
    };

    let Transition { state, outcome } = state.apply(event);
    match outcome {
        Outcome::Updated => {}
        Outcome::Failed(error) => {
            error!("{}", state.notice().unwrap_or("search failed"));
            return Err(error);
        }
        Outcome::Ignored(reason) => {
            warn!("nothing to show: {reason:?}");
            return Ok(state);
        }
    }

    if let (Some(reference), Some(ranked)) = (state.reference(), state.ranked()) {
        if let (Some(nearest), Some(bearing)) = (ranked.nearest(), ranked.bearing_to_nearest_degrees()) {
            info!(
                "nearest to {reference}: {} at {:.2} mi, compass {:.1}°",
                nearest.display_name(),
                nearest.distance_from_reference().unwrap_or_default(),
                bearing
            );
        }
    }

    let Some(id) = &cli.select else {
        return Ok(state);
    };
    let Transition { state, outcome } = state.apply(Event::Select(id.clone()));
    if outcome == Outcome::Updated {
        if let Some(place) = state.selected() {
            let location = place.location();
            info!(
                "{}: {}, {} ({:.2} mi)",
                place.display_name(),
                dd_to_dms(location.latitude(), CoordinateKind::Latitude),
                dd_to_dms(location.longitude(), CoordinateKind::Longitude),
                place.distance_from_reference().unwrap_or_default()
            );
        }
    }
    Ok(state)
}

// Picks the location source selected on the command line.
fn resolve_location(cli: &Cli) -> Result<Box<dyn LocationSource>, SearchError> {
    if let (Some(lat), Some(lon)) = (&cli.lat, &cli.lon) {
        let fix = parse_point(lat, lon, cli.input_format)
            .map_err(|e| SearchError::LocationUnavailable(format!("invalid position fix ({e})")))?;
        return Ok(Box::new(FixedLocation::new(Some(fix))));
    }

    if let (Some(address), Some(path)) = (&cli.address, &cli.gazetteer) {
        let gazetteer = Gazetteer::from_path(path, cli.input_format)?;
        debug!("gazetteer {} holds {} address(es)", path.display(), gazetteer.len());
        let point = AddressQuery::new(&gazetteer, address.as_str()).locate()?;
        return Ok(Box::new(FixedLocation::new(Some(point))));
    }

    Ok(Box::new(FixedLocation::new(None)))
}

// One search: where is the user, what is around.
fn run_search(
    location: &dyn LocationSource,
    places: &dyn CandidateSource,
    radius_km: f64,
) -> Result<(GeoPoint, Vec<Candidate>), SearchError> {
    let reference = location.locate()?;
    debug!("reference point {reference}");
    let candidates = places.search(reference, radius_km)?;
    Ok((reference, candidates))
}

// Serialize ranked rows, nearest first.
fn write_ranked<W: Write>(
    writer: &mut Writer<W>,
    ranked: &RankedResult,
    limit: Option<usize>,
) -> Result<usize, csv::Error> {
    let mut written = 0;
    for (index, candidate) in ranked.iter().take(limit.unwrap_or(usize::MAX)).enumerate() {
        let location = candidate.location();
        let lat = round(location.latitude(), 6);
        let lon = round(location.longitude(), 6);

        writer.serialize(OutputRecord {
            rank: index + 1,
            id: candidate.id(),
            name: candidate.display_name(),
            lat_dd: lat,
            lon_dd: lon,
            lat_dms: dd_to_dms(lat, CoordinateKind::Latitude),
            lon_dms: dd_to_dms(lon, CoordinateKind::Longitude),
            distance_miles: round(candidate.distance_from_reference().unwrap_or_default(), 2),
            bearing_deg: if index == 0 {
                ranked.bearing_to_nearest_degrees().map(|b| round(b, 2))
            } else {
                None
            },
        })?;
        written += 1;
    }
    Ok(written)
}

/* ---------------- TEST ---------------- */
