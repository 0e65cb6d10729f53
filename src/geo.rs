// src/geo.rs

use std::fmt;

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;

/* ---------------- GEO POINT ---------------- */

// A latitude/longitude pair in decimal degrees.
// Construction never fails: a NaN point is representable so that the
// ranker can refuse it explicitly instead of ranking it at distance zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/* ---------------- DOMAIN TYPES ---------------- */

// Latitude or longitude: decides bounds and accepted hemispheres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateKind {
    Latitude,
    Longitude,
}

// Textual coordinate notations accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CoordFormat {
    /// Signed decimal degrees
    Dd,
    /// Degrees, minutes, seconds and hemisphere
    Dms,
    /// Degrees, decimal minutes and hemisphere
    Ddm,
}

impl fmt::Display for CoordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordFormat::Dd => "DD",
            CoordFormat::Dms => "DMS",
            CoordFormat::Ddm => "DDM",
        };
        write!(f, "{s}")
    }
}

// Which part of a textual coordinate could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordField {
    Deg,
    Min,
    Sec,
    Dir,
}

impl fmt::Display for CoordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordField::Deg => "degrees",
            CoordField::Min => "minutes",
            CoordField::Sec => "seconds",
            CoordField::Dir => "direction",
        };
        write!(f, "{s}")
    }
}

// Unsigned components plus hemisphere, before validation.
struct Components {
    deg: f64,
    min: f64,
    sec: f64,
    dir: char,
}

/* ---------------- VALIDATION ---------------- */

#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    #[error("coordinate out of range ({deg}°)")]
    OutOfRange { deg: f64 },
    #[error("invalid degree value ({deg})")]
    InvalidDegree { deg: f64 },
    #[error("invalid minutes value ({min})")]
    InvalidMinutes { min: f64 },
    #[error("invalid seconds value ({sec})")]
    InvalidSeconds { sec: f64 },
    #[error("invalid direction `{0}`")]
    InvalidDirection(char),
}

// Single place where geographic bounds are enforced.
fn to_decimal(c: Components, kind: CoordinateKind) -> Result<f64, CoordError> {
    let eps = 1e-12;

    if c.deg < 0.0 {
        return Err(CoordError::InvalidDegree { deg: c.deg });
    }
    if c.min < 0.0 || c.min >= 60.0 {
        return Err(CoordError::InvalidMinutes { min: c.min });
    }
    if c.sec < 0.0 || c.sec >= 60.0 {
        return Err(CoordError::InvalidSeconds { sec: c.sec });
    }

    let (limit, hemispheres) = match kind {
        CoordinateKind::Latitude => (90.0, "NS"),
        CoordinateKind::Longitude => (180.0, "EWO"),
    };
    if c.deg > limit + eps {
        return Err(CoordError::OutOfRange { deg: c.deg });
    }
    if (c.deg - limit).abs() < eps && (c.min > 0.0 || c.sec > 0.0) {
        return Err(CoordError::OutOfRange { deg: c.deg });
    }
    if !hemispheres.contains(c.dir) {
        return Err(CoordError::InvalidDirection(c.dir));
    }

    let value = c.deg + c.min / 60.0 + c.sec / 3600.0;
    if matches!(c.dir, 'S' | 'W' | 'O') {
        Ok(-value)
    } else {
        Ok(value)
    }
}

/* ---------------- PARSING ---------------- */

// Degrees / minutes / seconds, ASCII or Unicode primes.
static DMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?ix)^\s*
            (.+?)      # degrees
            \s*°\s*
            (.+?)      # minutes
            \s*['′]\s*
            (.+?)      # seconds
            \s*["″]\s*
            (.)        # hemisphere
            \s*$"#,
    )
    .expect("invalid DMS regex")
});

// Degrees / decimal minutes.
static DDM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?ix)^\s*
            (.+?)      # degrees
            \s*°\s*
            (.+?)      # minutes
            \s*['′]\s*
            (.)        # hemisphere
            \s*$"#,
    )
    .expect("invalid DDM regex")
});

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid {format} format")]
    InvalidFormat { format: CoordFormat },
    #[error("invalid {format} field: {field}")]
    InvalidField { format: CoordFormat, field: CoordField },
    #[error("invalid coord ({0})")]
    InvalidCoord(#[from] CoordError),
}

fn number(raw: &str, format: CoordFormat, field: CoordField) -> Result<f64, ParseError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidField { format, field })?;
    if !value.is_finite() {
        return Err(ParseError::InvalidFormat { format });
    }
    Ok(value)
}

fn hemisphere(raw: &str, format: CoordFormat) -> Result<char, ParseError> {
    raw.trim()
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .ok_or(ParseError::InvalidField { format, field: CoordField::Dir })
}

// Reads one latitude or longitude written in `format` and returns
// signed decimal degrees.
pub fn parse_coordinate(
    input: &str,
    kind: CoordinateKind,
    format: CoordFormat,
) -> Result<f64, ParseError> {
    let components = match format {
        CoordFormat::Dd => {
            let signed = number(input, format, CoordField::Deg)?;
            let dir = match (kind, signed.is_sign_negative()) {
                (CoordinateKind::Latitude, false) => 'N',
                (CoordinateKind::Latitude, true) => 'S',
                (CoordinateKind::Longitude, false) => 'E',
                (CoordinateKind::Longitude, true) => 'W',
            };
            Components { deg: signed.abs(), min: 0.0, sec: 0.0, dir }
        }
        CoordFormat::Dms => {
            let caps = DMS_RE
                .captures(input)
                .ok_or(ParseError::InvalidFormat { format })?;
            Components {
                deg: number(&caps[1], format, CoordField::Deg)?,
                min: number(&caps[2], format, CoordField::Min)?,
                sec: number(&caps[3], format, CoordField::Sec)?,
                dir: hemisphere(&caps[4], format)?,
            }
        }
        CoordFormat::Ddm => {
            let caps = DDM_RE
                .captures(input)
                .ok_or(ParseError::InvalidFormat { format })?;
            Components {
                deg: number(&caps[1], format, CoordField::Deg)?,
                min: number(&caps[2], format, CoordField::Min)?,
                sec: 0.0,
                dir: hemisphere(&caps[3], format)?,
            }
        }
    };

    Ok(to_decimal(components, kind)?)
}

pub fn parse_point(lat: &str, lon: &str, format: CoordFormat) -> Result<GeoPoint, ParseError> {
    Ok(GeoPoint::new(
        parse_coordinate(lat, CoordinateKind::Latitude, format)?,
        parse_coordinate(lon, CoordinateKind::Longitude, format)?,
    ))
}

/* ---------------- FORMATTING ---------------- */

// Decimal degrees to DMS text. No validation.
pub fn dd_to_dms(value: f64, kind: CoordinateKind) -> String {
    let dir = match (kind, value >= 0.0) {
        (CoordinateKind::Latitude, true) => 'N',
        (CoordinateKind::Latitude, false) => 'S',
        (CoordinateKind::Longitude, true) => 'E',
        (CoordinateKind::Longitude, false) => 'W',
    };

    let abs = value.abs();
    let deg = abs.floor();
    let min_f = (abs - deg) * 60.0;
    let min = min_f.floor();
    let sec = (min_f - min) * 60.0;

    format!("{}°{}'{:.2}\"{}", deg as i32, min as i32, sec, dir)
}

/* ---------------- TEST ---------------- */
