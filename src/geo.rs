//! Point geometry codec.
//!
//! Checkpoint locations come back from PostGIS in one of three shapes depending
//! on how the column was selected and which protocol format the driver used:
//! raw WKB bytes, the same WKB rendered as hex, or `ST_AsText` output such as
//! `POINT(12.5 41.9)`. [`decode`] sniffs the shape with hex-decodability as the
//! only discriminator; [`encode`] always emits SRID-qualified text for writes.

use thiserror::Error;

/// The only spatial reference this crate reads or writes (WGS84 lon/lat).
pub const SRID: u32 = 4326;

const WKB_POINT: u32 = 1;
const EWKB_SRID_FLAG: u32 = 0x2000_0000;
const WKB_POINT_LEN: usize = 1 + 4 + 8 + 8;

/// An immutable longitude/latitude pair in SRID 4326.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    lon: f64,
    lat: f64,
}

impl Point {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Builds a point from client input, rejecting non-finite or out-of-range
    /// coordinates.
    pub fn checked(lon: f64, lat: f64) -> Result<Self, CoordinateError> {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        Ok(Self { lon, lat })
    }

    pub const fn lon(&self) -> f64 {
        self.lon
    }

    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// `[lat, lng]`, the order map widgets expect.
    pub const fn lat_lng(&self) -> [f64; 2] {
        [self.lat, self.lon]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
}

/// A location value as handed over by the data store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawGeometry<'a> {
    Null,
    Bytes(&'a [u8]),
    Text(&'a str),
    /// Any other value shape; carries a type name for the error message.
    Other(&'static str),
}

impl<'a> From<Option<&'a str>> for RawGeometry<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

impl<'a> From<&'a serde_json::Value> for RawGeometry<'a> {
    fn from(value: &'a serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Bool(_) => Self::Other("bool"),
            serde_json::Value::Number(_) => Self::Other("number"),
            serde_json::Value::Array(_) => Self::Other("array"),
            serde_json::Value::Object(_) => Self::Other("object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("cannot decode a {0} value into a point")]
    UnsupportedType(&'static str),
    #[error("malformed point text {0:?}")]
    MalformedText(String),
    #[error("malformed point binary: {0}")]
    MalformedBinary(&'static str),
}

/// Decodes a stored location. `Null` yields `Ok(None)`, never an error.
pub fn decode(raw: RawGeometry<'_>) -> Result<Option<Point>, DecodeError> {
    match raw {
        RawGeometry::Null => Ok(None),
        RawGeometry::Bytes(bytes) => match hex::decode(bytes) {
            Ok(decoded) => parse_wkb(&decoded).map(Some),
            Err(_) => parse_wkb(bytes).map(Some),
        },
        RawGeometry::Text(text) => match hex::decode(text) {
            Ok(decoded) => parse_wkb(&decoded).map(Some),
            Err(_) => parse_wkt(text).map(Some),
        },
        RawGeometry::Other(kind) => Err(DecodeError::UnsupportedType(kind)),
    }
}

/// Canonical write form: `SRID=4326;POINT(<lon> <lat>)`.
pub fn encode(point: Point) -> String {
    format!("SRID={SRID};POINT({} {})", point.lon, point.lat)
}

/// Parses a WKB point, also accepting the PostGIS EWKB variant that carries
/// an embedded SRID.
fn parse_wkb(buf: &[u8]) -> Result<Point, DecodeError> {
    let (&order, rest) = buf
        .split_first()
        .ok_or(DecodeError::MalformedBinary("empty buffer"))?;
    let little = match order {
        0 => false,
        1 => true,
        _ => return Err(DecodeError::MalformedBinary("invalid byte order flag")),
    };
    let mut reader = WkbReader { buf: rest, little };

    let type_tag = reader.u32()?;
    if type_tag & EWKB_SRID_FLAG != 0 {
        if reader.u32()? != SRID {
            return Err(DecodeError::MalformedBinary("unsupported srid"));
        }
    } else if buf.len() != WKB_POINT_LEN {
        return Err(DecodeError::MalformedBinary("unexpected length"));
    }
    if type_tag & !EWKB_SRID_FLAG != WKB_POINT {
        return Err(DecodeError::MalformedBinary("geometry is not a point"));
    }

    let lon = reader.f64()?;
    let lat = reader.f64()?;
    if !reader.buf.is_empty() {
        return Err(DecodeError::MalformedBinary("trailing bytes"));
    }
    if !lon.is_finite() || !lat.is_finite() {
        return Err(DecodeError::MalformedBinary("non-finite coordinate"));
    }
    Ok(Point::new(lon, lat))
}

struct WkbReader<'a> {
    buf: &'a [u8],
    little: bool,
}

impl WkbReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        if self.buf.len() < N {
            return Err(DecodeError::MalformedBinary("truncated buffer"));
        }
        let (head, tail) = self.buf.split_at(N);
        self.buf = tail;
        head.try_into()
            .map_err(|_| DecodeError::MalformedBinary("truncated buffer"))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take::<4>()?;
        Ok(if self.little {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        let bytes = self.take::<8>()?;
        Ok(if self.little {
            f64::from_le_bytes(bytes)
        } else {
            f64::from_be_bytes(bytes)
        })
    }
}

/// Parses `POINT(<lon> <lat>)`, optionally prefixed with `SRID=4326;` so that
/// [`encode`] output reads back.
fn parse_wkt(text: &str) -> Result<Point, DecodeError> {
    let malformed = || DecodeError::MalformedText(text.to_string());

    let body = match text.strip_prefix("SRID=") {
        Some(rest) => {
            let (srid, wkt) = rest.split_once(';').ok_or_else(malformed)?;
            if srid.parse::<u32>().ok() != Some(SRID) {
                return Err(malformed());
            }
            wkt
        }
        None => text,
    };

    let inner = body
        .strip_prefix("POINT(")
        .and_then(|s| s.trim_end().strip_suffix(')'))
        .ok_or_else(malformed)?;

    let mut coords = inner.split_whitespace().map(str::parse::<f64>);
    let (Some(Ok(lon)), Some(Ok(lat)), None) = (coords.next(), coords.next(), coords.next())
    else {
        return Err(malformed());
    };
    if !lon.is_finite() || !lat.is_finite() {
        return Err(malformed());
    }
    Ok(Point::new(lon, lat))
}
