//! Coordinate reference systems and PostGIS geometry types.

use std::{fmt, str::FromStr};

use geo::Geometry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An EPSG code identifying a coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epsg(pub u32);

/// WGS 84 longitude/latitude.
pub const WGS84: Epsg = Epsg(4326);

/// Error returned when a CRS description carries no EPSG code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot read an EPSG code from CRS {crs:?}")]
pub struct CrsParseError {
    /// The CRS text that failed to parse.
    pub crs: String,
}

impl Epsg {
    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Parse an EPSG code from a CRS description.
    ///
    /// Accepts `epsg:4326`, `EPSG:2272`, proj-style `+init=epsg:4326 +no_defs`
    /// and bare integers.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgis_core::Epsg;
    ///
    /// assert_eq!(Epsg::parse_crs("+init=epsg:2272 +no_defs"), Ok(Epsg(2272)));
    /// assert_eq!(Epsg::parse_crs("4326"), Ok(Epsg(4326)));
    /// assert!(Epsg::parse_crs("WGS 84").is_err());
    /// ```
    pub fn parse_crs(crs: &str) -> Result<Self, CrsParseError> {
        let error = || CrsParseError {
            crs: crs.to_owned(),
        };
        let first = crs.split_whitespace().next().ok_or_else(error)?;
        let code = match first.rsplit_once(':') {
            Some((authority, code)) if authority.to_lowercase().ends_with("epsg") => code,
            Some(_) => return Err(error()),
            None => first,
        };
        code.parse::<u32>().map(Self).map_err(|_| error())
    }
}

impl fmt::Display for Epsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Epsg {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_crs(s)
    }
}

/// Geometry types accepted in a `geometry(type, srid)` column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GeometryType {
    /// `POINT`
    Point,
    /// `LINESTRING`
    LineString,
    /// `POLYGON`
    Polygon,
    /// `MULTIPOINT`
    MultiPoint,
    /// `MULTILINESTRING`
    MultiLineString,
    /// `MULTIPOLYGON`
    MultiPolygon,
    /// `GEOMETRYCOLLECTION`
    GeometryCollection,
}

/// Error returned when parsing an unknown geometry type name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown geometry type {0:?}")]
pub struct ParseGeometryTypeError(pub String);

impl GeometryType {
    /// Upper-case PostGIS spelling.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::Polygon => "POLYGON",
            Self::MultiPoint => "MULTIPOINT",
            Self::MultiLineString => "MULTILINESTRING",
            Self::MultiPolygon => "MULTIPOLYGON",
            Self::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }

    /// PostGIS type of a `geo` geometry.
    ///
    /// Lines, rectangles and triangles have no PostGIS counterpart and map to
    /// the type they are written as.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => Self::Point,
            Geometry::Line(_) | Geometry::LineString(_) => Self::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => Self::Polygon,
            Geometry::MultiPoint(_) => Self::MultiPoint,
            Geometry::MultiLineString(_) => Self::MultiLineString,
            Geometry::MultiPolygon(_) => Self::MultiPolygon,
            Geometry::GeometryCollection(_) => Self::GeometryCollection,
        }
    }

    /// The type with the longest name among `types`.
    ///
    /// A layer holding both `POLYGON` and `MULTIPOLYGON` features resolves to
    /// `MULTIPOLYGON`, which PostGIS accepts for both once promoted. Ties keep
    /// the first type seen.
    pub fn widest(types: impl IntoIterator<Item = Self>) -> Option<Self> {
        types.into_iter().fold(None, |best, candidate| match best {
            Some(current) if current.as_sql().len() >= candidate.as_sql().len() => Some(current),
            _ => Some(candidate),
        })
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for GeometryType {
    type Err = ParseGeometryTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POINT" => Ok(Self::Point),
            "LINESTRING" => Ok(Self::LineString),
            "POLYGON" => Ok(Self::Polygon),
            "MULTIPOINT" => Ok(Self::MultiPoint),
            "MULTILINESTRING" => Ok(Self::MultiLineString),
            "MULTIPOLYGON" => Ok(Self::MultiPolygon),
            "GEOMETRYCOLLECTION" => Ok(Self::GeometryCollection),
            other => Err(ParseGeometryTypeError(other.to_owned())),
        }
    }
}
