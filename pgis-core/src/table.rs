//! In-memory tabular and geospatial data.
//!
//! [`Table`] is a small column-ordered frame of JSON cells, enough to move CSV
//! extracts and query results in and out of the database. [`GeoTable`] pairs a
//! table with one optional geometry per row and the EPSG code they use.

use std::collections::HashSet;

use geo::{
    Centroid, Geometry, GeometryCollection, MultiLineString, MultiPoint, MultiPolygon, Point,
};
use serde_json::Value;
use thiserror::Error;
use wkt::ToWkt;

use crate::columns::{GeoColumnAction, plan_geo_column, sanitize_tabular};
use crate::{Epsg, GeometryType};

/// Name of the column that records the source row of exploded features.
pub const EXPLODE_COLUMN: &str = "explode";

/// Errors raised while building or reshaping tables.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TableError {
    /// A row did not have one cell per column.
    #[error("row {row} has {found} cells but the table has {expected} columns")]
    RowArity {
        /// Zero-based row index.
        row: usize,
        /// Number of columns.
        expected: usize,
        /// Number of cells in the row.
        found: usize,
    },
    /// Two columns ended up with the same name.
    #[error("duplicate column name {name:?}")]
    DuplicateColumn {
        /// The repeated name.
        name: String,
    },
    /// A referenced column does not exist.
    #[error("no column named {name:?}")]
    MissingColumn {
        /// The requested name.
        name: String,
    },
    /// A coordinate cell could not be read as a number.
    #[error("column {column:?} row {row} holds {value} which is not numeric")]
    NotNumeric {
        /// Column holding the value.
        column: String,
        /// Zero-based row index.
        row: usize,
        /// The offending cell.
        value: Value,
    },
    /// The geometry list did not line up with the attribute rows.
    #[error("{geometries} geometries supplied for {rows} rows")]
    GeometryCount {
        /// Attribute rows.
        rows: usize,
        /// Geometries supplied.
        geometries: usize,
    },
}

/// PostgreSQL column type inferred from cell values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 64-bit integers.
    BigInt,
    /// Double-precision floats.
    Double,
    /// Booleans.
    Boolean,
    /// Anything else.
    Text,
}

impl ColumnType {
    /// SQL type name.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::BigInt => "BIGINT",
            Self::Double => "DOUBLE PRECISION",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
        }
    }

    fn classify(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(number) if number.is_i64() || number.is_u64() => Some(Self::BigInt),
            Value::Number(_) => Some(Self::Double),
            Value::String(text) => Some(Self::classify_text(text.trim())),
            Value::Array(_) | Value::Object(_) => Some(Self::Text),
        }
    }

    fn classify_text(text: &str) -> Self {
        if text.parse::<i64>().is_ok() {
            Self::BigInt
        } else if text.parse::<f64>().is_ok_and(f64::is_finite) {
            Self::Double
        } else if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
            Self::Boolean
        } else {
            Self::Text
        }
    }

    const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::BigInt, Self::BigInt) => Self::BigInt,
            (Self::BigInt | Self::Double, Self::BigInt | Self::Double) => Self::Double,
            (Self::Boolean, Self::Boolean) => Self::Boolean,
            _ => Self::Text,
        }
    }
}

/// Render a cell as the text PostgreSQL should parse, `None` for SQL `NULL`.
#[must_use]
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Column-ordered rows of JSON cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table with the given columns.
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, checking every row has one cell per column.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Append a row.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowArity {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` among the columns.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Cells of the named column, top to bottom.
    pub fn column<'a>(
        &'a self,
        name: &str,
    ) -> Result<impl Iterator<Item = &'a Value> + use<'a>, TableError> {
        let index = self
            .column_index(name)
            .ok_or_else(|| TableError::MissingColumn {
                name: name.to_owned(),
            })?;
        Ok(self.rows.iter().filter_map(move |row| row.get(index)))
    }

    /// Apply [`sanitize_tabular`] to every column name.
    pub fn sanitize_columns(&mut self) -> Result<(), TableError> {
        let renamed: Vec<String> = self.columns.iter().map(|c| sanitize_tabular(c)).collect();
        ensure_unique(&renamed)?;
        self.columns = renamed;
        Ok(())
    }

    /// Infer one SQL type per column from the non-null cells.
    #[must_use]
    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|index| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(index).and_then(ColumnType::classify))
                    .reduce(ColumnType::merge)
                    .unwrap_or(ColumnType::Text)
            })
            .collect()
    }

    fn push_column(&mut self, name: &str, values: impl IntoIterator<Item = Value>) {
        self.columns.push(name.to_owned());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    fn set_or_push_column(&mut self, name: &str, values: Vec<Value>) {
        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    if let Some(cell) = row.get_mut(index) {
                        *cell = value;
                    }
                }
            }
            None => self.push_column(name, values),
        }
    }
}

fn ensure_unique(names: &[String]) -> Result<(), TableError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(TableError::DuplicateColumn { name: name.clone() });
        }
    }
    Ok(())
}

fn numeric(value: &Value) -> Option<Option<f64>> {
    match value {
        Value::Null => Some(None),
        Value::Number(number) => number.as_f64().map(Some),
        Value::String(text) if text.trim().is_empty() => Some(None),
        Value::String(text) => text.trim().parse::<f64>().ok().map(Some),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Attribute rows paired with optional geometries in one EPSG code.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTable {
    attributes: Table,
    geometries: Vec<Option<Geometry<f64>>>,
    epsg: Option<Epsg>,
}

/// A geo table reshaped for writing: cleaned attribute columns plus WKT.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedGeoTable {
    /// Attribute columns after the geo column plan.
    pub attributes: Table,
    /// Well-known text per row, `None` for missing geometries.
    pub wkt: Vec<Option<String>>,
    /// Widest geometry type present.
    pub geometry_type: Option<GeometryType>,
}

impl GeoTable {
    /// Pair attributes with geometries.
    pub fn new(
        attributes: Table,
        geometries: Vec<Option<Geometry<f64>>>,
        epsg: Option<Epsg>,
    ) -> Result<Self, TableError> {
        if attributes.len() != geometries.len() {
            return Err(TableError::GeometryCount {
                rows: attributes.len(),
                geometries: geometries.len(),
            });
        }
        Ok(Self {
            attributes,
            geometries,
            epsg,
        })
    }

    /// Build point geometries from longitude/x and latitude/y columns.
    ///
    /// Cells may be numbers or numeric strings. Empty or null coordinates
    /// leave the row without a geometry.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgis_core::{Epsg, GeoTable, Table};
    /// use serde_json::json;
    ///
    /// # fn main() -> Result<(), pgis_core::TableError> {
    /// let table = Table::from_rows(
    ///     vec!["name".into(), "lon".into(), "lat".into()],
    ///     vec![vec![json!("City Hall"), json!("-75.1636"), json!(39.9526)]],
    /// )?;
    /// let points = GeoTable::spatialize_points(table, "lon", "lat", Epsg(4326))?;
    /// assert_eq!(points.len(), 1);
    /// assert_eq!(points.epsg(), Some(Epsg(4326)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn spatialize_points(
        table: Table,
        x_column: &str,
        y_column: &str,
        epsg: Epsg,
    ) -> Result<Self, TableError> {
        let xs = Self::coordinates(&table, x_column)?;
        let ys = Self::coordinates(&table, y_column)?;
        let geometries = xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| Some(Geometry::Point(Point::new(x?, y?))))
            .collect();
        Self::new(table, geometries, Some(epsg))
    }

    fn coordinates(table: &Table, column: &str) -> Result<Vec<Option<f64>>, TableError> {
        table
            .column(column)?
            .enumerate()
            .map(|(row, value)| {
                numeric(value).ok_or_else(|| TableError::NotNumeric {
                    column: column.to_owned(),
                    row,
                    value: value.clone(),
                })
            })
            .collect()
    }

    /// Attribute rows.
    #[must_use]
    pub const fn attributes(&self) -> &Table {
        &self.attributes
    }

    /// Geometries, one per row.
    #[must_use]
    pub fn geometries(&self) -> &[Option<Geometry<f64>>] {
        &self.geometries
    }

    /// EPSG code of the geometries, if known.
    #[must_use]
    pub const fn epsg(&self) -> Option<Epsg> {
        self.epsg
    }

    /// Declare the EPSG code without transforming coordinates.
    pub const fn set_epsg(&mut self, epsg: Epsg) {
        self.epsg = Some(epsg);
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.geometries.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Widest geometry type among the present geometries.
    #[must_use]
    pub fn geometry_type(&self) -> Option<GeometryType> {
        GeometryType::widest(self.geometries.iter().flatten().map(GeometryType::of))
    }

    /// Remove rows without a geometry.
    #[must_use]
    pub fn drop_null_geometries(self) -> Self {
        let Self {
            attributes,
            geometries,
            epsg,
        } = self;
        let (rows, kept): (Vec<_>, Vec<_>) = attributes
            .rows
            .into_iter()
            .zip(geometries)
            .filter(|(_, geometry)| geometry.is_some())
            .unzip();
        Self {
            attributes: Table {
                columns: attributes.columns,
                rows,
            },
            geometries: kept,
            epsg,
        }
    }

    /// Split multi-part geometries into one row per part.
    ///
    /// Each output row records the index of the row it came from in an
    /// [`EXPLODE_COLUMN`] column.
    #[must_use]
    pub fn explode(self) -> Self {
        let Self {
            mut attributes,
            geometries,
            epsg,
        } = self;
        let sources: Vec<Value> = (0..attributes.rows.len()).map(Value::from).collect();
        attributes.set_or_push_column(EXPLODE_COLUMN, sources);

        let mut rows = Vec::new();
        let mut parts = Vec::new();
        for (row, geometry) in attributes.rows.into_iter().zip(geometries) {
            let split: Vec<Option<Geometry<f64>>> = geometry.map_or_else(
                || vec![None],
                |whole| split_parts(whole).into_iter().map(Some).collect(),
            );
            for part in split {
                rows.push(row.clone());
                parts.push(part);
            }
        }
        Self {
            attributes: Table {
                columns: attributes.columns,
                rows,
            },
            geometries: parts,
            epsg,
        }
    }

    /// Centroid of all geometries as `[y, x]`, or `None` when empty.
    #[must_use]
    pub fn centroid_yx(&self) -> Option<[f64; 2]> {
        let collection: GeometryCollection<f64> =
            self.geometries.iter().flatten().cloned().collect();
        collection.centroid().map(|point| [point.y(), point.x()])
    }

    /// Reshape for writing to PostGIS.
    ///
    /// Attribute columns follow [`plan_geo_column`] and geometries are
    /// rendered as WKT. Single-part geometries are promoted when the widest
    /// type is their multi-part counterpart, so every row fits the column.
    pub fn prepare_for_import(&self) -> Result<PreparedGeoTable, TableError> {
        let plan: Vec<(usize, String)> = self
            .attributes
            .columns
            .iter()
            .enumerate()
            .filter_map(|(index, name)| match plan_geo_column(name) {
                GeoColumnAction::Keep(renamed) => Some((index, renamed)),
                GeoColumnAction::Drop => None,
            })
            .collect();
        let columns: Vec<String> = plan.iter().map(|(_, name)| name.clone()).collect();
        ensure_unique(&columns)?;

        let rows = self
            .attributes
            .rows
            .iter()
            .map(|row| {
                plan.iter()
                    .map(|(index, _)| row.get(*index).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        let geometry_type = self.geometry_type();
        let wkt = self
            .geometries
            .iter()
            .map(|geometry| {
                geometry
                    .as_ref()
                    .map(|shape| promote(shape.clone(), geometry_type).wkt_string())
            })
            .collect();

        Ok(PreparedGeoTable {
            attributes: Table { columns, rows },
            wkt,
            geometry_type,
        })
    }
}

fn promote(geometry: Geometry<f64>, target: Option<GeometryType>) -> Geometry<f64> {
    match (target, geometry) {
        (Some(GeometryType::MultiPoint), Geometry::Point(point)) => {
            Geometry::MultiPoint(MultiPoint::new(vec![point]))
        }
        (Some(GeometryType::MultiLineString), Geometry::LineString(line)) => {
            Geometry::MultiLineString(MultiLineString::new(vec![line]))
        }
        (Some(GeometryType::MultiPolygon), Geometry::Polygon(polygon)) => {
            Geometry::MultiPolygon(MultiPolygon::new(vec![polygon]))
        }
        (_, other) => other,
    }
}

fn split_parts(geometry: Geometry<f64>) -> Vec<Geometry<f64>> {
    match geometry {
        Geometry::MultiPoint(multi) => multi.into_iter().map(Geometry::Point).collect(),
        Geometry::MultiLineString(multi) => multi.into_iter().map(Geometry::LineString).collect(),
        Geometry::MultiPolygon(multi) => multi.into_iter().map(Geometry::Polygon).collect(),
        Geometry::GeometryCollection(collection) => {
            collection.into_iter().flat_map(split_parts).collect()
        }
        single => vec![single],
    }
}
