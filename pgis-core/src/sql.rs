//! SQL statement builders.
//!
//! Every statement the database wrapper issues is assembled here so it can be
//! inspected without a server. Names arrive as [`Identifier`]s and numbers as
//! typed values; the only free-form text accepted is a caller-supplied
//! `SELECT` used to seed a new table.

use thiserror::Error;

use crate::{ColumnType, Epsg, GeometryType, Identifier, IdentifierError};

/// Name of the geometry column managed by this crate.
pub const GEOM_COLUMN: &str = "geom";

/// `$1`: database name. Case-insensitive, as PostgreSQL folds unquoted names.
pub const DATABASE_EXISTS: &str = "SELECT EXISTS(
    SELECT datname FROM pg_catalog.pg_database
    WHERE lower(datname) = lower($1)
)";

/// `$1`: table name in the `public` schema.
pub const TABLE_EXISTS: &str = "SELECT EXISTS(
    SELECT 1 FROM information_schema.tables
    WHERE table_schema = 'public' AND table_name = $1
)";

/// Install PostGIS into the connected database.
pub const CREATE_POSTGIS: &str = "CREATE EXTENSION IF NOT EXISTS postgis";

/// Table names in the `public` schema.
pub const LIST_TABLES: &str = "SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = 'public'
    ORDER BY table_name";

/// Spatial tables in the `public` schema with their SRID.
pub const LIST_SPATIAL_TABLES: &str = "SELECT f_table_name::text, srid
    FROM geometry_columns
    WHERE f_table_schema = 'public'
    ORDER BY f_table_name";

/// Non-template databases on the cluster.
pub const LIST_DATABASES: &str = "SELECT datname::text
    FROM pg_catalog.pg_database
    WHERE NOT datistemplate
    ORDER BY datname";

/// Errors raised while assembling statements.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlError {
    /// A derived name (such as an index name) was not a valid identifier.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// Hexagon sizes must be finite and positive.
    #[error("hexagon size must be a positive finite number, got {0}")]
    HexagonSize(f64),
    /// The seed query was empty.
    #[error("query must not be empty")]
    EmptyQuery,
}

/// Quote an arbitrary column name, doubling embedded quotes.
///
/// # Examples
///
/// ```
/// use pgis_core::sql::quote_ident;
///
/// assert_eq!(quote_ident("1/22/20"), "\"1/22/20\"");
/// assert_eq!(quote_ident("say \"hi\""), "\"say \"\"hi\"\"\"");
/// ```
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn trimmed_query(query: &str) -> Result<&str, SqlError> {
    let trimmed = query.trim().trim_end_matches(';').trim_end();
    if trimmed.is_empty() {
        Err(SqlError::EmptyQuery)
    } else {
        Ok(trimmed)
    }
}

/// `CREATE DATABASE`.
#[must_use]
pub fn create_database(database: &Identifier) -> String {
    format!("CREATE DATABASE {}", database.quoted())
}

/// `DROP DATABASE`.
#[must_use]
pub fn drop_database(database: &Identifier) -> String {
    format!("DROP DATABASE {}", database.quoted())
}

/// `DROP TABLE IF EXISTS`.
#[must_use]
pub fn drop_table(table: &Identifier) -> String {
    format!("DROP TABLE IF EXISTS {}", table.quoted())
}

/// Remove rows of `table` that have no geometry.
#[must_use]
pub fn delete_null_geometries(table: &Identifier) -> String {
    format!(
        "DELETE FROM {} WHERE {GEOM_COLUMN} IS NULL",
        table.quoted()
    )
}

/// Number of rows in `table`.
#[must_use]
pub fn row_count(table: &Identifier) -> String {
    format!("SELECT COUNT(*) FROM {}", table.quoted())
}

/// Replace any `uid` column with a `serial` primary key.
#[must_use]
pub fn add_uid_column(table: &Identifier) -> String {
    format!(
        "ALTER TABLE {table} DROP COLUMN IF EXISTS uid;\n\
         ALTER TABLE {table} ADD uid serial PRIMARY KEY;",
        table = table.quoted()
    )
}

/// Drop the primary-key constraint of `table`, whatever it is called.
///
/// `ogr2ogr` makes its feature id column the primary key, which must go
/// before [`add_uid_column`] can add another.
#[must_use]
pub fn drop_primary_key(table: &Identifier) -> String {
    format!(
        "DO $$\n\
         DECLARE pk text;\n\
         BEGIN\n\
         SELECT conname INTO pk FROM pg_constraint \
         WHERE conrelid = '{table}'::regclass AND contype = 'p';\n\
         IF pk IS NOT NULL THEN\n\
         EXECUTE format('ALTER TABLE %s DROP CONSTRAINT %I', '{table}', pk);\n\
         END IF;\n\
         END $$;",
        table = table.quoted()
    )
}

/// GiST index named `gix_{table}` on the `geom` column.
pub fn add_spatial_index(table: &Identifier) -> Result<String, SqlError> {
    let index = table.prefixed("gix_")?;
    Ok(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} USING GIST ({GEOM_COLUMN})",
        index.quoted(),
        table.quoted()
    ))
}

/// Reproject the `geom` column from `old` to `new`.
///
/// The old SRID is stamped onto the stored geometries first, which lets this
/// repair tables whose SRID was never recorded.
#[must_use]
pub fn reproject(table: &Identifier, old: Epsg, new: Epsg, geometry_type: GeometryType) -> String {
    format!(
        "ALTER TABLE {table}
    ALTER COLUMN {GEOM_COLUMN} TYPE geometry({geometry_type}, {new})
    USING ST_Transform(ST_SetSRID({GEOM_COLUMN}, {old}), {new})",
        table = table.quoted(),
        new = new.code(),
        old = old.code(),
    )
}

/// Replace `table` with the result of `query`.
pub fn create_table_as(table: &Identifier, query: &str) -> Result<String, SqlError> {
    Ok(format!(
        "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} AS {query};",
        table = table.quoted(),
        query = trimmed_query(query)?,
    ))
}

/// Pin the `geom` column of `table` to one type and SRID.
#[must_use]
pub fn set_geometry_type(table: &Identifier, geometry_type: GeometryType, epsg: Epsg) -> String {
    format!(
        "ALTER TABLE {table}
    ALTER COLUMN {GEOM_COLUMN} TYPE geometry({geometry_type}, {epsg})
    USING ST_SetSRID({GEOM_COLUMN}, {epsg})",
        table = table.quoted(),
        epsg = epsg.code(),
    )
}

/// Build a hexagon grid over the features of `cover`.
///
/// Features are transformed to `epsg`, a grid of hexagons with edge length
/// `size` (in `epsg` units) is laid over their extent, and only hexagons that
/// touch a feature are kept.
pub fn hexagon_overlay(
    table: &Identifier,
    cover: &Identifier,
    epsg: Epsg,
    size: f64,
) -> Result<String, SqlError> {
    if !(size.is_finite() && size > 0.0) {
        return Err(SqlError::HexagonSize(size));
    }
    Ok(format!(
        "DROP TABLE IF EXISTS {table};
CREATE TABLE {table} AS
WITH cover AS (
    SELECT ST_Transform({GEOM_COLUMN}, {epsg}) AS geom FROM {cover}
)
SELECT hex.geom::geometry(POLYGON, {epsg}) AS geom
FROM ST_HexagonGrid(
    {size},
    (SELECT ST_SetSRID(ST_Extent(geom)::geometry, {epsg}) FROM cover)
) AS hex
WHERE EXISTS (
    SELECT 1 FROM cover WHERE ST_Intersects(cover.geom, hex.geom)
);",
        table = table.quoted(),
        cover = cover.quoted(),
        epsg = epsg.code(),
    ))
}

/// `CREATE TABLE` with one typed column per entry.
#[must_use]
pub fn create_table(table: &Identifier, columns: &[(String, ColumnType)]) -> String {
    let definitions = columns
        .iter()
        .map(|(name, kind)| format!("{} {}", quote_ident(name), kind.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({definitions})", table.quoted())
}

/// `CREATE TABLE` for a geo import: `gid`, the attributes, then `geom`.
#[must_use]
pub fn create_geo_table(
    table: &Identifier,
    columns: &[(String, ColumnType)],
    geometry_type: GeometryType,
    epsg: Epsg,
) -> String {
    let mut definitions = vec![String::from("gid BIGINT")];
    definitions.extend(
        columns
            .iter()
            .map(|(name, kind)| format!("{} {}", quote_ident(name), kind.as_sql())),
    );
    definitions.push(format!(
        "{GEOM_COLUMN} geometry({geometry_type}, {})",
        epsg.code()
    ));
    format!("CREATE TABLE {} ({})", table.quoted(), definitions.join(", "))
}

/// `COPY ... FROM STDIN` in CSV format for the listed columns.
///
/// Empty fields load as `NULL` whether or not they are quoted.
#[must_use]
pub fn copy_from_stdin(table: &Identifier, columns: &[String]) -> String {
    format!(
        "COPY {table} ({columns}) FROM STDIN WITH (FORMAT csv, FORCE_NULL ({columns}))",
        table = table.quoted(),
        columns = column_list(columns),
    )
}

/// Wrap `query` so each row comes back as one JSON object in column order.
pub fn json_rows(query: &str) -> Result<String, SqlError> {
    let inner = trimmed_query(query)?;
    Ok(format!("SELECT row_to_json(q)::text FROM ({inner}) AS q"))
}

/// Wrap `query` so each row comes back as JSON attributes, WKT and SRID.
pub fn geo_rows(query: &str, geom_column: &Identifier) -> Result<String, SqlError> {
    let inner = trimmed_query(query)?;
    let geom = geom_column.quoted();
    Ok(format!(
        "SELECT row_to_json(q)::text, ST_AsText(q.{geom}), ST_SRID(q.{geom}) FROM ({inner}) AS q"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn roads() -> Identifier {
        Identifier::new("philly_vz_hin_2017").expect("valid identifier")
    }

    #[rstest]
    fn uid_column_replaces_existing_one(roads: Identifier) {
        assert_eq!(
            add_uid_column(&roads),
            "ALTER TABLE \"philly_vz_hin_2017\" DROP COLUMN IF EXISTS uid;\n\
             ALTER TABLE \"philly_vz_hin_2017\" ADD uid serial PRIMARY KEY;"
        );
    }

    #[rstest]
    fn primary_key_is_dropped_by_catalog_lookup(roads: Identifier) {
        let sql = drop_primary_key(&roads);
        assert!(sql.starts_with("DO $$"));
        assert!(sql.contains(
            "WHERE conrelid = '\"philly_vz_hin_2017\"'::regclass AND contype = 'p'"
        ));
        assert!(sql.contains(
            "EXECUTE format('ALTER TABLE %s DROP CONSTRAINT %I', '\"philly_vz_hin_2017\"', pk)"
        ));
        assert!(sql.ends_with("END $$;"));
    }

    #[rstest]
    fn spatial_index_is_named_after_table(roads: Identifier) {
        let sql = add_spatial_index(&roads).expect("short name");
        assert_eq!(
            sql,
            "CREATE INDEX IF NOT EXISTS \"gix_philly_vz_hin_2017\" \
             ON \"philly_vz_hin_2017\" USING GIST (geom)"
        );
    }

    #[rstest]
    fn null_geometry_cleanup_targets_geom(roads: Identifier) {
        assert_eq!(
            delete_null_geometries(&roads),
            "DELETE FROM \"philly_vz_hin_2017\" WHERE geom IS NULL"
        );
    }

    #[rstest]
    fn spatial_index_rejects_overlong_names() {
        let table = Identifier::new("x".repeat(62)).expect("valid identifier");
        assert!(matches!(
            add_spatial_index(&table),
            Err(SqlError::Identifier(IdentifierError::TooLong { .. }))
        ));
    }

    #[rstest]
    fn reprojection_sets_then_transforms(roads: Identifier) {
        let sql = reproject(&roads, Epsg(2272), Epsg(4326), GeometryType::MultiLineString);
        assert!(sql.contains("TYPE geometry(MULTILINESTRING, 4326)"), "{sql}");
        assert!(
            sql.contains("USING ST_Transform(ST_SetSRID(geom, 2272), 4326)"),
            "{sql}"
        );
    }

    #[rstest]
    fn create_table_as_strips_trailing_semicolons(roads: Identifier) {
        let sql = create_table_as(&roads, "  SELECT ST_Union(geom) AS geom FROM src;  ")
            .expect("non-empty query");
        assert_eq!(
            sql,
            "DROP TABLE IF EXISTS \"philly_vz_hin_2017\";\n\
             CREATE TABLE \"philly_vz_hin_2017\" AS SELECT ST_Union(geom) AS geom FROM src;"
        );
    }

    #[rstest]
    #[case("")]
    #[case(" ; ")]
    fn empty_queries_are_rejected(roads: Identifier, #[case] query: &str) {
        assert_eq!(create_table_as(&roads, query), Err(SqlError::EmptyQuery));
        assert_eq!(json_rows(query), Err(SqlError::EmptyQuery));
    }

    #[rstest]
    fn geometry_type_is_pinned_with_srid(roads: Identifier) {
        let sql = set_geometry_type(&roads, GeometryType::MultiLineString, Epsg(2272));
        assert!(sql.contains("TYPE geometry(MULTILINESTRING, 2272)"), "{sql}");
        assert!(sql.contains("USING ST_SetSRID(geom, 2272)"), "{sql}");
    }

    #[rstest]
    fn hexagon_overlay_targets_requested_srid(roads: Identifier) {
        let hexagons = Identifier::new("test_hexagons").expect("valid identifier");
        let sql = hexagon_overlay(&hexagons, &roads, Epsg(2272), 5.0).expect("valid size");
        assert!(sql.starts_with("DROP TABLE IF EXISTS \"test_hexagons\";"));
        assert!(sql.contains("ST_Transform(geom, 2272) AS geom FROM \"philly_vz_hin_2017\""));
        assert!(sql.contains("ST_HexagonGrid(\n    5,"), "{sql}");
        assert!(sql.contains("geometry(POLYGON, 2272)"));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn hexagon_overlay_rejects_bad_sizes(roads: Identifier, #[case] size: f64) {
        assert!(matches!(
            hexagon_overlay(&roads, &roads, Epsg(2272), size),
            Err(SqlError::HexagonSize(_))
        ));
    }

    #[rstest]
    fn create_table_quotes_odd_column_names(roads: Identifier) {
        let sql = create_table(
            &roads,
            &[
                ("province_state".into(), ColumnType::Text),
                ("1/22/20".into(), ColumnType::BigInt),
            ],
        );
        assert_eq!(
            sql,
            "CREATE TABLE \"philly_vz_hin_2017\" (\"province_state\" TEXT, \"1/22/20\" BIGINT)"
        );
    }

    #[rstest]
    fn geo_table_has_gid_attributes_and_geom(roads: Identifier) {
        let sql = create_geo_table(
            &roads,
            &[("name".into(), ColumnType::Text)],
            GeometryType::LineString,
            Epsg(2272),
        );
        assert_eq!(
            sql,
            "CREATE TABLE \"philly_vz_hin_2017\" \
             (gid BIGINT, \"name\" TEXT, geom geometry(LINESTRING, 2272))"
        );
    }

    #[rstest]
    fn copy_lists_columns_in_order(roads: Identifier) {
        let sql = copy_from_stdin(&roads, &["gid".into(), "name".into(), "geom".into()]);
        assert_eq!(
            sql,
            "COPY \"philly_vz_hin_2017\" (\"gid\", \"name\", \"geom\") FROM STDIN \
             WITH (FORMAT csv, FORCE_NULL (\"gid\", \"name\", \"geom\"))"
        );
    }

    #[rstest]
    fn geo_rows_expose_wkt_and_srid() {
        let geom = Identifier::new("geom").expect("valid identifier");
        let sql = geo_rows("SELECT * FROM roads;", &geom).expect("non-empty query");
        assert_eq!(
            sql,
            "SELECT row_to_json(q)::text, ST_AsText(q.\"geom\"), ST_SRID(q.\"geom\") \
             FROM (SELECT * FROM roads) AS q"
        );
    }
}
