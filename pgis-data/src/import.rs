//! Loading tables and geo tables into PostgreSQL.
//!
//! Rows are streamed with `COPY ... FROM STDIN` in CSV format inside one
//! transaction, so a failed load leaves the previous table untouched.

use camino::Utf8Path;
use pgis_core::{
    ColumnType, Epsg, GeoTable, Identifier, Importance, Table, Target, cell_text, sql,
};
use serde_json::Value;
use sqlx::{Connection, PgConnection};

use crate::{DatabaseError, PostgreSql};

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IfExists {
    /// Refuse to touch the existing table.
    #[default]
    Fail,
    /// Drop the existing table and create it afresh.
    Replace,
    /// Add rows to the existing table.
    Append,
}

/// Parse CSV text with a header row into a [`Table`].
///
/// Empty fields become nulls; every other cell is kept as text so that
/// column types can be inferred later.
pub fn parse_csv(text: &str) -> Result<Table, csv::Error> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let columns = reader.headers()?.iter().map(str::to_owned).collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let cells = record?
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Value::Null
                } else {
                    Value::String(field.to_owned())
                }
            })
            .collect();
        // The reader rejects ragged records, so arity always matches.
        table
            .push_row(cells)
            .map_err(|err| csv::Error::from(std::io::Error::other(err)))?;
    }
    Ok(table)
}

/// Encode rows as headerless CSV for `COPY`, with `None` as an empty field.
///
/// Every field is quoted so no row can read as the `\.` end-of-data marker;
/// `FORCE_NULL` turns the quoted empty fields back into nulls.
fn copy_payload<I, R>(rows: I) -> Result<Vec<u8>, csv::Error>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = Option<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row.into_iter().map(Option::unwrap_or_default))?;
    }
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

/// Statements preparing `name` for a load under `if_exists`.
fn table_ddl(
    database: &Identifier,
    name: &Identifier,
    exists: bool,
    if_exists: IfExists,
    columns: &[(String, ColumnType)],
) -> Result<Vec<String>, DatabaseError> {
    match (exists, if_exists) {
        (true, IfExists::Fail) => Err(DatabaseError::TableExists {
            database: database.clone(),
            table: name.clone(),
        }),
        (true, IfExists::Append) => Ok(Vec::new()),
        (true, IfExists::Replace) => Ok(vec![
            sql::drop_table(name),
            sql::create_table(name, columns),
        ]),
        (false, _) => Ok(vec![sql::create_table(name, columns)]),
    }
}

/// `COPY` reports how many rows it stored; anything short of `sent` means
/// the server stopped reading early.
fn confirm_loaded(table: &Identifier, sent: usize, loaded: u64) -> Result<u64, DatabaseError> {
    if usize::try_from(loaded).ok() == Some(sent) {
        Ok(loaded)
    } else {
        Err(DatabaseError::ShortCopy {
            table: table.clone(),
            sent,
            loaded,
        })
    }
}

fn typed_columns(table: &Table) -> Vec<(String, ColumnType)> {
    table
        .columns()
        .iter()
        .cloned()
        .zip(table.column_types())
        .collect()
}

impl PostgreSql {
    /// Write `table` to `name`, returning the number of rows loaded.
    ///
    /// Column names are sanitised first. Column types are inferred from the
    /// cells when the table is created; appending relies on the existing
    /// definition.
    pub async fn import_table(
        &self,
        table: &Table,
        name: &Identifier,
        if_exists: IfExists,
    ) -> Result<u64, DatabaseError> {
        let mut clean = table.clone();
        clean.sanitize_columns()?;

        let ddl = table_ddl(
            self.database(),
            name,
            self.table_exists(name).await?,
            if_exists,
            &typed_columns(&clean),
        )?;

        let payload = copy_payload(
            clean
                .rows()
                .iter()
                .map(|row| row.iter().map(cell_text).collect::<Vec<_>>()),
        )
        .map_err(|source| DatabaseError::EncodeCsv {
            table: name.clone(),
            source,
        })?;
        let loaded = self
            .load(&ddl, name, clean.columns(), payload, clean.len())
            .await?;
        self.report(
            Importance::Progress,
            format_args!("Imported {loaded} rows to {name}"),
        );
        Ok(loaded)
    }

    /// Read a CSV file and append it to `name` (see [`IfExists`]).
    ///
    /// Returns the table as read, before column names were sanitised.
    pub async fn import_csv(
        &self,
        path: &Utf8Path,
        name: &Identifier,
        if_exists: IfExists,
    ) -> Result<Table, DatabaseError> {
        let read_error = |source| DatabaseError::ReadCsv {
            path: path.to_path_buf(),
            source,
        };
        let text = pgis_fs::read_to_string(path).map_err(|err| read_error(csv::Error::from(err)))?;
        let table = parse_csv(&text).map_err(read_error)?;
        self.import_table(&table, name, if_exists).await?;
        Ok(table)
    }

    /// Replace `name` with the rows and geometries of `layer`.
    ///
    /// `src_epsg` overrides the layer's own EPSG code. Attribute columns are
    /// lower-cased, `gid` and `geom` are rebuilt and a source `uid` is kept as
    /// `old_uid`. The row index is written to `gid`, geometries to a
    /// `geom geometry(type, epsg)` column using the widest type present, and
    /// the finished table gets a `uid` primary key and a spatial index.
    pub async fn import_geotable(
        &self,
        layer: &GeoTable,
        name: &Identifier,
        src_epsg: Option<Epsg>,
    ) -> Result<u64, DatabaseError> {
        let epsg = src_epsg
            .or_else(|| layer.epsg())
            .ok_or_else(|| DatabaseError::MissingEpsg {
                table: name.clone(),
            })?;
        let prepared = layer.prepare_for_import()?;
        let geometry_type = prepared
            .geometry_type
            .ok_or_else(|| DatabaseError::NoGeometry {
                table: name.clone(),
            })?;

        let ddl = [
            sql::drop_table(name),
            sql::create_geo_table(
                name,
                &typed_columns(&prepared.attributes),
                geometry_type,
                epsg,
            ),
        ];
        let mut columns = vec![String::from("gid")];
        columns.extend(prepared.attributes.columns().iter().cloned());
        columns.push(String::from(sql::GEOM_COLUMN));

        let rows = prepared
            .attributes
            .rows()
            .iter()
            .zip(&prepared.wkt)
            .enumerate()
            .map(|(gid, (row, wkt))| {
                let mut cells = vec![Some(gid.to_string())];
                cells.extend(row.iter().map(cell_text));
                cells.push(
                    wkt.as_ref()
                        .map(|text| format!("SRID={};{text}", epsg.code())),
                );
                cells
            });
        let payload = copy_payload(rows).map_err(|source| DatabaseError::EncodeCsv {
            table: name.clone(),
            source,
        })?;

        let loaded = self
            .load(&ddl, name, &columns, payload, prepared.attributes.len())
            .await?;
        self.add_uid_column(name).await?;
        self.add_spatial_index(name).await?;
        self.report(
            Importance::Progress,
            format_args!("Imported {loaded} {geometry_type} features to {name}"),
        );
        Ok(loaded)
    }

    /// Run `ddl` then stream the `rows` encoded in `payload` into `table` in
    /// one transaction.
    async fn load(
        &self,
        ddl: &[String],
        table: &Identifier,
        columns: &[String],
        payload: Vec<u8>,
        rows: usize,
    ) -> Result<u64, DatabaseError> {
        let target = Target::Working;
        let failed = |source| DatabaseError::Query {
            database: self.database().clone(),
            source,
        };
        let mut conn: PgConnection = self.connect(target).await?;
        let mut tx = conn.begin().await.map_err(failed)?;
        if !ddl.is_empty() {
            sqlx::raw_sql(&ddl.join(";\n"))
                .execute(&mut *tx)
                .await
                .map_err(failed)?;
        }
        let loaded = if rows == 0 || columns.is_empty() {
            0
        } else {
            let mut copy = tx
                .copy_in_raw(&sql::copy_from_stdin(table, columns))
                .await
                .map_err(failed)?;
            copy.send(payload).await.map_err(failed)?;
            confirm_loaded(table, rows, copy.finish().await.map_err(failed)?)?
        };
        tx.commit().await.map_err(failed)?;
        self.disconnect(conn, target).await?;
        Ok(loaded)
    }
}
