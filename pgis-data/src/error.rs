//! Error types produced by the database, tool, download and config helpers.

use std::io;

use camino::Utf8PathBuf;
use pgis_core::{Identifier, IdentifierError, ProfileError, TableError, UriError, sql::SqlError};
use thiserror::Error;

/// Errors raised while talking to PostgreSQL.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DatabaseError {
    /// The connection URI could not be assembled.
    #[error(transparent)]
    Uri(#[from] UriError),
    /// Opening a connection failed.
    #[error("failed to connect to {database} on {host}: {source}")]
    Connect {
        /// Database the connection targeted.
        database: Identifier,
        /// Cluster host.
        host: String,
        /// Driver error.
        source: sqlx::Error,
    },
    /// A statement failed.
    #[error("query against {database} failed: {source}")]
    Query {
        /// Database the statement ran against.
        database: Identifier,
        /// Driver error.
        source: sqlx::Error,
    },
    /// A statement could not be assembled.
    #[error(transparent)]
    Sql(#[from] SqlError),
    /// A result or input table was malformed.
    #[error(transparent)]
    Table(#[from] TableError),
    /// A name returned by the server or supplied by a caller is not usable.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// A result row was not a JSON object.
    #[error("row {row} of the result is not a JSON object")]
    RowShape {
        /// Zero-based row index.
        row: usize,
    },
    /// A result row could not be decoded.
    #[error("row {row} of the result is not valid JSON: {source}")]
    RowJson {
        /// Zero-based row index.
        row: usize,
        /// Parser error.
        source: serde_json::Error,
    },
    /// A geometry could not be decoded from WKT.
    #[error("row {row} holds a geometry that cannot be decoded: {message}")]
    Geometry {
        /// Zero-based row index.
        row: usize,
        /// Decoder message.
        message: String,
    },
    /// An SRID returned by PostGIS was negative.
    #[error("row {row} reports SRID {srid}")]
    Srid {
        /// Zero-based row index.
        row: usize,
        /// The reported SRID.
        srid: i32,
    },
    /// The target table exists and the caller asked to fail in that case.
    #[error("table {table} already exists in {database}")]
    TableExists {
        /// Database holding the table.
        database: Identifier,
        /// Existing table.
        table: Identifier,
    },
    /// A geo import had no geometry to derive a column type from.
    #[error("cannot import {table}: the layer has no geometries")]
    NoGeometry {
        /// Target table.
        table: Identifier,
    },
    /// A geo import had no coordinate reference system.
    #[error("cannot import {table}: the layer has no EPSG code and none was given")]
    MissingEpsg {
        /// Target table.
        table: Identifier,
    },
    /// A CSV file could not be read.
    #[error("failed to read CSV {path}: {source}")]
    ReadCsv {
        /// File being read.
        path: Utf8PathBuf,
        /// Reader error.
        source: csv::Error,
    },
    /// Encoding rows for `COPY` failed.
    #[error("failed to encode rows for {table}: {source}")]
    EncodeCsv {
        /// Target table.
        table: Identifier,
        /// Writer error.
        source: csv::Error,
    },
    /// `COPY` stored fewer rows than were sent.
    #[error("COPY into {table} stored {loaded} of {sent} rows")]
    ShortCopy {
        /// Target table.
        table: Identifier,
        /// Rows encoded in the payload.
        sent: usize,
        /// Rows the server reported.
        loaded: u64,
    },
}

/// Errors raised while running an external PostGIS or GDAL tool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The program exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        /// Program name.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
    /// Plumbing output between two programs failed.
    #[error("failed to pipe {from} into {to}: {source}")]
    Pipe {
        /// Producing program.
        from: String,
        /// Consuming program.
        to: String,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Preparing the output folder failed.
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        /// Directory being created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The follow-up SQL after a tool run failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Errors raised while downloading raw data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DownloadError {
    /// The HTTP client could not be configured.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request failed before a status was received.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Request URL.
        url: String,
        /// Transport error.
        source: io::Error,
    },
    /// The downloaded archive could not be read.
    #[error("failed to read zip archive from {url}: {source}")]
    Archive {
        /// Request URL.
        url: String,
        /// Archive error.
        source: zip::result::ZipError,
    },
    /// An archive entry would escape the output folder.
    #[error("archive from {url} contains unsafe entry {entry:?}")]
    UnsafeEntry {
        /// Request URL.
        url: String,
        /// Entry name as stored.
        entry: String,
    },
    /// Writing to disk failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path being written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Errors raised while reading or writing the profile file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No home directory could be determined.
    #[error("cannot determine the home directory")]
    NoHomeDir,
    /// The home directory path is not UTF-8.
    #[error("home directory {0:?} is not valid UTF-8")]
    NonUtf8Home(std::path::PathBuf),
    /// The file already exists and overwriting was not requested.
    #[error("{path} already exists; pass overwrite to replace it")]
    AlreadyExists {
        /// Existing file.
        path: Utf8PathBuf,
    },
    /// Reading or writing the file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// File being accessed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The file contents were invalid.
    #[error("invalid profile file {path}: {source}")]
    Profile {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Parser error.
        source: ProfileError,
    },
}
