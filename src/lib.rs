//! Facade crate for pgis.
//!
//! This crate re-exports the pure domain types and, behind the `data`
//! feature, the database wrapper and its I/O helpers.

#![forbid(unsafe_code)]

pub use pgis_core::{
    ColumnType, ConnectionProfile, DataFolders, DataSource, Epsg, GeoTable, GeometryType,
    Identifier, IdentifierError, Profile, ProfileError, ProfileSet, SslMode, Table, TableError,
    Target, Verbosity, sql, timing,
};

#[cfg(feature = "data")]
pub use pgis_data::{
    ConfigError, DataFetcher, DatabaseError, DownloadError, HttpFetcher, IfExists, PostgreSql,
    ToolError, config, download_data, flush_data, tools,
};
