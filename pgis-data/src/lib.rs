//! I/O adapters for pgis.
//!
//! [`PostgreSql`] wraps one database on a PostgreSQL/PostGIS cluster and
//! drives it through `sqlx` and the PostGIS and GDAL command-line tools.
//! Alongside it live the raw-data downloader and the helpers that locate and
//! read the connection profile file.

#![forbid(unsafe_code)]

pub mod config;
mod database;
pub mod download;
mod error;
mod import;
pub mod tools;

pub use database::PostgreSql;
pub use download::{DataFetcher, HttpFetcher, download_data, flush_data};
pub use error::{ConfigError, DatabaseError, DownloadError, ToolError};
pub use import::{IfExists, parse_csv};
