//! Core domain types for pgis.
//!
//! Everything here is pure: identifiers, connection profiles, SQL statement
//! builders, geometry helpers and in-memory tables. Validation happens in
//! constructors so that the I/O layer only ever sees well-formed values.

#![forbid(unsafe_code)]

pub mod columns;
mod connection;
mod data_source;
mod geometry;
mod identifier;
mod profiles;
pub mod sql;
mod table;
pub mod timing;
mod verbosity;

pub use connection::{
    ConnectionProfile, DEFAULT_PORT, ParseSslModeError, SslMode, Target, UriError,
};
pub use data_source::{DataFolders, DataSource, INBOX, OUTBOX};
pub use geometry::{CrsParseError, Epsg, GeometryType, ParseGeometryTypeError, WGS84};
pub use identifier::{Identifier, IdentifierError, MAX_IDENTIFIER_LEN};
pub use profiles::{DEFAULT_SECTION, Profile, ProfileError, ProfileSet, STARTER_CONFIG};
pub use table::{
    ColumnType, EXPLODE_COLUMN, GeoTable, PreparedGeoTable, Table, TableError, cell_text,
};
pub use verbosity::{Importance, MESSAGE_PREFIX, ParseVerbosityError, Verbosity};
