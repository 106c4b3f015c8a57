//! Error types emitted by the pgis CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use pgis_core::{IdentifierError, ProfileError};
use pgis_data::{ConfigError, DatabaseError, ToolError};
use thiserror::Error;

/// Errors emitted by the pgis CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without the leading dashes.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// Locating, creating or parsing the profile file failed.
    #[error(transparent)]
    Profiles(#[from] ConfigError),
    /// The requested host is not a profile in the file.
    #[error(transparent)]
    UnknownHost(#[from] ProfileError),
    /// A database name from the command line or the server is unusable.
    #[error(transparent)]
    DatabaseName(#[from] IdentifierError),
    /// The named database does not exist on the cluster.
    #[error("database {database:?} does not exist on {host}")]
    UnknownDatabase {
        /// Requested database.
        database: String,
        /// Profile name of the cluster.
        host: String,
    },
    /// Talking to the cluster failed.
    #[error(transparent)]
    Database(#[from] Box<DatabaseError>),
    /// Running `pg_dump` failed.
    #[error(transparent)]
    Tool(#[from] Box<ToolError>),
}

impl From<DatabaseError> for CliError {
    fn from(err: DatabaseError) -> Self {
        Self::Database(Box::new(err))
    }
}

impl From<ToolError> for CliError {
    fn from(err: ToolError) -> Self {
        Self::Tool(Box::new(err))
    }
}
