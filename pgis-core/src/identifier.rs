//! Validated SQL identifiers.
//!
//! Table, database and index names are interpolated into DDL, which cannot be
//! parameterised. [`Identifier`] restricts names to the unquoted PostgreSQL
//! form so that interpolation is always safe.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Errors returned by [`Identifier::new`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// The name was empty after trimming.
    #[error("identifier must not be empty")]
    Empty,
    /// The name exceeded [`MAX_IDENTIFIER_LEN`] bytes.
    #[error("identifier {name:?} is {len} bytes long (maximum {MAX_IDENTIFIER_LEN})")]
    TooLong {
        /// Offending name.
        name: String,
        /// Length of the name in bytes.
        len: usize,
    },
    /// The name started with a digit.
    #[error("identifier {name:?} must not start with a digit")]
    LeadingDigit {
        /// Offending name.
        name: String,
    },
    /// The name contained a character outside `[a-z0-9_]`.
    #[error("identifier {name:?} contains invalid character {ch:?}")]
    InvalidCharacter {
        /// Offending name.
        name: String,
        /// First invalid character.
        ch: char,
    },
}

/// A lower-case SQL identifier matching `[a-z_][a-z0-9_]*`.
///
/// # Examples
///
/// ```
/// use pgis_core::Identifier;
///
/// # fn main() -> Result<(), pgis_core::IdentifierError> {
/// let table = Identifier::new("Philly_HIN_2017")?;
/// assert_eq!(table.as_str(), "philly_hin_2017");
/// assert_eq!(table.quoted(), "\"philly_hin_2017\"");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(pub(crate) String);

impl Identifier {
    /// Validate and normalise a name.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdentifierError> {
        let name = raw.as_ref().trim().to_lowercase();
        let Some(first) = name.chars().next() else {
            return Err(IdentifierError::Empty);
        };
        if name.len() > MAX_IDENTIFIER_LEN {
            let len = name.len();
            return Err(IdentifierError::TooLong { name, len });
        }
        if first.is_ascii_digit() {
            return Err(IdentifierError::LeadingDigit { name });
        }
        if let Some(ch) = name
            .chars()
            .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '_'))
        {
            return Err(IdentifierError::InvalidCharacter { name, ch });
        }
        Ok(Self(name))
    }

    /// Borrow the normalised name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the name double-quoted for interpolation into SQL.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Derive a new identifier by prefixing this one, e.g. `gix_{table}`.
    pub fn prefixed(&self, prefix: &str) -> Result<Self, IdentifierError> {
        Self::new(format!("{prefix}{}", self.0))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}
