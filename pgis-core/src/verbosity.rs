//! Message verbosity for database wrappers.

use std::{fmt, str::FromStr};

use log::{Level, LevelFilter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix applied to every progress message.
pub const MESSAGE_PREFIX: &str = r"pGIS \\ ";

/// How chatty a database wrapper should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Report every message.
    #[default]
    Full,
    /// Report progress and essential messages.
    Minimal,
    /// Report essential messages only.
    Errors,
}

/// How important a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Importance {
    /// Reported only at [`Verbosity::Full`].
    Detail,
    /// Suppressed at [`Verbosity::Errors`].
    Progress,
    /// Always reported.
    Essential,
}

impl Importance {
    /// `log` level used when emitting a message of this importance.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Detail => Level::Debug,
            Self::Progress => Level::Info,
            Self::Essential => Level::Warn,
        }
    }
}

impl Verbosity {
    /// Whether a message of `importance` should be reported.
    #[must_use]
    pub const fn permits(self, importance: Importance) -> bool {
        match self {
            Self::Full => true,
            Self::Minimal => !matches!(importance, Importance::Detail),
            Self::Errors => matches!(importance, Importance::Essential),
        }
    }

    /// Log filter that lets through exactly the permitted messages.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Full => LevelFilter::Debug,
            Self::Minimal => LevelFilter::Info,
            Self::Errors => LevelFilter::Warn,
        }
    }

    /// Emit `message` through `log` when permitted.
    pub fn report(self, importance: Importance, message: impl fmt::Display) {
        if self.permits(importance) {
            log::log!(importance.level(), "{MESSAGE_PREFIX}{message}");
        }
    }
}

/// Error returned when parsing an unknown verbosity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown verbosity {0:?} (expected full, minimal or errors)")]
pub struct ParseVerbosityError(pub String);

impl FromStr for Verbosity {
    type Err = ParseVerbosityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "minimal" => Ok(Self::Minimal),
            "errors" => Ok(Self::Errors),
            other => Err(ParseVerbosityError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Verbosity::Full, Importance::Detail, true)]
    #[case(Verbosity::Full, Importance::Essential, true)]
    #[case(Verbosity::Minimal, Importance::Detail, false)]
    #[case(Verbosity::Minimal, Importance::Progress, true)]
    #[case(Verbosity::Minimal, Importance::Essential, true)]
    #[case(Verbosity::Errors, Importance::Progress, false)]
    #[case(Verbosity::Errors, Importance::Essential, true)]
    fn permits_by_level(
        #[case] verbosity: Verbosity,
        #[case] importance: Importance,
        #[case] expected: bool,
    ) {
        assert_eq!(verbosity.permits(importance), expected);
    }

    #[rstest]
    fn level_filter_agrees_with_permits() {
        for verbosity in [Verbosity::Full, Verbosity::Minimal, Verbosity::Errors] {
            for importance in [Importance::Detail, Importance::Progress, Importance::Essential] {
                assert_eq!(
                    importance.level() <= verbosity.level_filter(),
                    verbosity.permits(importance),
                    "{verbosity:?} / {importance:?}"
                );
            }
        }
    }

    #[rstest]
    fn parses_names() {
        assert_eq!("Minimal".parse(), Ok(Verbosity::Minimal));
        assert!("loud".parse::<Verbosity>().is_err());
    }
}
