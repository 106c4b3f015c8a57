//! Named connection profiles read from a TOML file.
//!
//! Each top-level table names one cluster. A `[default]` table supplies values
//! that every other table inherits unless it sets them itself; anything still
//! missing falls back to [`ConnectionProfile::default`].

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::{ConnectionProfile, Identifier, SslMode, Verbosity};

/// Name of the table whose values every profile inherits.
pub const DEFAULT_SECTION: &str = "default";

/// Template written by `configure-databases`.
pub const STARTER_CONFIG: &str = r#"# Database connection profiles for pgis.
#
# Every table other than [default] names a cluster. Values in [default] are
# inherited by every profile that does not set them.

[default]
pw = "this-is-a-placeholder-password"
port = 5432
super_db = "postgres"
super_un = "postgres"
super_pw = "this-is-another-placeholder-password"

[localhost]
host = "localhost"
un = "postgres"
pw = "your-password-here"

[digitalocean]
un = "your-username-here"
host = "your-host-here.db.ondigitalocean.com"
pw = "your-password-here"
port = 25060
sslmode = "require"
super_db = "your_default_db"
super_un = "your_super_admin"
super_pw = "some_super_password12354"
"#;

/// Errors raised while reading profiles.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProfileError {
    /// The document was not valid TOML or had values of the wrong type.
    #[error("invalid profile file: {0}")]
    Parse(#[source] Box<toml::de::Error>),
    /// The requested profile is not defined.
    #[error("no profile named {name:?} (known profiles: {})", known.join(", "))]
    UnknownProfile {
        /// Requested name.
        name: String,
        /// Names that are defined.
        known: Vec<String>,
    },
}

/// One table of the profile file, before defaults are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileEntry {
    host: Option<String>,
    port: Option<u16>,
    un: Option<String>,
    pw: Option<String>,
    sslmode: Option<SslMode>,
    super_db: Option<Identifier>,
    super_un: Option<String>,
    super_pw: Option<String>,
    verbosity: Option<Verbosity>,
}

impl ProfileEntry {
    fn inherit(self, defaults: &Self) -> Profile {
        let base = ConnectionProfile::default();
        let connection = ConnectionProfile {
            host: self.host.or_else(|| defaults.host.clone()).unwrap_or(base.host),
            port: self.port.or(defaults.port).unwrap_or(base.port),
            user: self.un.or_else(|| defaults.un.clone()).unwrap_or(base.user),
            password: self.pw.or_else(|| defaults.pw.clone()).unwrap_or(base.password),
            ssl_mode: self.sslmode.or(defaults.sslmode),
            super_db: self
                .super_db
                .or_else(|| defaults.super_db.clone())
                .unwrap_or(base.super_db),
            super_user: self
                .super_un
                .or_else(|| defaults.super_un.clone())
                .unwrap_or(base.super_user),
            super_password: self
                .super_pw
                .or_else(|| defaults.super_pw.clone())
                .unwrap_or(base.super_password),
        };
        Profile {
            connection,
            verbosity: self.verbosity.or(defaults.verbosity).unwrap_or_default(),
        }
    }
}

/// A resolved profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Connection parameters.
    pub connection: ConnectionProfile,
    /// Verbosity for wrappers built from this profile.
    pub verbosity: Verbosity,
}

/// All profiles defined in one file, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileSet {
    /// Parse a profile document.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgis_core::ProfileSet;
    ///
    /// # fn main() -> Result<(), pgis_core::ProfileError> {
    /// let profiles = ProfileSet::parse(
    ///     r#"
    ///     [default]
    ///     port = 6543
    ///
    ///     [localhost]
    ///     pw = "hunter2"
    ///     "#,
    /// )?;
    /// let local = profiles.get("localhost")?;
    /// assert_eq!(local.connection.port, 6543);
    /// assert_eq!(local.connection.password, "hunter2");
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse(document: &str) -> Result<Self, ProfileError> {
        let mut entries: BTreeMap<String, ProfileEntry> =
            toml::from_str(document).map_err(|err| ProfileError::Parse(Box::new(err)))?;
        let defaults = entries.remove(DEFAULT_SECTION).unwrap_or_default();
        let profiles = entries
            .into_iter()
            .map(|(name, entry)| (name, entry.inherit(&defaults)))
            .collect();
        Ok(Self { profiles })
    }

    /// Look up a profile by name.
    pub fn get(&self, name: &str) -> Result<&Profile, ProfileError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ProfileError::UnknownProfile {
                name: name.to_owned(),
                known: self.names().map(str::to_owned).collect(),
            })
    }

    /// Profile names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no profiles are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn starter_config_defines_two_profiles() {
        let profiles = ProfileSet::parse(STARTER_CONFIG).expect("template parses");
        assert_eq!(
            profiles.names().collect::<Vec<_>>(),
            ["digitalocean", "localhost"]
        );
    }

    #[rstest]
    fn profiles_inherit_default_section() {
        let profiles = ProfileSet::parse(STARTER_CONFIG).expect("template parses");
        let local = profiles.get("localhost").expect("localhost profile");
        assert_eq!(local.connection.host, "localhost");
        assert_eq!(local.connection.password, "your-password-here");
        assert_eq!(
            local.connection.super_password,
            "this-is-another-placeholder-password"
        );
        assert_eq!(local.connection.ssl_mode, None);
        assert_eq!(local.verbosity, Verbosity::Full);
    }

    #[rstest]
    fn profile_values_override_defaults() {
        let profiles = ProfileSet::parse(STARTER_CONFIG).expect("template parses");
        let remote = profiles.get("digitalocean").expect("remote profile");
        assert_eq!(remote.connection.port, 25060);
        assert_eq!(remote.connection.ssl_mode, Some(SslMode::Require));
        assert_eq!(remote.connection.super_db.as_str(), "your_default_db");
        assert_eq!(remote.connection.super_user, "your_super_admin");
    }

    #[rstest]
    fn missing_values_fall_back_to_builtin_defaults() {
        let profiles = ProfileSet::parse("[bare]\n").expect("empty table parses");
        let bare = profiles.get("bare").expect("bare profile");
        assert_eq!(bare.connection, ConnectionProfile::default());
    }

    #[rstest]
    fn unknown_profiles_list_known_names() {
        let profiles = ProfileSet::parse(STARTER_CONFIG).expect("template parses");
        let err = profiles.get("staging").expect_err("not defined");
        assert_eq!(
            err.to_string(),
            "no profile named \"staging\" (known profiles: digitalocean, localhost)"
        );
    }

    #[rstest]
    #[case("[local]\nport = \"not a number\"\n")]
    #[case("[local]\nsslmode = \"sometimes\"\n")]
    #[case("[local]\nsuper_db = \"bad-name\"\n")]
    #[case("[local]\npassword = \"typo for pw\"\n")]
    fn invalid_documents_are_rejected(#[case] document: &str) {
        assert!(matches!(
            ProfileSet::parse(document),
            Err(ProfileError::Parse(_))
        ));
    }
}
