//! Locating, creating and reading the connection profile file.

use camino::{Utf8Path, Utf8PathBuf};
use pgis_core::{DataFolders, Identifier, ProfileSet, STARTER_CONFIG};

use crate::{ConfigError, PostgreSql};

/// Folder below the home directory holding configuration and data.
pub const APP_DIR: &str = ".pgis";
/// Name of the profile file inside [`APP_DIR`].
pub const CONFIG_FILE: &str = "databases.toml";

/// `~/.pgis`
pub fn app_dir() -> Result<Utf8PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    let utf8_home = Utf8PathBuf::from_path_buf(home).map_err(ConfigError::NonUtf8Home)?;
    Ok(utf8_home.join(APP_DIR))
}

/// `~/.pgis/databases.toml`
pub fn default_config_path() -> Result<Utf8PathBuf, ConfigError> {
    Ok(app_dir()?.join(CONFIG_FILE))
}

/// `~/.pgis/data/inbox` and `~/.pgis/data/outbox`.
pub fn default_data_folders() -> Result<DataFolders, ConfigError> {
    Ok(DataFolders::under(&app_dir()?.join("data")))
}

fn io_error(path: &Utf8Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write the starter profile file to `path`.
///
/// An existing file is only replaced when `overwrite` is set.
pub fn make_config_file(path: &Utf8Path, overwrite: bool) -> Result<(), ConfigError> {
    let written = if overwrite {
        pgis_fs::write_file(path, STARTER_CONFIG)
    } else {
        pgis_fs::write_new_file(path, STARTER_CONFIG)
    };
    match written {
        Ok(()) => {
            log::info!("Wrote connection profiles to {path}");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            })
        }
        Err(err) => Err(io_error(path, err)),
    }
}

/// Parse the profile file at `path`, creating it from the template first
/// when it does not exist.
pub fn read_config_file(path: &Utf8Path) -> Result<ProfileSet, ConfigError> {
    if !pgis_fs::is_file(path).map_err(|err| io_error(path, err))? {
        log::warn!("{path} does not exist; creating it with default profiles");
        make_config_file(path, false)?;
    }
    let text = pgis_fs::read_to_string(path).map_err(|err| io_error(path, err))?;
    ProfileSet::parse(&text).map_err(|source| ConfigError::Profile {
        path: path.to_path_buf(),
        source,
    })
}

/// Profiles from `path`, or from [`default_config_path`] when `None`.
pub fn configurations(path: Option<&Utf8Path>) -> Result<ProfileSet, ConfigError> {
    match path {
        Some(explicit) => read_config_file(explicit),
        None => read_config_file(&default_config_path()?),
    }
}

/// A [`PostgreSql`] for `database` on the cluster named by `profile`.
pub fn database_for(
    profiles: &ProfileSet,
    profile: &str,
    database: Identifier,
) -> Result<PostgreSql, pgis_core::ProfileError> {
    let chosen = profiles.get(profile)?;
    Ok(PostgreSql::new(database, chosen.connection.clone()).with_verbosity(chosen.verbosity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgis_core::{ProfileError, SslMode, Verbosity};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Scratch {
        _dir: TempDir,
        config: Utf8PathBuf,
    }

    #[fixture]
    fn scratch() -> Scratch {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        Scratch {
            config: root.join(APP_DIR).join(CONFIG_FILE),
            _dir: dir,
        }
    }

    #[rstest]
    fn missing_file_is_created_from_template(scratch: Scratch) {
        let profiles = read_config_file(&scratch.config).expect("template parses");
        assert!(pgis_fs::is_file(&scratch.config).expect("stat config"));
        let names: Vec<_> = profiles.names().collect();
        assert!(names.contains(&"localhost"));
        assert!(names.contains(&"digitalocean"));
    }

    #[rstest]
    fn existing_file_is_not_clobbered(scratch: Scratch) {
        make_config_file(&scratch.config, false).expect("first write");
        let err = make_config_file(&scratch.config, false).expect_err("second write");
        assert!(matches!(err, ConfigError::AlreadyExists { .. }));
        make_config_file(&scratch.config, true).expect("overwrite");
    }

    #[rstest]
    fn invalid_file_reports_its_path(scratch: Scratch) {
        pgis_fs::write_file(&scratch.config, "[localhost]\nport = \"five\"\n").expect("write");
        match read_config_file(&scratch.config) {
            Err(ConfigError::Profile { path, .. }) => assert_eq!(path, scratch.config),
            other => panic!("expected a profile error, got {other:?}"),
        }
    }

    #[rstest]
    fn database_for_applies_profile(scratch: Scratch) {
        let profiles = configurations(Some(&scratch.config)).expect("template parses");
        let db = database_for(
            &profiles,
            "digitalocean",
            Identifier::new("vision_zero").expect("valid name"),
        )
        .expect("known profile");
        assert_eq!(db.profile().port, 25060);
        assert_eq!(db.profile().ssl_mode, Some(SslMode::Require));
        assert_eq!(db.verbosity(), Verbosity::default());
    }

    #[rstest]
    fn unknown_profile_is_rejected(scratch: Scratch) {
        let profiles = configurations(Some(&scratch.config)).expect("template parses");
        let err = database_for(
            &profiles,
            "staging",
            Identifier::new("vision_zero").expect("valid name"),
        )
        .expect_err("unknown profile");
        assert!(matches!(err, ProfileError::UnknownProfile { .. }));
    }
}
