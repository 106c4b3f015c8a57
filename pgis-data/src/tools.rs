//! PostGIS and GDAL command-line tools.
//!
//! Command lines are assembled by pure functions returning [`ToolCommand`]s,
//! so they can be checked without the tools installed. The methods on
//! [`PostgreSql`] run them through `tokio::process`. Passwords travel in the
//! `PGPASSWORD` environment variable and never appear in arguments.

use std::process::{Output, Stdio};

use camino::{Utf8Path, Utf8PathBuf};
use pgis_core::{ConnectionProfile, Epsg, Identifier, Importance, Target, sql};
use tokio::process::Command;

use crate::{PostgreSql, ToolError};

/// Output format used by [`PostgreSql::export_geodata`] when none is given.
pub const DEFAULT_OGR_DRIVER: &str = "GPKG";

/// A program invocation: name, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl ToolCommand {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_owned(), value.into()));
        self
    }

    /// Program name looked up on `PATH`.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Value of an extra environment variable, if set.
    #[must_use]
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn spawn_failed(&self, source: std::io::Error) -> ToolError {
        ToolError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);
        command
    }
}

/// libpq environment for `target`: password and, when set, SSL mode.
fn with_libpq_env(
    command: ToolCommand,
    profile: &ConnectionProfile,
    target: Target,
) -> ToolCommand {
    let (_, password) = profile.credentials(target);
    let with_password = command.env("PGPASSWORD", password);
    match profile.ssl_mode {
        Some(mode) => with_password.env("PGSSLMODE", mode.as_str()),
        None => with_password,
    }
}

/// Host, port, user and database flags shared by `pg_dump` and `psql`.
fn libpq_args(db: &PostgreSql) -> [String; 8] {
    let profile = db.profile();
    let (user, _) = profile.credentials(Target::Working);
    [
        "--host".to_owned(),
        profile.host.clone(),
        "--port".to_owned(),
        profile.port.to_string(),
        "--username".to_owned(),
        user.to_owned(),
        "--dbname".to_owned(),
        db.database().to_string(),
    ]
}

/// OGR connection string for the working database (password excluded).
fn ogr_connection(db: &PostgreSql) -> String {
    let profile = db.profile();
    let (user, _) = profile.credentials(Target::Working);
    let mut connection = format!(
        "PG:host={} port={} dbname={} user={}",
        profile.host,
        profile.port,
        db.database(),
        user
    );
    if let Some(mode) = profile.ssl_mode {
        connection.push_str(" sslmode=");
        connection.push_str(mode.as_str());
    }
    connection
}

/// `pg_dump` of the whole working database into `output`.
#[must_use]
pub fn pg_dump_command(db: &PostgreSql, output: &Utf8Path) -> ToolCommand {
    let command = ToolCommand::new("pg_dump")
        .args(["--no-owner", "--no-acl"])
        .args(libpq_args(db))
        .arg("--file")
        .arg(output.as_str());
    with_libpq_env(command, db.profile(), Target::Working)
}

/// `pg_dump` of one table to standard output.
#[must_use]
pub fn pg_dump_table_command(db: &PostgreSql, table: &Identifier) -> ToolCommand {
    let command = ToolCommand::new("pg_dump")
        .args(["--no-owner", "--no-acl"])
        .args(libpq_args(db))
        .arg("--table")
        .arg(table.quoted());
    with_libpq_env(command, db.profile(), Target::Working)
}

/// `psql` reading SQL from standard input, stopping at the first error.
#[must_use]
pub fn psql_command(db: &PostgreSql) -> ToolCommand {
    let command = ToolCommand::new("psql")
        .args(["--quiet", "--no-psqlrc", "--set", "ON_ERROR_STOP=1"])
        .args(libpq_args(db));
    with_libpq_env(command, db.profile(), Target::Working)
}

/// `shp2pgsql` writing SQL that drops, recreates and indexes `table`.
#[must_use]
pub fn shp2pgsql_command(
    table: &Identifier,
    shapefile: &Utf8Path,
    epsg: Option<Epsg>,
) -> ToolCommand {
    let command = ToolCommand::new("shp2pgsql").args(["-d", "-I"]);
    let with_srid = match epsg {
        Some(code) => command.arg("-s").arg(code.code().to_string()),
        None => command,
    };
    with_srid.arg(shapefile.as_str()).arg(table.as_str())
}

/// `pgsql2shp` exporting `table` to `output`.
#[must_use]
pub fn pgsql2shp_command(db: &PostgreSql, table: &Identifier, output: &Utf8Path) -> ToolCommand {
    let profile = db.profile();
    let (user, _) = profile.credentials(Target::Working);
    let command = ToolCommand::new("pgsql2shp")
        .arg("-f")
        .arg(output.as_str())
        .arg("-h")
        .arg(profile.host.clone())
        .arg("-p")
        .arg(profile.port.to_string())
        .arg("-u")
        .arg(user)
        .arg(db.database().as_str())
        .arg(table.as_str());
    with_libpq_env(command, profile, Target::Working)
}

/// `ogr2ogr` loading `source` into `table`, one row per geometry part.
///
/// The geometry column is named `geom`, the feature id `gid`, and any
/// existing table is overwritten. `src_epsg` declares the source CRS when the
/// file does not carry one.
#[must_use]
pub fn ogr2ogr_import_command(
    db: &PostgreSql,
    table: &Identifier,
    source: &Utf8Path,
    src_epsg: Option<Epsg>,
) -> ToolCommand {
    let command = ToolCommand::new("ogr2ogr")
        .args(["-f", "PostgreSQL", "-overwrite", "-explodecollections"])
        .args(["-lco", "GEOMETRY_NAME=geom", "-lco", "FID=gid"])
        .args(["-lco", "SPATIAL_INDEX=NONE"])
        .arg("-nln")
        .arg(table.as_str());
    let with_srs = match src_epsg {
        Some(code) => command.arg("-a_srs").arg(code.to_string()),
        None => command,
    };
    let full = with_srs.arg(ogr_connection(db)).arg(source.as_str());
    with_libpq_env(full, db.profile(), Target::Working)
}

/// `ogr2ogr` writing `table` to `destination` with the given OGR driver.
#[must_use]
pub fn ogr2ogr_export_command(
    db: &PostgreSql,
    table: &Identifier,
    destination: &Utf8Path,
    driver: &str,
) -> ToolCommand {
    let command = ToolCommand::new("ogr2ogr")
        .arg("-f")
        .arg(driver)
        .arg(destination.as_str())
        .arg(ogr_connection(db))
        .arg(table.as_str());
    with_libpq_env(command, db.profile(), Target::Working)
}

/// Statements run after `ogr2ogr` has written `table`.
///
/// The feature id stays as a plain `gid` column; `uid` becomes the key.
fn ogr_import_cleanup(table: &Identifier) -> [String; 3] {
    [
        format!("{};", sql::delete_null_geometries(table)),
        sql::drop_primary_key(table),
        sql::add_uid_column(table),
    ]
}

fn check(program: &str, output: Output) -> Result<Output, ToolError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            program: program.to_owned(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

/// Run `tool` to completion and return its standard output.
pub async fn run(tool: &ToolCommand) -> Result<Vec<u8>, ToolError> {
    log::debug!("running {} {}", tool.program, tool.args.join(" "));
    let output = tool
        .command()
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| tool.spawn_failed(err))?;
    Ok(check(&tool.program, output)?.stdout)
}

/// Run `producer` with its standard output fed into `consumer`.
pub async fn pipe(producer: &ToolCommand, consumer: &ToolCommand) -> Result<(), ToolError> {
    log::debug!("piping {} into {}", producer.program, consumer.program);
    let pipe_error = |source| ToolError::Pipe {
        from: producer.program.clone(),
        to: consumer.program.clone(),
        source,
    };

    let mut source = producer
        .command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| producer.spawn_failed(err))?;
    let mut sink = consumer
        .command()
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| consumer.spawn_failed(err))?;

    let mut reader = source
        .stdout
        .take()
        .ok_or_else(|| pipe_error(std::io::Error::other("producer stdout was not captured")))?;
    let mut writer = sink
        .stdin
        .take()
        .ok_or_else(|| pipe_error(std::io::Error::other("consumer stdin was not captured")))?;
    let transfer = async move {
        let copied = tokio::io::copy(&mut reader, &mut writer).await;
        drop(writer);
        copied
    };

    // Both stderr streams are drained while the copy runs.
    let (copied, produced, consumed) = tokio::join!(
        transfer,
        source.wait_with_output(),
        sink.wait_with_output()
    );
    // Consumer failures take precedence over the broken pipe they cause.
    check(
        &consumer.program,
        consumed.map_err(|err| consumer.spawn_failed(err))?,
    )?;
    check(
        &producer.program,
        produced.map_err(|err| producer.spawn_failed(err))?,
    )?;
    copied.map_err(pipe_error)?;
    Ok(())
}

fn create_dir(path: &Utf8Path) -> Result<(), ToolError> {
    pgis_fs::ensure_dir(path).map_err(|source| ToolError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

impl PostgreSql {
    /// Dump the working database to `{folder}/{database}.sql`.
    pub async fn export_pgdump_file(&self, folder: &Utf8Path) -> Result<Utf8PathBuf, ToolError> {
        create_dir(folder)?;
        let output = folder.join(format!("{}.sql", self.database()));
        self.report(
            Importance::Progress,
            format_args!("Exporting {} to {output}", self.database()),
        );
        run(&pg_dump_command(self, &output)).await?;
        Ok(output)
    }

    /// Copy `table` into the database behind `other`, creating it if needed.
    pub async fn transfer_table_to(
        &self,
        table: &Identifier,
        other: &Self,
    ) -> Result<(), ToolError> {
        other.create().await?;
        self.report(
            Importance::Progress,
            format_args!(
                "Copying {table} from {} to {} @ {}",
                self.database(),
                other.database(),
                other.profile().host
            ),
        );
        pipe(&pg_dump_table_command(self, table), &psql_command(other)).await
    }

    /// Load a shapefile into `table` with `shp2pgsql`.
    pub async fn shp2pgsql(
        &self,
        table: &Identifier,
        shapefile: &Utf8Path,
        epsg: Option<Epsg>,
    ) -> Result<(), ToolError> {
        self.report(
            Importance::Progress,
            format_args!("Loading {shapefile} into {table} with shp2pgsql"),
        );
        pipe(
            &shp2pgsql_command(table, shapefile, epsg),
            &psql_command(self),
        )
        .await
    }

    /// Export `table` to `{folder}/{table}.shp` with `pgsql2shp`.
    pub async fn pgsql2shp(
        &self,
        table: &Identifier,
        folder: &Utf8Path,
    ) -> Result<Utf8PathBuf, ToolError> {
        create_dir(folder)?;
        let output = folder.join(format!("{table}.shp"));
        self.report(
            Importance::Progress,
            format_args!("Exporting {table} to {output}"),
        );
        run(&pgsql2shp_command(self, table, &output)).await?;
        Ok(output)
    }

    /// Load any OGR-readable file into `table`.
    ///
    /// Multi-part features are split, features without a geometry are
    /// removed, and the table gets a `uid` primary key and a spatial index.
    pub async fn import_geodata(
        &self,
        table: &Identifier,
        source: &Utf8Path,
        src_epsg: Option<Epsg>,
    ) -> Result<(), ToolError> {
        self.report(
            Importance::Progress,
            format_args!("Loading geodata into {table}"),
        );
        run(&ogr2ogr_import_command(self, table, source, src_epsg)).await?;
        self.execute(&ogr_import_cleanup(table).join("\n"), Target::Working)
            .await?;
        self.add_spatial_index(table).await?;
        Ok(())
    }

    /// Write `table` to `destination` using an OGR driver such as
    /// [`DEFAULT_OGR_DRIVER`] or `"ESRI Shapefile"`.
    pub async fn export_geodata(
        &self,
        table: &Identifier,
        destination: &Utf8Path,
        driver: &str,
    ) -> Result<(), ToolError> {
        if let Some(parent) = destination.parent() {
            create_dir(parent)?;
        }
        self.report(
            Importance::Progress,
            format_args!("Exporting {table} to {destination}"),
        );
        run(&ogr2ogr_export_command(self, table, destination, driver)).await?;
        Ok(())
    }
}
