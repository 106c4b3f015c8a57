//! Command-line interface for pgis.
//!
//! Subcommands create the profile file and back up or list the databases on
//! a cluster named by a profile. Options for the cluster commands are
//! layered by `ortho_config` from CLI flags, `PGIS_*` environment variables
//! and configuration files.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use clap::{Parser, Subcommand};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pgis_core::Identifier;
use pgis_core::Verbosity;
use pgis_core::timing::{clock_time, report_time_delta};
use pgis_data::{PostgreSql, config};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

mod error;

pub use error::CliError;

const ARG_DATABASE: &str = "database";
const ENV_DATABASE: &str = "PGIS_CMDS_BACKUP_SINGLE_DATABASE_DATABASE";

/// Profile used when `--host` is not given.
pub const DEFAULT_HOST: &str = "localhost";

/// Run the pgis CLI with the current process arguments and environment.
pub async fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse()?;
    init_logging(cli.verbosity);
    let started = Local::now();
    log::info!("Started at {}", clock_time(&started));
    dispatch(cli.command).await?;
    log::info!("{}", report_time_delta(started, Local::now()));
    Ok(())
}

/// Install the `tracing` subscriber that also receives `log` records.
///
/// `RUST_LOG` wins over `verbosity` when set. Repeated calls are ignored.
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(verbosity.level_filter().as_str().to_ascii_lowercase())
    });
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
    {
        log::debug!("logging was already initialised: {err}");
    }
}

async fn dispatch(command: Command) -> Result<(), CliError> {
    match command {
        Command::ConfigureDatabases(args) => {
            let path = configure_databases(&args)?;
            emit(&[format!("-> Configure your database connections at {path}")]);
        }
        Command::BackupAllDatabases(args) => {
            let plan = args.into_plan()?;
            log::info!("Backing up databases on {}", plan.cluster.host);
            let written = backup_all_databases(&plan).await?;
            emit(&written.iter().map(|path| format!("-> {path}")).collect::<Vec<_>>());
        }
        Command::BackupSingleDatabase(args) => {
            let plan = args.into_plan()?;
            log::info!(
                "Backing up {} from {}",
                plan.database,
                plan.backup.cluster.host
            );
            let path = backup_single_database(&plan).await?;
            emit(&[format!("-> {path}")]);
        }
        Command::ListDatabases(args) => {
            let plan = args.into_plan()?;
            emit(&list_databases(&plan).await?);
        }
    }
    Ok(())
}

#[expect(
    clippy::print_stdout,
    reason = "command results are written to stdout for the user"
)]
fn emit(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "pgis",
    about = "Manage PostgreSQL/PostGIS databases described by connection profiles",
    version
)]
struct Cli {
    /// How much progress to report: full, minimal or errors.
    #[arg(long, global = true, default_value = "minimal", value_name = "level")]
    verbosity: Verbosity,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a profile file describing database connections.
    ConfigureDatabases(ConfigureArgs),
    /// Dump every database on a cluster except its super database.
    BackupAllDatabases(BackupArgs),
    /// Dump one database from a cluster.
    BackupSingleDatabase(BackupSingleArgs),
    /// Print the databases on a cluster.
    ListDatabases(ClusterArgs),
}

/// CLI arguments for `configure-databases`.
#[derive(Debug, Clone, Default, clap::Args)]
struct ConfigureArgs {
    /// Where to write the profile file (defaults to ~/.pgis/databases.toml).
    #[arg(long, short = 'f', value_name = "path")]
    filepath: Option<Utf8PathBuf>,
    /// Replace an existing profile file.
    #[arg(long, short = 'o')]
    overwrite: bool,
}

/// CLI arguments naming a cluster.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "list-databases", about = "Print the databases on a cluster")]
#[ortho_config(prefix = "PGIS")]
struct ClusterArgs {
    /// Profile naming the cluster (defaults to localhost).
    #[arg(long, value_name = "profile")]
    #[serde(default)]
    host: Option<String>,
    /// Profile file to read (defaults to ~/.pgis/databases.toml).
    #[arg(long, value_name = "path")]
    #[serde(default)]
    config: Option<Utf8PathBuf>,
}

impl ClusterArgs {
    fn into_plan(self) -> Result<ClusterPlan, CliError> {
        let merged = self.load_and_merge()?;
        Ok(ClusterPlan::from(merged))
    }
}

/// CLI arguments for `backup-all-databases`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "backup-all-databases",
    about = "Dump every database on a cluster except its super database"
)]
#[ortho_config(prefix = "PGIS")]
struct BackupArgs {
    /// Profile naming the cluster (defaults to localhost).
    #[arg(long, value_name = "profile")]
    #[serde(default)]
    host: Option<String>,
    /// Folder for the `.sql` files (defaults to ~/.pgis/data/outbox/{host}).
    #[arg(long, short = 'f', value_name = "path")]
    #[serde(default)]
    folder: Option<Utf8PathBuf>,
    /// Profile file to read (defaults to ~/.pgis/databases.toml).
    #[arg(long, value_name = "path")]
    #[serde(default)]
    config: Option<Utf8PathBuf>,
}

impl BackupArgs {
    fn into_plan(self) -> Result<BackupPlan, CliError> {
        let merged = self.load_and_merge()?;
        Ok(BackupPlan::from(merged))
    }
}

/// CLI arguments for `backup-single-database`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "backup-single-database", about = "Dump one database from a cluster")]
#[ortho_config(prefix = "PGIS")]
struct BackupSingleArgs {
    /// Database to dump.
    #[arg(long = ARG_DATABASE, value_name = "name")]
    #[serde(default)]
    database: Option<String>,
    /// Profile naming the cluster (defaults to localhost).
    #[arg(long, value_name = "profile")]
    #[serde(default)]
    host: Option<String>,
    /// Folder for the `.sql` file (defaults to ~/.pgis/data/outbox/{host}).
    #[arg(long, short = 'f', value_name = "path")]
    #[serde(default)]
    folder: Option<Utf8PathBuf>,
    /// Profile file to read (defaults to ~/.pgis/databases.toml).
    #[arg(long, value_name = "path")]
    #[serde(default)]
    config: Option<Utf8PathBuf>,
}

impl BackupSingleArgs {
    fn into_plan(self) -> Result<SingleBackupPlan, CliError> {
        let merged = self.load_and_merge()?;
        SingleBackupPlan::try_from(merged)
    }
}

/// Which cluster to talk to and where its profile lives.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClusterPlan {
    host: String,
    config: Option<Utf8PathBuf>,
}

impl ClusterPlan {
    fn new(host: Option<String>, config: Option<Utf8PathBuf>) -> Self {
        Self {
            host: host.unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            config,
        }
    }

    /// The cluster's super database, which can see every other database.
    fn super_database(&self) -> Result<PostgreSql, CliError> {
        let profiles = config::configurations(self.config.as_deref())?;
        let super_db = profiles.get(&self.host)?.connection.super_db.clone();
        Ok(config::database_for(&profiles, &self.host, super_db)?)
    }
}

impl From<ClusterArgs> for ClusterPlan {
    fn from(args: ClusterArgs) -> Self {
        Self::new(args.host, args.config)
    }
}

/// A cluster plus the folder dumps are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BackupPlan {
    cluster: ClusterPlan,
    folder: Option<Utf8PathBuf>,
}

impl BackupPlan {
    /// The explicit folder, or `{outbox}/{host}`.
    fn output_folder(&self, outbox: &Utf8Path) -> Utf8PathBuf {
        self.folder
            .clone()
            .unwrap_or_else(|| outbox.join(&self.cluster.host))
    }

    fn resolve_output_folder(&self) -> Result<Utf8PathBuf, CliError> {
        match &self.folder {
            Some(folder) => Ok(folder.clone()),
            None => Ok(self.output_folder(&config::default_data_folders()?.outbox)),
        }
    }
}

impl From<BackupArgs> for BackupPlan {
    fn from(args: BackupArgs) -> Self {
        Self {
            cluster: ClusterPlan::new(args.host, args.config),
            folder: args.folder,
        }
    }
}

/// A backup of one named database.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SingleBackupPlan {
    database: Identifier,
    backup: BackupPlan,
}

impl TryFrom<BackupSingleArgs> for SingleBackupPlan {
    type Error = CliError;

    fn try_from(args: BackupSingleArgs) -> Result<Self, Self::Error> {
        let name = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_DATABASE,
        })?;
        Ok(Self {
            database: Identifier::new(name)?,
            backup: BackupPlan {
                cluster: ClusterPlan::new(args.host, args.config),
                folder: args.folder,
            },
        })
    }
}

/// Write the starter profile file and return where it went.
fn configure_databases(args: &ConfigureArgs) -> Result<Utf8PathBuf, CliError> {
    let path = match &args.filepath {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    config::make_config_file(&path, args.overwrite)?;
    Ok(path)
}

async fn backup_all_databases(plan: &BackupPlan) -> Result<Vec<Utf8PathBuf>, CliError> {
    let cluster = plan.cluster.super_database()?;
    let folder = plan.resolve_output_folder()?;
    let mut written = Vec::new();
    for name in cluster.all_databases_on_cluster().await? {
        if name == cluster.database().as_str() {
            continue;
        }
        let database = match Identifier::new(&name) {
            Ok(database) => database,
            Err(err) => {
                log::warn!("Skipping database {name:?}: {err}");
                continue;
            }
        };
        written.push(
            cluster
                .on_database(database)
                .export_pgdump_file(&folder)
                .await?,
        );
    }
    Ok(written)
}

async fn backup_single_database(plan: &SingleBackupPlan) -> Result<Utf8PathBuf, CliError> {
    let cluster = plan.backup.cluster.super_database()?;
    let database = cluster.on_database(plan.database.clone());
    if !database.exists().await? {
        return Err(CliError::UnknownDatabase {
            database: plan.database.to_string(),
            host: plan.backup.cluster.host.clone(),
        });
    }
    let folder = plan.backup.resolve_output_folder()?;
    Ok(database.export_pgdump_file(&folder).await?)
}

async fn list_databases(plan: &ClusterPlan) -> Result<Vec<String>, CliError> {
    let cluster = plan.super_database()?;
    Ok(cluster.all_databases_on_cluster().await?)
}

#[cfg(test)]
mod tests;
