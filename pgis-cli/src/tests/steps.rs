//! Behaviour-driven step definitions for the profile and backup commands.

use super::helpers::ScratchProfiles;
use super::*;
use pgis_core::ProfileError;
use pgis_data::ConfigError;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

struct CliWorld {
    scratch: ScratchProfiles,
    backup_args: RefCell<BackupArgs>,
    plan: RefCell<Option<BackupPlan>>,
    error: RefCell<Option<CliError>>,
}

impl CliWorld {
    fn new() -> Self {
        Self {
            scratch: ScratchProfiles::new(),
            backup_args: RefCell::new(BackupArgs::default()),
            plan: RefCell::new(None),
            error: RefCell::new(None),
        }
    }

    fn configure(&self) -> Result<Utf8PathBuf, CliError> {
        configure_databases(&ConfigureArgs {
            filepath: Some(self.scratch.path().to_path_buf()),
            overwrite: false,
        })
    }

    fn plan(&self) -> BackupPlan {
        self.plan
            .borrow()
            .clone()
            .expect("a plan should be resolved")
    }
}

#[fixture]
fn world() -> CliWorld {
    CliWorld::new()
}

#[given("a scratch profile path")]
fn scratch_path(#[from(world)] world: &CliWorld) {
    assert!(!world.scratch.path().exists(), "scratch path starts empty");
}

#[given("backup arguments without host or folder")]
fn bare_backup_args(#[from(world)] world: &CliWorld) {
    world.backup_args.replace(BackupArgs::default());
}

#[when("I configure databases at the scratch path")]
fn configure(#[from(world)] world: &CliWorld) {
    world.configure().expect("profile file is written");
}

#[when("I configure databases at the scratch path again")]
fn configure_again(#[from(world)] world: &CliWorld) {
    if let Err(err) = world.configure() {
        world.error.replace(Some(err));
    }
}

#[when("I connect to the staging cluster")]
fn connect_staging(#[from(world)] world: &CliWorld) {
    let plan = ClusterPlan::new(
        Some("staging".to_owned()),
        Some(world.scratch.path().to_path_buf()),
    );
    if let Err(err) = plan.super_database() {
        world.error.replace(Some(err));
    }
}

#[when("I resolve the backup plan")]
fn resolve_plan(#[from(world)] world: &CliWorld) {
    let args = world.backup_args.borrow().clone();
    world.plan.replace(Some(BackupPlan::from(args)));
}

#[then("the scratch profile file lists localhost and digitalocean")]
fn lists_profiles(#[from(world)] world: &CliWorld) {
    let profiles = config::read_config_file(world.scratch.path()).expect("profiles parse");
    assert_eq!(
        profiles.names().collect::<Vec<_>>(),
        ["digitalocean", "localhost"]
    );
}

#[then("configuring fails because the file exists")]
fn fails_exists(#[from(world)] world: &CliWorld) {
    let binding = world.error.borrow();
    match binding.as_ref() {
        Some(CliError::Profiles(ConfigError::AlreadyExists { path })) => {
            assert_eq!(path, world.scratch.path());
        }
        other => panic!("expected AlreadyExists, found {other:?}"),
    }
}

#[then("the error lists the known profiles")]
fn lists_known(#[from(world)] world: &CliWorld) {
    let binding = world.error.borrow();
    match binding.as_ref() {
        Some(CliError::UnknownHost(ProfileError::UnknownProfile { name, known })) => {
            assert_eq!(name, "staging");
            assert_eq!(known, &["digitalocean", "localhost"]);
        }
        other => panic!("expected UnknownProfile, found {other:?}"),
    }
}

#[then("the plan targets localhost")]
fn targets_localhost(#[from(world)] world: &CliWorld) {
    assert_eq!(world.plan().cluster.host, DEFAULT_HOST);
}

#[then("the output folder is the localhost folder in the outbox")]
fn outbox_folder(#[from(world)] world: &CliWorld) {
    let outbox = Utf8Path::new("/srv/pgis/outbox");
    assert_eq!(
        world.plan().output_folder(outbox),
        Utf8Path::new("/srv/pgis/outbox/localhost")
    );
}

#[scenario(path = "tests/features/cli_profiles.feature", index = 0)]
fn configure_writes_profiles(world: CliWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/cli_profiles.feature", index = 1)]
fn configure_refuses_clobber(world: CliWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/cli_profiles.feature", index = 2)]
fn backups_default_to_outbox(world: CliWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/cli_profiles.feature", index = 3)]
fn unknown_hosts_rejected(world: CliWorld) {
    let _ = world;
}
