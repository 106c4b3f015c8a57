//! Behavioural tests for profile file parsing using rstest-bdd.

use std::cell::RefCell;

use pgis_core::{Profile, ProfileError, ProfileSet, STARTER_CONFIG};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[derive(Debug, Default)]
struct ProfileWorld {
    document: RefCell<String>,
    profiles: RefCell<Option<ProfileSet>>,
    error: RefCell<Option<ProfileError>>,
}

impl ProfileWorld {
    fn localhost(&self) -> Profile {
        self.profiles
            .borrow()
            .as_ref()
            .expect("profiles should be parsed")
            .get("localhost")
            .expect("localhost profile")
            .clone()
    }
}

#[fixture]
fn world() -> ProfileWorld {
    ProfileWorld::default()
}

#[given("the starter profile file")]
fn given_starter(world: &ProfileWorld) {
    world.document.replace(STARTER_CONFIG.to_owned());
}

#[given("a profile file with a misspelt password key")]
fn given_misspelt(world: &ProfileWorld) {
    world
        .document
        .replace("[localhost]\nhost = \"localhost\"\npasswd = \"secret\"\n".to_owned());
}

#[when("I parse the profile file")]
fn parse_file(world: &ProfileWorld) {
    match ProfileSet::parse(&world.document.borrow()) {
        Ok(profiles) => {
            world.profiles.replace(Some(profiles));
        }
        Err(err) => {
            world.error.replace(Some(err));
        }
    }
}

#[when("I look up the staging profile")]
fn look_up_staging(world: &ProfileWorld) {
    let err = world
        .profiles
        .borrow()
        .as_ref()
        .expect("profiles should be parsed")
        .get("staging")
        .expect_err("staging is not defined");
    world.error.replace(Some(err));
}

#[then("the localhost profile uses the default super password")]
fn then_inherits(world: &ProfileWorld) {
    assert_eq!(
        world.localhost().connection.super_password,
        "this-is-another-placeholder-password"
    );
}

#[then("the localhost profile connects on port 5432")]
fn then_port(world: &ProfileWorld) {
    assert_eq!(world.localhost().connection.port, 5432);
}

#[then("parsing fails with a profile parse error")]
fn then_parse_error(world: &ProfileWorld) {
    let binding = world.error.borrow();
    let error = binding.as_ref().expect("an error should be recorded");
    assert!(matches!(error, ProfileError::Parse(_)));
}

#[then("the lookup error names digitalocean and localhost")]
fn then_lookup_error(world: &ProfileWorld) {
    let binding = world.error.borrow();
    let error = binding.as_ref().expect("an error should be recorded");
    match error {
        ProfileError::UnknownProfile { name, known } => {
            assert_eq!(name, "staging");
            assert_eq!(known, &["digitalocean", "localhost"]);
        }
        ProfileError::Parse(other) => panic!("unexpected parse error: {other}"),
    }
}

#[scenario(path = "tests/features/profiles.feature", index = 0)]
fn profiles_inherit_defaults(world: ProfileWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/profiles.feature", index = 1)]
fn unknown_keys_rejected(world: ProfileWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/profiles.feature", index = 2)]
fn missing_profile_lists_names(world: ProfileWorld) {
    let _ = world;
}
