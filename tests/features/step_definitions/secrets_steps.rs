//! Secret reconciliation step definitions

use crate::features::support::TestWorld;
use cucumber::{given, then, when};
use stack_installer::models::{SecretGenerator, SecretKeySpec};
use stack_installer::services::reconcile_secret_set;

fn split_keys(keys: &str) -> Vec<String> {
    keys.split(',').map(|k| k.trim().to_string()).collect()
}

fn value_of(contents: &str, key: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        line.split_once('=')
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
}

#[given("an empty project directory")]
async fn empty_project(world: &mut TestWorld) {
    world.project = Some(tempfile::TempDir::new().expect("create temp project dir"));
}

#[given(expr = "the required secret keys {string}")]
async fn required_keys(world: &mut TestWorld, keys: String) {
    world.required_keys = split_keys(&keys)
        .into_iter()
        .map(|k| SecretKeySpec::new(k, SecretGenerator::Hex32))
        .collect();
}

#[given(expr = "the secrets file {string} contains {string}")]
async fn secrets_file_contains(world: &mut TestWorld, file: String, line: String) {
    let path = world.project_path(&file);
    std::fs::write(path, format!("{}\n", line)).expect("write secrets file");
}

#[when(expr = "I reconcile the secrets file {string}")]
async fn reconcile_file(world: &mut TestWorld, file: String) {
    let path = world.project_path(&file);
    let outcome = reconcile_secret_set(&path, &world.required_keys).expect("reconcile secrets");
    world.last_outcome = Some(outcome);
    world.snapshot = Some(world.read(&file));
}

#[when(expr = "I reconcile the secrets file {string} again")]
async fn reconcile_file_again(world: &mut TestWorld, file: String) {
    let path = world.project_path(&file);
    let outcome = reconcile_secret_set(&path, &world.required_keys).expect("reconcile secrets");
    world.last_outcome = Some(outcome);
}

#[then(expr = "the secrets file {string} contains values for {string}")]
async fn file_has_values(world: &mut TestWorld, file: String, keys: String) {
    let contents = world.read(&file);
    for key in split_keys(&keys) {
        let value = value_of(&contents, &key).unwrap_or_default();
        assert!(!value.is_empty(), "{} has no value", key);
    }
}

#[then(expr = "the secrets file {string} is readable only by its owner")]
async fn owner_only(world: &mut TestWorld, file: String) {
    let path = world.project_path(&file);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).expect("stat").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
    #[cfg(not(unix))]
    assert!(path.exists());
}

#[then(expr = "the value of {string} in {string} is {string}")]
async fn value_is(world: &mut TestWorld, key: String, file: String, expected: String) {
    let contents = world.read(&file);
    assert_eq!(value_of(&contents, &key), Some(expected));
}

#[then(expr = "the generated values for {string} and {string} in {string} differ")]
async fn values_differ(world: &mut TestWorld, first: String, second: String, file: String) {
    let contents = world.read(&file);
    let a = value_of(&contents, &first).expect("first key missing");
    let b = value_of(&contents, &second).expect("second key missing");
    assert_ne!(a, b);
}

#[then(expr = "the secrets file {string} is unchanged by the second run")]
async fn unchanged(world: &mut TestWorld, file: String) {
    let contents = world.read(&file);
    assert_eq!(Some(contents), world.snapshot.clone());
    let outcome = world.last_outcome.as_ref().expect("no reconciliation ran");
    assert!(outcome.is_noop());
}
