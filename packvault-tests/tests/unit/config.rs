//! Configuration loading, validation and resolution

use packvault::config::{find_model, load_config, parse_config, resolve_all_models, ConfigError};
use packvault::config::CompressFormat;
use serial_test::serial;
use std::time::Duration;
use test_utils::{minimal_config_toml, multi_model_config_toml, render, ConfigBuilder, ResultAssertions};

#[test]
fn test_minimal_template_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("packvault.toml");
    std::fs::write(&path, render(minimal_config_toml(), dir.path())).unwrap();

    let config = load_config(&path).assert_ok();
    let app = find_model(&config, "app").assert_ok();

    assert!(app.enabled);
    assert_eq!(app.schedule.cron.as_deref(), Some("0 3 * * *"));
    assert_eq!(app.databases[0].kind, "postgresql");
    assert_eq!(app.storages[0].settings.get("keep").and_then(|v| v.as_integer()), Some(7));
    assert_eq!(app.timeout, Duration::from_secs(3600));
    assert_eq!(app.state_directory, dir.path().join("state"));
}

#[test]
fn test_multi_model_template() {
    let dir = tempfile::tempdir().unwrap();
    let config = parse_config(&render(multi_model_config_toml(), dir.path())).assert_ok();
    let models = resolve_all_models(&config);

    let app = &models["app"];
    assert_eq!(app.compress_with.format, CompressFormat::Gzip);
    assert_eq!(app.encrypt_with.as_ref().unwrap().kind, "openssl");
    let storages: Vec<&str> = app.storages.iter().map(|s| s.label()).collect();
    assert_eq!(storages, vec!["disk", "offsite"]);
    assert_eq!(app.schedule.to_string(), "every 1day at 04:30");

    let files = &models["files"];
    assert!(!files.enabled);
    assert!(files.archive.as_ref().unwrap().has_rules());
    assert!(files.databases.is_empty());
}

#[test]
fn test_builder_config_survives_toml() {
    let (path, _dir) = ConfigBuilder::minimal()
        .add_model("second")
        .with_timeout(90)
        .write();

    let config = load_config(&path).assert_ok();
    assert_eq!(config.models.len(), 2);
    assert_eq!(find_model(&config, "second").unwrap().timeout, Duration::from_secs(90));
}

#[test]
fn test_unknown_model_lookup() {
    let config = ConfigBuilder::minimal().build();
    assert!(matches!(find_model(&config, "ghost"), Err(ConfigError::ModelNotFound(_))));
}

#[test]
fn test_model_without_storage_rejected() {
    let result = parse_config(
        r#"
[models.app]
[[models.app.databases]]
name = "main"
type = "postgresql"
database = "app"
"#,
    );
    result.assert_err_contains("at least one storage");
}

#[test]
fn test_duplicate_storage_names_rejected() {
    let result = parse_config(
        r#"
[[models.app.storages]]
name = "disk"
type = "local"
path = "/a"

[[models.app.storages]]
name = "disk"
type = "local"
path = "/b"
"#,
    );
    result.assert_err_contains("duplicate storages entry 'disk'");
}

#[test]
fn test_cron_and_every_are_exclusive() {
    let result = parse_config(
        r#"
[models.app.schedule]
cron = "0 3 * * *"
every = "1day"

[[models.app.storages]]
name = "disk"
type = "local"
path = "/a"
"#,
    );
    result.assert_err_contains("mutually exclusive");
}

#[test]
fn test_unknown_compression_rejected() {
    let result = parse_config(
        r#"
[models.app.compress_with]
type = "rar"

[[models.app.storages]]
name = "disk"
type = "local"
path = "/a"
"#,
    );
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
#[serial]
fn test_tilde_directories_follow_home() {
    let home = tempfile::tempdir().unwrap();
    let previous = std::env::var_os("HOME");
    std::env::set_var("HOME", home.path());

    let config = parse_config(
        r#"
[global]
state_directory = "~/.packvault"

[[models.app.storages]]
name = "disk"
type = "local"
path = "/a"
"#,
    );
    let app = config.map(|c| find_model(&c, "app"));

    match previous {
        Some(value) => std::env::set_var("HOME", value),
        None => std::env::remove_var("HOME"),
    }

    let app = app.assert_ok().unwrap();
    assert_eq!(app.state_directory, home.path().join(".packvault"));
}
