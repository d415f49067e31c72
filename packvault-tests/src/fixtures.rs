//! Test fixtures and sample data

use chrono::{Duration, TimeZone, Utc};
use packvault::managers::cycler::Package;

/// Packages `0.tar`, `1.tar`, ... one hour apart, oldest first
pub fn sample_packages(count: usize) -> Vec<Package> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| Package {
            file_key: format!("{}.tar", i),
            file_keys: Vec::new(),
            created_at: start + Duration::hours(i as i64),
        })
        .collect()
}

/// A chunked upload: directory `name` with `parts` members
pub fn chunked_package(name: &str, parts: usize) -> Package {
    let file_keys = (0..parts)
        .map(|i| format!("{}/{}.tar-{:03}", name, name, i))
        .collect::<Vec<_>>();
    Package::new(name, &file_keys)
}

/// Smallest valid config file
pub fn minimal_config_toml() -> &'static str {
    r#"
[global]
workspace = "{workspace}"
state_directory = "{state}"
log_directory = "{logs}"

[models.app]
description = "Application database"

[models.app.schedule]
cron = "0 3 * * *"

[[models.app.databases]]
name = "main"
type = "postgresql"
database = "app"

[[models.app.storages]]
name = "disk"
type = "local"
path = "{backups}"
keep = 7
"#
}

/// Config with two models, one scheduled in-process and one disabled
pub fn multi_model_config_toml() -> &'static str {
    r#"
[global]
workspace = "{workspace}"
state_directory = "{state}"
log_directory = "{logs}"

[models.app]
description = "Application database"

[models.app.schedule]
every = "1day"
at = "04:30"

[[models.app.databases]]
name = "main"
type = "mysql"
database = "app"

[models.app.compress_with]
type = "tgz"

[models.app.encrypt_with]
type = "openssl"
password = "secret"

[[models.app.storages]]
name = "disk"
type = "local"
path = "{backups}"

[[models.app.storages]]
name = "offsite"
type = "s3"
bucket = "backups"
region = "eu-west-1"
keep = 30

[[models.app.notifiers]]
name = "ops"
type = "slack"
url = "https://hooks.slack.example/T000/B000"
on_success = false

[models.files]
enabled = false

[models.files.archive]
includes = ["/etc", "/home"]
excludes = ["/home/*/.cache"]

[[models.files.storages]]
name = "disk"
type = "local"
path = "{backups}"
"#
}

/// Fill the `{placeholders}` of a template with paths under `root`
pub fn render(template: &str, root: &std::path::Path) -> String {
    template
        .replace("{workspace}", &root.join("work").display().to_string())
        .replace("{state}", &root.join("state").display().to_string())
        .replace("{logs}", &root.join("logs").display().to_string())
        .replace("{backups}", &root.join("backups").display().to_string())
}
