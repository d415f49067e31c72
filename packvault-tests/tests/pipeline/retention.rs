//! Retention across runs: ledger plus remote pruning

use std::fs;
use test_utils::{sample_packages, ConfigBuilder, Package, ResultAssertions, SubConfig, TestContext};

fn with_disk(storage: SubConfig) -> TestContext {
    TestContext::from_builder(ConfigBuilder::minimal().with_storages("app", vec![storage]))
}

#[test]
fn test_keep_prunes_oldest_after_upload() {
    let ctx = with_disk(SubConfig::new("disk", "mock").with("keep", 2));
    ctx.seed_ledger("app", "disk", &sample_packages(2));
    ctx.backends.seed("disk", &["0.tar", "1.tar"]);

    let report = ctx.manager().perform("app").assert_ok();
    assert_eq!(report.expired, 1);

    let kept: Vec<String> = ctx.ledger("app", "disk").into_iter().map(|p| p.file_key).collect();
    assert_eq!(kept, vec!["1.tar".to_string(), report.key.clone()]);

    let mut remote = ctx.backends.stored("disk");
    remote.sort();
    let mut expected = vec!["1.tar".to_string(), report.key.clone()];
    expected.sort();
    assert_eq!(remote, expected);

    assert_eq!(ctx.backends.events_with("delete:"), vec!["delete:disk:0.tar"]);
}

#[test]
fn test_delete_happens_between_upload_and_close() {
    let ctx = with_disk(SubConfig::new("disk", "mock").with("keep", 1));
    ctx.seed_ledger("app", "disk", &sample_packages(1));
    ctx.backends.seed("disk", &["0.tar"]);

    ctx.manager().perform("app").assert_ok();

    let events = ctx.backends.events();
    let position = |e: &str| events.iter().position(|x| x.starts_with(e)).unwrap();
    assert!(position("upload:disk:") < position("delete:disk:0.tar"));
    assert!(position("delete:disk:0.tar") < position("close:disk"));
}

#[test]
fn test_zero_keep_retains_everything() {
    let ctx = with_disk(SubConfig::new("disk", "mock"));
    ctx.seed_ledger("app", "disk", &sample_packages(3));

    let report = ctx.manager().perform("app").assert_ok();

    assert_eq!(report.expired, 0);
    assert_eq!(ctx.ledger("app", "disk").len(), 4);
    assert!(ctx.backends.events_with("delete:").is_empty());
}

#[test]
fn test_failed_directory_delete_still_drops_package() {
    let ctx = with_disk(
        SubConfig::new("disk", "mock")
            .with("keep", 1)
            .with("fail_delete", vec!["old/"]),
    );
    let old = Package::new("old", &["old/a".to_string(), "old/b".to_string()]);
    ctx.seed_ledger("app", "disk", &[old]);
    ctx.backends.seed("disk", &["old/a", "old/b"]);

    let report = ctx.manager().perform("app").assert_ok();

    assert_eq!(
        ctx.backends.events_with("delete:"),
        vec!["delete:disk:old/a", "delete:disk:old/b", "delete:disk:old/"]
    );
    assert_eq!(ctx.backends.stored("disk"), vec![report.key.clone()]);

    let ledger = ctx.ledger("app", "disk");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].file_key, report.key);
}

#[test]
fn test_unreadable_ledger_skips_pruning() {
    let ctx = with_disk(SubConfig::new("disk", "mock").with("keep", 1));
    let path = ctx.ledger_file("app", "disk");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "not json").unwrap();

    // The upload itself still counts as a success
    ctx.manager().perform("app").assert_ok();

    assert!(ctx.backends.events_with("delete:").is_empty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
}

#[test]
fn test_each_storage_keeps_its_own_ledger() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_storages(
        "app",
        vec![
            SubConfig::new("disk", "mock").with("keep", 1),
            SubConfig::new("vault", "mock"),
        ],
    ));
    ctx.seed_ledger("app", "disk", &sample_packages(2));
    ctx.seed_ledger("app", "vault", &sample_packages(2));
    ctx.backends.seed("disk", &["0.tar", "1.tar"]);
    ctx.backends.seed("vault", &["0.tar", "1.tar"]);

    let report = ctx.manager().perform("app").assert_ok();

    assert_eq!(report.storages, vec!["disk", "vault"]);
    assert_eq!(ctx.ledger("app", "disk").len(), 1);
    assert_eq!(ctx.ledger("app", "vault").len(), 3);
    assert_eq!(ctx.backends.stored("vault").len(), 3);
    assert_ne!(ctx.ledger_file("app", "disk"), ctx.ledger_file("app", "vault"));
}

#[test]
fn test_history_is_per_model() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_model("other").configure(
        "other",
        |m| m.storages = vec![SubConfig::new("disk", "mock").with("keep", 1)],
    ));
    ctx.seed_ledger("app", "disk", &sample_packages(3));

    ctx.manager().perform("other").assert_ok();

    assert_eq!(ctx.ledger("app", "disk").len(), 3);
    assert_eq!(ctx.ledger("other", "disk").len(), 1);
}

#[test]
fn test_underscored_names_do_not_share_history() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .add_model("db_prod")
            .configure("db_prod", |m| {
                m.storages = vec![SubConfig::new("s3", "mock").with("keep", 1)]
            })
            .add_model("db")
            .configure("db", |m| {
                m.storages = vec![SubConfig::new("prod_s3", "mock").with("keep", 1)]
            }),
    );
    assert_ne!(ctx.ledger_file("db_prod", "s3"), ctx.ledger_file("db", "prod_s3"));

    let first = ctx.manager().perform("db_prod").assert_ok();
    let second = ctx.manager().perform("db").assert_ok();

    assert_eq!(second.expired, 0);
    assert!(ctx.backends.events_with("delete:").is_empty());

    let keys = |model: &str, storage: &str| -> Vec<String> {
        ctx.ledger(model, storage).into_iter().map(|p| p.file_key).collect()
    };
    assert_eq!(keys("db_prod", "s3"), vec![first.key]);
    assert_eq!(keys("db", "prod_s3"), vec![second.key]);
}
