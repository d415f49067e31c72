//! End-to-end model runs

use packvault::managers::notification::{failure_title, success_title};
use packvault::utils::locker::BackupLock;
use test_utils::{
    ConfigBuilder, MockExecutor, MockResponse, PipelineError, ResultAssertions, Stage, SubConfig,
    TestContext,
};

fn notifications(ctx: &TestContext) -> Vec<String> {
    ctx.backends.events_with("notify:")
}

#[test]
fn test_successful_run() {
    let ctx = TestContext::with_minimal_config();

    let report = ctx.manager().perform("app").assert_ok();

    assert_eq!(report.model, "app");
    assert_eq!(report.storages, vec!["disk"]);
    assert_eq!(
        notifications(&ctx),
        vec![format!("notify:hook:{}", success_title("app"))]
    );
    assert_eq!(ctx.backends.stored("disk"), vec![report.key.clone()]);
    assert_eq!(ctx.ledger("app", "disk").len(), 1);
    assert!(ctx.leftover_workspaces().is_empty());
}

#[test]
fn test_no_archive_rules_skips_archive_stage() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal().configure("app", |m| m.archive = Some(Default::default())),
    );

    ctx.manager().perform("app").assert_ok();

    let tar = ctx.executor.calls_to("tar");
    assert!(!tar.iter().any(|c| c.has_arg("-cPf")), "archive stage ran");
    assert_eq!(tar.iter().filter(|c| c.has_arg("-cf")).count(), 1);
}

#[test]
fn test_archive_runs_before_compress() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal().with_archive("app", &["/etc/hosts"], &[]),
    );

    ctx.manager().perform("app").assert_ok();

    let creates: Vec<_> = ctx
        .executor
        .calls_to("tar")
        .into_iter()
        .filter(|c| !c.has_arg("--version"))
        .collect();
    assert_eq!(creates.len(), 2);
    assert!(creates[0].has_arg("-cPf"));
    assert!(creates[1].has_arg("-cf"));
}

#[test]
fn test_second_storage_failure_reports_failure_only() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_storages(
        "app",
        vec![
            SubConfig::new("disk", "mock"),
            SubConfig::new("remote", "mock").with("fail_upload", true),
        ],
    ));

    let err = ctx.manager().perform("app").unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Store));
    assert!(err.to_string().contains("remote"));

    assert_eq!(
        notifications(&ctx),
        vec![format!("notify:hook:{}", failure_title("app"))]
    );

    // The failing session is still closed
    let events = ctx.backends.events();
    let position = |e: &str| events.iter().position(|x| x == e).unwrap();
    assert!(position("close:disk") < position("open:remote"));
    assert!(position("close:remote") < position(&format!("notify:hook:{}", failure_title("app"))));

    // The first storage completed, retention included
    assert_eq!(ctx.ledger("app", "disk").len(), 1);
    assert!(ctx.ledger("app", "remote").is_empty());
    assert!(ctx.leftover_workspaces().is_empty());
}

#[test]
fn test_first_failing_database_stops_the_rest() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_databases(
        "app",
        vec![
            SubConfig::new("one", "mock"),
            SubConfig::new("two", "mock").with("fail", true),
            SubConfig::new("three", "mock"),
        ],
    ));

    let err = ctx.manager().perform("app").unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Dump));

    assert_eq!(ctx.backends.events_with("dump:"), vec!["dump:one", "dump:two"]);
    assert!(ctx.backends.events_with("open:").is_empty());
    assert!(!ctx.executor.was_called("tar"));
}

#[test]
fn test_unknown_storage_type_is_reported() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal().with_storages("app", vec![SubConfig::new("ftp", "ftp")]),
    );

    let result = ctx.manager().perform("app");
    result.assert_err_contains("storage type 'ftp' is not implemented");
    assert_eq!(
        notifications(&ctx),
        vec![format!("notify:hook:{}", failure_title("app"))]
    );
}

#[test]
fn test_panic_is_contained_and_workspace_removed() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .with_databases("app", vec![SubConfig::new("main", "mock").with("panic", true)]),
    );

    let err = ctx.manager().perform("app").unwrap_err();
    match err {
        PipelineError::Panicked(message) => assert!(message.contains("panicked")),
        other => panic!("expected a panic error, got {}", other),
    }

    assert_eq!(
        notifications(&ctx),
        vec![format!("notify:hook:{}", failure_title("app"))]
    );
    assert!(ctx.leftover_workspaces().is_empty());
}

#[test]
fn test_busy_model_is_rejected_without_notifying() {
    let ctx = TestContext::with_minimal_config();
    let model = ctx.model("app");
    let _held = BackupLock::acquire(&model.state_directory.join("locks"), "app").unwrap();

    let err = ctx.manager().perform("app").unwrap_err();
    assert!(matches!(err, PipelineError::Busy(_)));
    assert!(err.to_string().contains("already running"));
    assert!(ctx.backends.events().is_empty());
}

#[test]
fn test_failing_notifier_does_not_fail_the_run() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_notifiers(
        "app",
        vec![
            SubConfig::new("broken", "mock").with("fail", true),
            SubConfig::new("ok", "mock"),
            SubConfig::new("quiet", "mock").with("on_success", false),
        ],
    ));

    ctx.manager().perform("app").assert_ok();

    let sent = notifications(&ctx);
    assert_eq!(sent.len(), 2);
    assert!(sent[0].starts_with("notify:broken:"));
    assert!(sent[1].starts_with("notify:ok:"));
}

#[test]
fn test_encrypted_artifact_name() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().configure("app", |m| {
        m.encrypt_with = Some(SubConfig::new("", "openssl").with("password", "secret"));
    }));

    let report = ctx.manager().perform("app").assert_ok();
    assert!(report.key.ends_with(".tar.enc"), "{}", report.key);

    let call = &ctx.executor.calls_to("openssl")[0];
    assert!(!call.args.iter().any(|a| a.contains("secret")));
}

#[test]
fn test_unknown_encryptor_is_unsupported() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().configure("app", |m| {
        m.encrypt_with = Some(SubConfig::new("", "gpg"));
    }));

    let err = ctx.manager().perform("app").unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Unsupported {
            stage: Stage::Encrypt,
            ..
        }
    ));
    assert!(ctx.backends.events_with("upload:").is_empty());
}

#[test]
fn test_compress_failure_aborts_before_upload() {
    let ctx = TestContext::with_executor(
        ConfigBuilder::minimal(),
        MockExecutor::new().expect("tar", MockResponse::failure("tar: write error")),
    );

    let err = ctx.manager().perform("app").unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Compress));
    assert!(err.to_string().contains("write error"));
    assert!(ctx.backends.events_with("open:").is_empty());
}

#[test]
fn test_perform_all_skips_disabled_models() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_model("second")
            .add_disabled_model("off"),
    );

    let results = ctx.manager().perform_all();
    let names: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["app", "second"]);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
}
