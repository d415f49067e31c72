//! Retention properties of the cycler

use rstest::rstest;
use std::fs;
use test_utils::{chunked_package, sample_packages, Cycler, Package};

fn seeded(dir: &std::path::Path, packages: &[Package]) -> Cycler {
    let path = dir.join("ledger.json");
    fs::write(&path, serde_json::to_string(packages).unwrap()).unwrap();
    let mut cycler = Cycler::new(path);
    cycler.load().unwrap();
    cycler
}

#[rstest]
#[case(0, 0)]
#[case(0, 5)]
#[case(1, 0)]
#[case(1, 5)]
#[case(3, 3)]
#[case(3, 10)]
#[case(10, 3)]
fn test_enforce_keeps_newest(#[case] keep: usize, #[case] n: usize) {
    let dir = tempfile::tempdir().unwrap();
    let packages = sample_packages(n);
    let mut cycler = seeded(dir.path(), &packages);

    let mut deleted = Vec::new();
    cycler.enforce(keep, |key| {
        deleted.push(key.to_string());
        Ok(())
    });

    let expected_len = if keep == 0 { n } else { n.min(keep) };
    assert_eq!(cycler.packages().len(), expected_len);

    // Survivors are exactly the most recently appended ones, in order
    assert_eq!(cycler.packages(), &packages[n - expected_len..]);

    // Deleted are the oldest, in order
    let expected_deleted: Vec<String> = packages[..n - expected_len]
        .iter()
        .map(|p| p.file_key.clone())
        .collect();
    assert_eq!(deleted, expected_deleted);
}

#[test]
fn test_just_recorded_package_counts_toward_keep() {
    let dir = tempfile::tempdir().unwrap();
    let mut cycler = seeded(dir.path(), &sample_packages(2));

    let removed = cycler.run("new.tar", &[], 2, |_| Ok(()));

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].file_key, "0.tar");
    let kept: Vec<&str> = cycler.packages().iter().map(|p| p.file_key.as_str()).collect();
    assert_eq!(kept, vec!["1.tar", "new.tar"]);
}

#[test]
fn test_chunked_package_deletes_members_then_directory() {
    let package = Package::new("p", &["a".to_string(), "b".to_string()]);
    assert_eq!(package.deletion_keys(), vec!["a", "b", "p/"]);

    let package = chunked_package("2024.01.01.00.00.00", 2);
    assert_eq!(
        package.deletion_keys(),
        vec![
            "2024.01.01.00.00.00/2024.01.01.00.00.00.tar-000",
            "2024.01.01.00.00.00/2024.01.01.00.00.00.tar-001",
            "2024.01.01.00.00.00/",
        ]
    );
}

#[rstest]
#[case("a")]
#[case("b")]
#[case("p/")]
fn test_one_failed_delete_of_three(#[case] failing: &str) {
    let dir = tempfile::tempdir().unwrap();
    let mut cycler = seeded(
        dir.path(),
        &[
            Package::new("p", &["a".to_string(), "b".to_string()]),
            Package::new("q.tar", &[]),
        ],
    );

    let mut deleted = Vec::new();
    cycler.enforce(1, |key| {
        if key == failing {
            anyhow::bail!("backend error");
        }
        deleted.push(key.to_string());
        Ok(())
    });

    let expected: Vec<&str> = ["a", "b", "p/"].into_iter().filter(|k| *k != failing).collect();
    assert_eq!(deleted, expected);
    assert_eq!(cycler.packages().len(), 1);
    assert_eq!(cycler.packages()[0].file_key, "q.tar");
}

#[test]
fn test_save_then_reload_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut packages = sample_packages(3);
    packages.push(chunked_package("chunks", 3));
    let cycler = seeded(dir.path(), &packages);
    assert!(cycler.save().unwrap());

    let mut reloaded = Cycler::new(cycler.path());
    reloaded.load().unwrap();
    assert_eq!(reloaded.packages(), packages.as_slice());
}

#[test]
fn test_never_loaded_cycler_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("ledger.json");

    let cycler = Cycler::new(&path);
    assert!(!cycler.save().unwrap());
    assert!(!path.exists());
    assert!(!path.parent().unwrap().exists());
}

#[test]
fn test_unreadable_ledger_blocks_pruning_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    fs::write(&path, "[{\"file_key\": 1}]").unwrap();

    let mut cycler = Cycler::new(&path);
    let removed = cycler.run("new.tar", &[], 1, |_| panic!("must not delete"));

    assert!(removed.is_empty());
    assert!(!cycler.is_loaded());
    assert_eq!(fs::read_to_string(&path).unwrap(), "[{\"file_key\": 1}]");
}
