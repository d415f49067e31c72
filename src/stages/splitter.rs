//! Optional chunking of the final archive with `split`

use super::{ArchiveFile, Artifact, StageEnv};
use crate::config::SplitConfig;
use crate::utils::CommandSpec;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Directory holding the chunks: the archive path without its extension
pub fn chunk_dir(archive: &ArchiveFile) -> PathBuf {
    let path = archive.path.display().to_string();
    PathBuf::from(
        path.strip_suffix(archive.extension.as_str())
            .unwrap_or(path.as_str()),
    )
}

/// Split `archive` into `<dir>/<archive name>-<suffix>` chunks and remove it
pub fn run(config: &SplitConfig, archive: ArchiveFile, env: &StageEnv) -> Result<Artifact> {
    if config.chunk_size.trim().is_empty() {
        bail!("chunk_size option is required");
    }

    info!("Split to chunks of {}", config.chunk_size);

    let dir = chunk_dir(&archive);
    if dir == archive.path {
        bail!(
            "cannot derive a chunk directory from {}",
            archive.path.display()
        );
    }
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let archive_name = archive
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let prefix = dir.join(format!("{}-", archive_name));

    let mut spec = CommandSpec::new("split")
        .args(["-b", config.chunk_size.trim()])
        .args(["-a".to_string(), config.suffix_length.to_string()]);
    if config.numeric_suffixes {
        spec = spec.arg("--numeric-suffixes");
    }
    let spec = spec
        .arg(archive.path.display().to_string())
        .arg(prefix.display().to_string())
        .timeout(env.timeout);

    env.executor.run(&spec).context("split failed")?;

    fs::remove_file(&archive.path)
        .with_context(|| format!("Failed to remove {}", archive.path.display()))?;

    let mut parts: Vec<PathBuf> = fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    parts.sort();

    info!("Split done: {} chunks in {}", parts.len(), dir.display());
    Ok(Artifact::Chunks { dir, parts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::executor::mock::MockExecutor;
    use std::time::Duration;

    fn split_config() -> SplitConfig {
        SplitConfig {
            chunk_size: "100M".to_string(),
            suffix_length: 3,
            numeric_suffixes: true,
        }
    }

    #[test]
    fn test_chunk_dir_strips_extension() {
        let archive = ArchiveFile {
            path: PathBuf::from("/tmp/run/2024.01.01.00.00.00.tar.gz.enc"),
            extension: ".tar.gz.enc".to_string(),
        };
        assert_eq!(chunk_dir(&archive), PathBuf::from("/tmp/run/2024.01.01.00.00.00"));
    }

    #[test]
    fn test_split_collects_chunks_and_removes_archive() {
        let root = tempfile::tempdir().unwrap();
        let archive_path = root.path().join("2024.01.01.00.00.00.tar");
        fs::write(&archive_path, b"data").unwrap();
        let archive = ArchiveFile {
            path: archive_path.clone(),
            extension: ".tar".to_string(),
        };

        // Chunks the real split would produce
        let dir = root.path().join("2024.01.01.00.00.00");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("2024.01.01.00.00.00.tar-001"), b"b").unwrap();
        fs::write(dir.join("2024.01.01.00.00.00.tar-000"), b"a").unwrap();

        let executor = MockExecutor::new();
        let env = StageEnv {
            executor: &executor,
            timeout: Duration::from_secs(10),
        };
        let artifact = run(&split_config(), archive, &env).unwrap();

        assert!(!archive_path.exists());
        assert_eq!(artifact.key(), "2024.01.01.00.00.00");
        assert_eq!(
            artifact.secondary_keys(),
            vec![
                "2024.01.01.00.00.00/2024.01.01.00.00.00.tar-000",
                "2024.01.01.00.00.00/2024.01.01.00.00.00.tar-001",
            ]
        );

        let call = &executor.calls_to("split")[0];
        assert_eq!(&call.args[..5], &["-b", "100M", "-a", "3", "--numeric-suffixes"]);
        assert!(call.args[6].ends_with("2024.01.01.00.00.00/2024.01.01.00.00.00.tar-"));
    }

    #[test]
    fn test_chunk_size_required() {
        let executor = MockExecutor::new();
        let env = StageEnv {
            executor: &executor,
            timeout: Duration::from_secs(10),
        };
        let config = SplitConfig {
            chunk_size: " ".to_string(),
            ..split_config()
        };
        let archive = ArchiveFile {
            path: PathBuf::from("/tmp/x.tar"),
            extension: ".tar".to_string(),
        };
        assert!(run(&config, archive, &env).is_err());
    }
}
