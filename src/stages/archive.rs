//! File tree archive: `tar -cPf <dump>/archive.tar` of the configured paths

use super::StageEnv;
use crate::config::ArchiveConfig;
use crate::utils::CommandSpec;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Normalize a path the way users expect tar patterns to match
/// (no `.` segments, no duplicate or trailing separators)
fn clean_path(path: &str) -> String {
    let cleaned: PathBuf = Path::new(path).components().collect();
    if cleaned.as_os_str().is_empty() {
        ".".to_string()
    } else {
        cleaned.display().to_string()
    }
}

/// Build the tar invocation for `config`
pub fn command(config: &ArchiveConfig, dump_path: &Path, gnu_tar: bool) -> Result<CommandSpec> {
    if config.includes.is_empty() {
        bail!("archive.includes have no config");
    }

    let mut spec = CommandSpec::new("tar");
    if gnu_tar {
        spec = spec.arg("--ignore-failed-read");
    }
    spec = spec
        .arg("-cPf")
        .arg(dump_path.join("archive.tar").display().to_string());

    for exclude in &config.excludes {
        spec = spec.arg(format!("--exclude={}", clean_path(exclude)));
    }
    spec = spec.args(config.includes.iter().map(|p| clean_path(p)));

    Ok(spec)
}

/// Archive the configured paths into the dump directory
pub fn run(config: &ArchiveConfig, dump_path: &Path, env: &StageEnv) -> Result<()> {
    info!("Archiving {} include rules", config.includes.len());

    let spec = command(config, dump_path, env.is_gnu_tar())?.timeout(env.timeout);
    env.executor.run(&spec).context("tar failed")?;

    info!("Archive: {}", dump_path.join("archive.tar").display());
    Ok(())
}
