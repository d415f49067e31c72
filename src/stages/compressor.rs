//! Packs the dump directory into one tar file, compressed per `compress_with`

use super::{ArchiveFile, StageEnv, Workspace};
use crate::config::CompressConfig;
use crate::utils::CommandSpec;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;

/// Archive file names are the run's local start time
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d.%H.%M.%S";

/// Build the tar invocation; `parallel_program` replaces the built-in filter
pub fn command(
    config: &CompressConfig,
    workspace: &Workspace,
    archive: &ArchiveFile,
    gnu_tar: bool,
    parallel_program: Option<&str>,
) -> CommandSpec {
    let mut spec = CommandSpec::new("tar");
    if gnu_tar {
        spec = spec.arg("--ignore-failed-read");
    }

    match (parallel_program, config.format.tar_flag()) {
        (Some(program), _) => spec = spec.arg(format!("--use-compress-program={}", program)),
        (None, Some(flag)) => spec = spec.arg(flag),
        (None, None) => {}
    }

    spec.arg("-cf")
        .arg(archive.path.display().to_string())
        .arg("-C")
        .arg(workspace.temp_path().display().to_string())
        .arg(workspace.dump_dir_name())
}

/// Compress the workspace's dump directory into `<temp>/<timestamp><ext>`
pub fn run(
    config: &CompressConfig,
    workspace: &Workspace,
    started_at: DateTime<Local>,
    env: &StageEnv,
) -> Result<ArchiveFile> {
    let extension = config.format.extension().to_string();
    let archive = ArchiveFile {
        path: workspace
            .temp_path()
            .join(format!("{}{}", started_at.format(TIMESTAMP_FORMAT), extension)),
        extension,
    };

    let parallel_program = if config.parallel {
        config
            .format
            .parallel_program()
            .filter(|program| env.executor.is_available(program))
    } else {
        None
    };

    info!(
        "Compress with {:?}{}",
        config.format,
        parallel_program
            .map(|p| format!(" ({})", p))
            .unwrap_or_default()
    );

    let spec = command(config, workspace, &archive, env.is_gnu_tar(), parallel_program)
        .timeout(env.timeout);
    env.executor.run(&spec).context("tar failed")?;

    info!("-> {}", archive.path.display());
    Ok(archive)
}
