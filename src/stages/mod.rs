//! Local pipeline stages: archive, compress, encrypt and split.
//!
//! Each stage runs external tools through a [`CommandExecutor`] and hands its
//! output path to the next one. Database dumps and uploads go through the
//! backend registries instead.

pub mod archive;
pub mod compressor;
pub mod encryptor;
pub mod splitter;
pub mod workspace;

pub use workspace::Workspace;

use crate::utils::{CommandExecutor, CommandSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shared inputs of the local stages
pub struct StageEnv<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub timeout: Duration,
}

impl StageEnv<'_> {
    /// GNU tar understands `--ignore-failed-read`; bsdtar does not
    pub fn is_gnu_tar(&self) -> bool {
        self.executor
            .run_stdout(&CommandSpec::new("tar").arg("--version"))
            .map(|out| out.contains("GNU"))
            .unwrap_or(false)
    }
}

/// A single archive file plus the extension it carries (".tar.gz", ".tar.gz.enc")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub extension: String,
}

/// What gets uploaded: one file, or a directory of chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    File(PathBuf),
    Chunks { dir: PathBuf, parts: Vec<PathBuf> },
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl Artifact {
    pub fn local_path(&self) -> &Path {
        match self {
            Artifact::File(path) => path,
            Artifact::Chunks { dir, .. } => dir,
        }
    }

    /// Primary remote key: the file or directory name
    pub fn key(&self) -> String {
        file_name(self.local_path())
    }

    /// Remote keys of the chunks (`<dir>/<chunk>`); empty for a single file
    pub fn secondary_keys(&self) -> Vec<String> {
        match self {
            Artifact::File(_) => Vec::new(),
            Artifact::Chunks { dir, parts } => {
                let dir = file_name(dir);
                parts
                    .iter()
                    .map(|part| format!("{}/{}", dir, file_name(part)))
                    .collect()
            }
        }
    }

    /// Every `(remote key, local file)` pair to transfer
    pub fn uploads(&self) -> Vec<(String, &Path)> {
        match self {
            Artifact::File(path) => vec![(self.key(), path.as_path())],
            Artifact::Chunks { parts, .. } => self
                .secondary_keys()
                .into_iter()
                .zip(parts.iter().map(PathBuf::as_path))
                .collect(),
        }
    }
}
