//! Per-run temporary directory, removed when the run ends

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{error, info};

/// Owns a unique `<root>/<model>-XXXXXX` directory and deletes it on drop,
/// on every exit path including an unwinding panic.
///
/// Layout:
/// - `temp_path()`: the run directory; the compressed archive lands here
/// - `dump_path()`: `<temp>/<model>`, where dumps and the file archive go
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    temp_path: PathBuf,
    dump_path: PathBuf,
}

impl Workspace {
    pub fn create(root: &Path, model: &str) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", model))
            .tempdir_in(root)?;

        let temp_path = dir.path().to_path_buf();
        let dump_path = temp_path.join(model);
        fs::create_dir_all(&dump_path)?;
        info!("WorkDir: {}", dump_path.display());

        Ok(Self {
            dir: Some(dir),
            temp_path,
            dump_path,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }

    /// Name of the dump directory relative to the temp path
    pub fn dump_dir_name(&self) -> String {
        self.dump_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            info!("Cleanup temp: {}/", self.temp_path.display());
            if let Err(e) = dir.close() {
                error!("Cleanup temp dir {} error: {}", self.temp_path.display(), e);
            }
        }
    }
}
