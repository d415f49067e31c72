use crate::backends::{adapter_options, FileItem, Storage, StorageContext};
use crate::config::expand_tilde;
use crate::stages::Artifact;
use crate::utils::CommandSpec;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Deserialize)]
struct LocalOptions {
    path: PathBuf,
}

/// Copies artifacts into a directory on this machine
pub struct Local {
    ctx: StorageContext,
    path: PathBuf,
}

impl Local {
    pub fn new(ctx: StorageContext) -> Result<Self> {
        let options: LocalOptions = adapter_options(&ctx.config)?;
        Ok(Self {
            path: expand_tilde(&options.path),
            ctx,
        })
    }
}

impl Storage for Local {
    fn open(&mut self) -> Result<()> {
        fs::create_dir_all(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))
    }

    fn upload(&self, artifact: &Artifact) -> Result<()> {
        let target = self.path.join(artifact.key());

        let spec = CommandSpec::new("cp")
            .arg("-a")
            .arg(artifact.local_path().display().to_string())
            .arg(target.display().to_string())
            .timeout(self.ctx.timeout);
        self.ctx
            .executor
            .run(&spec)
            .with_context(|| format!("Failed to copy to {}", target.display()))?;

        info!("Store succeeded: {}", target.display());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        if let Some(dir) = key.strip_suffix('/') {
            let target = self.path.join(dir);
            info!("Deleting directory {}", target.display());
            // Members were deleted one by one before, so the directory is empty
            fs::remove_dir(&target)
                .with_context(|| format!("Failed to remove {}", target.display()))
        } else {
            let target = self.path.join(key);
            info!("Deleting {}", target.display());
            fs::remove_file(&target)
                .with_context(|| format!("Failed to remove {}", target.display()))
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<FileItem>> {
        let dir = self.path.join(prefix);
        let mut items = Vec::new();

        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                continue;
            }
            items.push(FileItem {
                name: entry.file_name().to_string_lossy().to_string(),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn download(&self, _key: &str) -> Result<String> {
        bail!("local storage does not support download")
    }

    fn close(&mut self) {}
}
