use crate::backends::{adapter_options, Database, DatabaseContext};
use crate::config::expand_tilde;
use crate::utils::CommandSpec;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Deserialize)]
struct SqliteOptions {
    path: PathBuf,
}

/// `sqlite3 <path> .dump` written to `<dump_path>/<file stem>.sql`
pub struct Sqlite {
    ctx: DatabaseContext,
    path: PathBuf,
}

impl Sqlite {
    pub fn new(ctx: DatabaseContext) -> Result<Self> {
        let options: SqliteOptions = adapter_options(&ctx.config)?;
        Ok(Self {
            path: expand_tilde(&options.path),
            ctx,
        })
    }

    fn dump_file(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "database".to_string());
        self.ctx.dump_path.join(format!("{}.sql", stem))
    }
}

impl Database for Sqlite {
    fn perform(&self) -> Result<()> {
        info!("Dumping SQLite database {}", self.path.display());

        let spec = CommandSpec::new("sqlite3")
            .arg(self.path.display().to_string())
            .arg(".dump")
            .timeout(self.ctx.timeout);
        let sql = self
            .ctx
            .executor
            .run_stdout(&spec)
            .context("sqlite3 .dump failed")?;

        let dump_file = self.dump_file();
        std::fs::write(&dump_file, sql)
            .with_context(|| format!("Failed to write {}", dump_file.display()))?;

        info!("Dump path: {}", dump_file.display());
        Ok(())
    }
}
