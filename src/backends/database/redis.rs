use crate::backends::{adapter_options, Database, DatabaseContext};
use crate::utils::CommandSpec;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum RedisMode {
    /// Stream a fresh RDB snapshot from the server with `redis-cli --rdb`
    Sync,
    /// Copy the server's RDB file from the local filesystem
    #[default]
    Copy,
}

#[derive(Debug, Deserialize)]
struct RedisOptions {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    mode: RedisMode,
    #[serde(default = "default_rdb_path")]
    rdb_path: PathBuf,
    /// Run `SAVE` before copying the RDB file
    #[serde(default = "default_invoke_save")]
    invoke_save: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_rdb_path() -> PathBuf {
    PathBuf::from("/var/db/redis/dump.rdb")
}

fn default_invoke_save() -> bool {
    true
}

pub struct Redis {
    ctx: DatabaseContext,
    options: RedisOptions,
}

impl Redis {
    pub fn new(ctx: DatabaseContext) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self { ctx, options })
    }

    fn cli(&self) -> CommandSpec {
        let opts = &self.options;
        let mut spec = CommandSpec::new("redis-cli")
            .args(["-h", opts.host.as_str()])
            .args(["-p".to_string(), opts.port.to_string()]);
        if let Some(ref password) = opts.password {
            spec = spec.env("REDISCLI_AUTH", password.as_str());
        }
        spec.timeout(self.ctx.timeout)
    }

    fn save(&self) -> Result<()> {
        info!("Running redis-cli SAVE");
        let out = self
            .ctx
            .executor
            .run_stdout(&self.cli().arg("SAVE"))
            .context("redis-cli SAVE failed")?;

        if !out.trim().ends_with("OK") {
            bail!("Failed to invoke the SAVE command, response was: {}", out.trim());
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        let dump_file = self.ctx.dump_path.join("dump.rdb");
        info!("Syncing redis dump to {}", dump_file.display());
        self.ctx
            .executor
            .run(&self.cli().arg("--rdb").arg(dump_file.display().to_string()))
            .context("redis-cli --rdb failed")?;
        Ok(())
    }

    fn copy(&self) -> Result<()> {
        let rdb_path = &self.options.rdb_path;
        if !rdb_path.exists() {
            bail!("Redis RDB file {} does not exist", rdb_path.display());
        }

        if self.options.invoke_save {
            self.save()?;
        }

        info!("Copying redis dump to {}", self.ctx.dump_path.display());
        let spec = CommandSpec::new("cp")
            .arg(rdb_path.display().to_string())
            .arg(self.ctx.dump_path.display().to_string())
            .timeout(self.ctx.timeout);
        self.ctx
            .executor
            .run(&spec)
            .context("Failed to copy redis dump file")?;
        Ok(())
    }
}

impl Database for Redis {
    fn perform(&self) -> Result<()> {
        match self.options.mode {
            RedisMode::Sync => self.sync(),
            RedisMode::Copy => self.copy(),
        }
    }
}
