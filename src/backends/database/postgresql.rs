use crate::backends::{adapter_options, Database, DatabaseContext};
use crate::utils::CommandSpec;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct PostgresOptions {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    database: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    exclude_tables: Vec<String>,
    /// Extra pg_dump arguments, whitespace separated
    #[serde(default)]
    args: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

/// `pg_dump` into `<dump_path>/<database>.sql`
pub struct PostgreSql {
    ctx: DatabaseContext,
    options: PostgresOptions,
}

impl PostgreSql {
    pub fn new(ctx: DatabaseContext) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self { ctx, options })
    }

    fn command(&self) -> CommandSpec {
        let opts = &self.options;
        let dump_file = self.ctx.dump_path.join(format!("{}.sql", opts.database));

        let mut spec = CommandSpec::new("pg_dump")
            .arg(format!("--host={}", opts.host))
            .arg(format!("--port={}", opts.port));

        if let Some(ref username) = opts.username {
            spec = spec.arg(format!("--username={}", username));
        }
        for table in &opts.tables {
            spec = spec.arg(format!("--table={}", table));
        }
        for table in &opts.exclude_tables {
            spec = spec.arg(format!("--exclude-table={}", table));
        }
        if let Some(ref args) = opts.args {
            spec = spec.args(args.split_whitespace());
        }
        if let Some(ref password) = opts.password {
            spec = spec.env("PGPASSWORD", password.as_str());
        }

        spec.arg(format!("--file={}", dump_file.display()))
            .arg(opts.database.as_str())
            .timeout(self.ctx.timeout)
    }
}

impl Database for PostgreSql {
    fn perform(&self) -> Result<()> {
        info!("Dumping PostgreSQL database '{}'", self.options.database);
        self.ctx
            .executor
            .run(&self.command())
            .context("pg_dump failed")?;
        info!("Dump path: {}", self.ctx.dump_path.display());
        Ok(())
    }
}
