use crate::backends::{adapter_options, Database, DatabaseContext};
use crate::utils::CommandSpec;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Which client tool family performs the dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MySqlFlavor {
    MySql,
    MariaDb,
}

impl MySqlFlavor {
    fn program(&self) -> &'static str {
        match self {
            MySqlFlavor::MySql => "mysqldump",
            MySqlFlavor::MariaDb => "mariadb-dump",
        }
    }
}

#[derive(Debug, Deserialize)]
struct MySqlOptions {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    database: String,
    #[serde(default = "default_username")]
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    exclude_tables: Vec<String>,
    #[serde(default)]
    args: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_username() -> String {
    "root".to_string()
}

/// `mysqldump` / `mariadb-dump` into `<dump_path>/<database>.sql`
pub struct MySql {
    ctx: DatabaseContext,
    options: MySqlOptions,
    flavor: MySqlFlavor,
}

impl MySql {
    pub fn new(ctx: DatabaseContext, flavor: MySqlFlavor) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self {
            ctx,
            options,
            flavor,
        })
    }

    fn command(&self) -> CommandSpec {
        let opts = &self.options;
        let dump_file = self.ctx.dump_path.join(format!("{}.sql", opts.database));

        let mut spec = CommandSpec::new(self.flavor.program())
            .args(["--host", opts.host.as_str()])
            .args(["--port".to_string(), opts.port.to_string()])
            .args(["-u", opts.username.as_str()]);

        if let Some(ref password) = opts.password {
            spec = spec.env("MYSQL_PWD", password.as_str());
        }
        for table in &opts.exclude_tables {
            spec = spec.arg(format!("--ignore-table={}.{}", opts.database, table));
        }
        if let Some(ref args) = opts.args {
            spec = spec.args(args.split_whitespace());
        }

        spec = spec.arg(opts.database.as_str());
        for table in &opts.tables {
            spec = spec.arg(table.as_str());
        }

        spec.arg(format!("--result-file={}", dump_file.display()))
            .timeout(self.ctx.timeout)
    }
}

impl Database for MySql {
    fn perform(&self) -> Result<()> {
        info!(
            "Dumping {} database '{}'",
            match self.flavor {
                MySqlFlavor::MySql => "MySQL",
                MySqlFlavor::MariaDb => "MariaDB",
            },
            self.options.database
        );
        self.ctx
            .executor
            .run(&self.command())
            .with_context(|| format!("{} failed", self.flavor.program()))?;
        info!("Dump path: {}", self.ctx.dump_path.display());
        Ok(())
    }
}
