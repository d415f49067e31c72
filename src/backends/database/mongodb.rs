use crate::backends::{adapter_options, Database, DatabaseContext};
use crate::utils::CommandSpec;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct MongoOptions {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    authdb: Option<String>,
    #[serde(default)]
    oplog: bool,
    #[serde(default)]
    exclude_tables: Vec<String>,
    #[serde(default)]
    args: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    27017
}

/// `mongodump --out=<dump_path>`
pub struct MongoDb {
    ctx: DatabaseContext,
    options: MongoOptions,
}

impl MongoDb {
    pub fn new(ctx: DatabaseContext) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self { ctx, options })
    }

    fn command(&self) -> CommandSpec {
        let opts = &self.options;
        let mut spec = CommandSpec::new("mongodump");

        if let Some(ref database) = opts.database {
            spec = spec.arg(format!("--db={}", database));
        }
        if let Some(ref username) = opts.username {
            spec = spec.arg(format!("--username={}", username));
        }
        if let Some(ref password) = opts.password {
            spec = spec.secret_arg(format!("--password={}", password));
        }
        if let Some(ref authdb) = opts.authdb {
            spec = spec.arg(format!("--authenticationDatabase={}", authdb));
        }
        spec = spec
            .arg(format!("--host={}", opts.host))
            .arg(format!("--port={}", opts.port));
        for collection in &opts.exclude_tables {
            spec = spec.arg(format!("--excludeCollection={}", collection));
        }
        if opts.oplog {
            spec = spec.arg("--oplog");
        }
        if let Some(ref args) = opts.args {
            spec = spec.args(args.split_whitespace());
        }

        spec.arg(format!("--out={}", self.ctx.dump_path.display()))
            .timeout(self.ctx.timeout)
    }
}

impl Database for MongoDb {
    fn perform(&self) -> Result<()> {
        info!("Dumping MongoDB");
        self.ctx
            .executor
            .run(&self.command())
            .context("mongodump failed")?;
        info!("Dump path: {}", self.ctx.dump_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::database::test_support::context;
    use crate::config::SubConfig;
    use crate::utils::executor::mock::MockExecutor;
    use std::path::Path;

    #[test]
    fn test_password_is_masked() {
        let executor = MockExecutor::new();
        let config = SubConfig::new("docs", "mongodb")
            .with("database", "app")
            .with("username", "admin")
            .with("password", "topsecret")
            .with("oplog", true);

        let db = MongoDb::new(context(config, Path::new("/dump/mongodb/docs"), &executor)).unwrap();
        let spec = db.command();
        assert!(!spec.to_string().contains("topsecret"));

        db.perform().unwrap();
        let call = &executor.calls_to("mongodump")[0];
        assert!(call.has_arg("--db=app"));
        assert!(call.has_arg("--password=topsecret"));
        assert!(call.has_arg("--oplog"));
        assert_eq!(call.args.last().map(String::as_str), Some("--out=/dump/mongodb/docs"));
    }
}
