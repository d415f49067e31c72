//! Utilities for running commands with proper error handling and timeouts

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::{debug, error};

const MASK: &str = "******";

/// One external command invocation.
///
/// Arguments added with [`CommandSpec::secret_arg`] and every environment value
/// are masked when the spec is displayed, so a spec can be logged as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    secret_args: Vec<usize>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument that must never show up in logs
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_secret(&self, index: usize) -> bool {
        self.secret_args.contains(&index)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, _) in &self.envs {
            write!(f, "{}={} ", key, MASK)?;
        }
        write!(f, "{}", self.program)?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.is_secret(i) {
                write!(f, " {}", MASK)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Run a command, failing on a non-zero exit status or when the timeout expires
pub fn run(spec: &CommandSpec) -> Result<Output> {
    debug!("Running command: {}", spec);

    let output = match spec.timeout {
        Some(limit) => run_with_timeout(spec, limit)?,
        None => spec
            .to_command()
            .output()
            .context(format!("Failed to execute {}", spec.program))?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {}", spec);
        error!("Stderr: {}", stderr.trim());
        anyhow::bail!(
            "{} failed with exit code {:?}: {}",
            spec.program,
            output.status.code(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout.trim());
    }

    Ok(output)
}

/// Run a command and return stdout as string
pub fn run_stdout(spec: &CommandSpec) -> Result<String> {
    let output = run(spec)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn run_with_timeout(spec: &CommandSpec, limit: Duration) -> Result<Output> {
    let mut cmd = tokio::process::Command::from(spec.to_command());
    cmd.kill_on_drop(true);

    let wait = async {
        match tokio::time::timeout(limit, cmd.output()).await {
            Ok(output) => output.context(format!("Failed to execute {}", spec.program)),
            Err(_) => Err(anyhow::anyhow!(
                "{} timed out after {:?}",
                spec.program,
                limit
            )),
        }
    };

    // Callers are blocking threads: either a spawn_blocking task of the
    // scheduler, or the plain CLI with no runtime at all.
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle.block_on(wait),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start runtime for command timeout")?
            .block_on(wait),
    }
}
