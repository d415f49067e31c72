//! Optional encryption of the archive with `openssl enc`

use super::{ArchiveFile, StageEnv};
use crate::backends::adapter_options;
use crate::config::SubConfig;
use crate::utils::CommandSpec;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

pub const OPENSSL: &str = "openssl";

/// Environment variable carrying the passphrase to openssl
const PASSWORD_ENV: &str = "PACKVAULT_ENCRYPT_PASSWORD";

#[derive(Debug, Deserialize)]
struct OpenSslOptions {
    #[serde(default)]
    password: String,
    #[serde(default = "default_cipher")]
    cipher: String,
    #[serde(default = "default_salt")]
    salt: bool,
    #[serde(default)]
    base64: bool,
    #[serde(default)]
    pbkdf2: bool,
}

fn default_cipher() -> String {
    "aes-256-cbc".to_string()
}

fn default_salt() -> bool {
    true
}

/// Encryptor types understood by [`run`]
pub fn supported_types() -> &'static [&'static str] {
    &[OPENSSL]
}

/// Encrypt `archive` into `<archive>.enc`; the extension gains `.enc`
pub fn run(config: &SubConfig, archive: ArchiveFile, env: &StageEnv) -> Result<ArchiveFile> {
    if config.kind != OPENSSL {
        bail!("encryptor type '{}' is not supported", config.kind);
    }

    let options: OpenSslOptions = adapter_options(config)?;
    if options.password.is_empty() {
        bail!("password option is required");
    }

    let mut target = archive.path.clone().into_os_string();
    target.push(".enc");
    let target = PathBuf::from(target);

    let mut spec = CommandSpec::new(OPENSSL)
        .arg("enc")
        .arg(format!("-{}", options.cipher));
    if options.base64 {
        spec = spec.arg("-base64");
    }
    if options.salt {
        spec = spec.arg("-salt");
    }
    if options.pbkdf2 {
        spec = spec.arg("-pbkdf2");
    }
    let spec = spec
        .args(["-pass".to_string(), format!("env:{}", PASSWORD_ENV)])
        .env(PASSWORD_ENV, options.password.as_str())
        .args(["-in".to_string(), archive.path.display().to_string()])
        .args(["-out".to_string(), target.display().to_string()])
        .timeout(env.timeout);

    info!("Encrypt with {} ({})", OPENSSL, options.cipher);
    env.executor.run(&spec).context("openssl enc failed")?;
    info!("Encrypted: {}", target.display());

    Ok(ArchiveFile {
        path: target,
        extension: format!("{}.enc", archive.extension),
    })
}
