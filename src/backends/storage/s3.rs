//! S3-compatible object storages, driven through the `aws` CLI

use crate::backends::{adapter_options, FileItem, Storage, StorageContext};
use crate::stages::Artifact;
use crate::utils::CommandSpec;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

/// Flavours of S3-compatible services; they differ only in endpoint defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3Provider {
    Aws,
    Minio,
    R2,
    B2,
    Spaces,
    Oss,
}

impl S3Provider {
    pub const ALL: [S3Provider; 6] = [
        S3Provider::Aws,
        S3Provider::Minio,
        S3Provider::R2,
        S3Provider::B2,
        S3Provider::Spaces,
        S3Provider::Oss,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            S3Provider::Aws => "s3",
            S3Provider::Minio => "minio",
            S3Provider::R2 => "r2",
            S3Provider::B2 => "b2",
            S3Provider::Spaces => "spaces",
            S3Provider::Oss => "oss",
        }
    }

    fn default_region(&self) -> &'static str {
        match self {
            S3Provider::Aws | S3Provider::Minio => "us-east-1",
            S3Provider::R2 => "auto",
            S3Provider::B2 => "us-west-002",
            S3Provider::Spaces => "nyc1",
            S3Provider::Oss => "cn-hangzhou",
        }
    }

    fn default_endpoint(&self, options: &S3Options, region: &str) -> Result<Option<String>> {
        let endpoint = match self {
            S3Provider::Aws => None,
            S3Provider::Minio => bail!("minio storage requires 'endpoint'"),
            S3Provider::R2 => match options.account_id {
                Some(ref account) => Some(format!("https://{}.r2.cloudflarestorage.com", account)),
                None => bail!("r2 storage requires 'endpoint' or 'account_id'"),
            },
            S3Provider::B2 => Some(format!("https://s3.{}.backblazeb2.com", region)),
            S3Provider::Spaces => Some(format!("https://{}.digitaloceanspaces.com", region)),
            S3Provider::Oss => Some(format!("https://oss-{}.aliyuncs.com", region)),
        };
        Ok(endpoint)
    }
}

#[derive(Debug, Deserialize)]
struct S3Options {
    bucket: String,
    /// Key prefix inside the bucket
    #[serde(default)]
    path: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    access_key_id: Option<String>,
    #[serde(default)]
    secret_access_key: Option<String>,
    #[serde(default)]
    storage_class: Option<String>,
    /// Lifetime of presigned download URLs
    #[serde(default = "default_presign_seconds")]
    presign_expires_seconds: u64,
}

fn default_presign_seconds() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ListObjectsOutput {
    #[serde(rename = "Contents", default)]
    contents: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "LastModified", default)]
    last_modified: Option<DateTime<Utc>>,
}

pub struct S3 {
    ctx: StorageContext,
    options: S3Options,
    region: String,
    endpoint: Option<String>,
}

impl S3 {
    pub fn new(ctx: StorageContext, provider: S3Provider) -> Result<Self> {
        let options: S3Options = adapter_options(&ctx.config)?;
        let region = options
            .region
            .clone()
            .unwrap_or_else(|| provider.default_region().to_string());
        let endpoint = match options.endpoint {
            Some(ref endpoint) => Some(endpoint.clone()),
            None => provider.default_endpoint(&options, &region)?,
        };

        Ok(Self {
            ctx,
            options,
            region,
            endpoint,
        })
    }

    /// Object key inside the bucket
    fn object_key(&self, key: &str) -> String {
        let prefix = self.options.path.trim_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", prefix, key)
        }
    }

    fn s3_url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.options.bucket, self.object_key(key))
    }

    fn aws(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("aws");
        if let Some(ref id) = self.options.access_key_id {
            spec = spec.env("AWS_ACCESS_KEY_ID", id.as_str());
        }
        if let Some(ref secret) = self.options.secret_access_key {
            spec = spec.env("AWS_SECRET_ACCESS_KEY", secret.as_str());
        }
        spec.timeout(self.ctx.timeout)
    }

    fn with_connection(&self, mut spec: CommandSpec) -> CommandSpec {
        spec = spec.args(["--region", self.region.as_str()]);
        if let Some(ref endpoint) = self.endpoint {
            spec = spec.args(["--endpoint-url", endpoint.as_str()]);
        }
        spec
    }

    fn copy(&self, local: &std::path::Path, key: &str) -> Result<()> {
        let mut spec = self
            .aws()
            .args(["s3", "cp"])
            .arg(local.display().to_string())
            .arg(self.s3_url(key));
        if let Some(ref class) = self.options.storage_class {
            spec = spec.args(["--storage-class", class.as_str()]);
        }
        self.ctx
            .executor
            .run(&self.with_connection(spec))
            .with_context(|| format!("Failed to upload {}", self.s3_url(key)))?;
        info!("Uploaded {}", self.s3_url(key));
        Ok(())
    }
}

impl Storage for S3 {
    fn open(&mut self) -> Result<()> {
        if !self.ctx.executor.is_available("aws") {
            bail!("aws CLI not found in PATH");
        }
        Ok(())
    }

    fn upload(&self, artifact: &Artifact) -> Result<()> {
        for (key, local) in artifact.uploads() {
            self.copy(local, &key)?;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut spec = self.aws().args(["s3", "rm"]).arg(self.s3_url(key));
        if key.ends_with('/') {
            spec = spec.arg("--recursive");
        }
        info!("Deleting {}", self.s3_url(key));
        self.ctx
            .executor
            .run(&self.with_connection(spec))
            .with_context(|| format!("Failed to delete {}", self.s3_url(key)))?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<FileItem>> {
        let full_prefix = self.object_key(prefix);
        let spec = self
            .aws()
            .args(["s3api", "list-objects-v2", "--output", "json"])
            .args(["--bucket", self.options.bucket.as_str()])
            .args(["--prefix", full_prefix.as_str()]);
        let out = self.ctx.executor.run_stdout(&self.with_connection(spec))?;

        // An empty listing prints nothing at all
        if out.trim().is_empty() {
            return Ok(Vec::new());
        }
        let listing: ListObjectsOutput =
            serde_json::from_str(&out).context("Failed to parse list-objects-v2 output")?;

        let strip = self.object_key("");
        Ok(listing
            .contents
            .into_iter()
            .map(|entry| FileItem {
                name: entry
                    .key
                    .strip_prefix(strip.as_str())
                    .unwrap_or(&entry.key)
                    .to_string(),
                size: entry.size,
                modified: entry.last_modified,
            })
            .collect())
    }

    fn download(&self, key: &str) -> Result<String> {
        let spec = self
            .aws()
            .args(["s3", "presign"])
            .arg(self.s3_url(key))
            .args([
                "--expires-in".to_string(),
                self.options.presign_expires_seconds.to_string(),
            ]);
        let url = self.ctx.executor.run_stdout(&self.with_connection(spec))?;
        Ok(url.trim().to_string())
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::storage::test_support::context;
    use crate::config::SubConfig;
    use crate::utils::executor::mock::{MockExecutor, MockResponse};
    use std::path::PathBuf;

    fn s3(executor: &MockExecutor, provider: S3Provider, config: SubConfig) -> S3 {
        S3::new(context(config, executor), provider).unwrap()
    }

    #[test]
    fn test_chunked_upload_puts_every_part() {
        let executor = MockExecutor::new().with_program("aws");
        let config = SubConfig::new("remote", "s3")
            .with("bucket", "backups")
            .with("path", "/nightly/")
            .with("secret_access_key", "shh");
        let mut storage = s3(&executor, S3Provider::Aws, config);
        storage.open().unwrap();

        let artifact = Artifact::Chunks {
            dir: PathBuf::from("/tmp/run/2024.01.01"),
            parts: vec![
                PathBuf::from("/tmp/run/2024.01.01/2024.01.01.tar-000"),
                PathBuf::from("/tmp/run/2024.01.01/2024.01.01.tar-001"),
            ],
        };
        storage.upload(&artifact).unwrap();

        let calls = executor.calls_to("aws");
        assert_eq!(calls.len(), 2);
        assert!(calls[0].has_arg("s3://backups/nightly/2024.01.01/2024.01.01.tar-000"));
        assert!(calls[1].has_arg("s3://backups/nightly/2024.01.01/2024.01.01.tar-001"));
        assert_eq!(calls[0].env_keys, vec!["AWS_SECRET_ACCESS_KEY"]);
    }

    #[test]
    fn test_directory_delete_is_recursive() {
        let executor = MockExecutor::new();
        let storage = s3(&executor, S3Provider::Aws, SubConfig::new("r", "s3").with("bucket", "b"));

        storage.delete("2024.01.01/").unwrap();
        storage.delete("old.tar").unwrap();

        let calls = executor.calls_to("aws");
        assert!(calls[0].has_arg("--recursive"));
        assert!(!calls[1].has_arg("--recursive"));
        assert!(calls[1].has_arg("s3://b/old.tar"));
    }

    #[test]
    fn test_provider_endpoints() {
        let executor = MockExecutor::new();
        let storage = s3(
            &executor,
            S3Provider::Spaces,
            SubConfig::new("r", "spaces").with("bucket", "b").with("region", "ams3"),
        );
        storage.delete("x").unwrap();
        let call = &executor.calls_to("aws")[0];
        assert!(call.has_arg("https://ams3.digitaloceanspaces.com"));

        let err = S3::new(
            context(SubConfig::new("r", "minio").with("bucket", "b"), &executor),
            S3Provider::Minio,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_list_parses_objects() {
        let json = r#"{"Contents":[{"Key":"nightly/a.tar","Size":12,"LastModified":"2024-01-01T00:00:00+00:00"}]}"#;
        let executor = MockExecutor::new().expect("aws", MockResponse::stdout(json));
        let storage = s3(
            &executor,
            S3Provider::Aws,
            SubConfig::new("r", "s3").with("bucket", "b").with("path", "nightly"),
        );

        let items = storage.list("").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "a.tar");
        assert_eq!(items[0].size, 12);
        assert!(items[0].modified.is_some());
    }

    #[test]
    fn test_open_requires_cli() {
        let executor = MockExecutor::new();
        let mut storage = s3(&executor, S3Provider::Aws, SubConfig::new("r", "s3").with("bucket", "b"));
        assert!(storage.open().is_err());
    }
}
