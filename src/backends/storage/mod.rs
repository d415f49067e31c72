//! Built-in storage adapters

mod local;
mod s3;

pub use local::Local;
pub use s3::{S3Provider, S3};

use super::{Storage, StorageContext, StorageFactory};
use crate::registry::{Registry, RegistryError};

fn factory<S, F>(build: F) -> StorageFactory
where
    S: Storage + 'static,
    F: Fn(StorageContext) -> anyhow::Result<S> + Send + Sync + 'static,
{
    Box::new(move |ctx: StorageContext| Ok(Box::new(build(ctx)?) as Box<dyn Storage>))
}

/// Register every built-in storage type
pub fn register_all(registry: &mut Registry<StorageFactory>) -> Result<(), RegistryError> {
    registry.register("local", factory(Local::new))?;

    for provider in S3Provider::ALL {
        registry.register(provider.type_name(), factory(move |ctx| S3::new(ctx, provider)))?;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::SubConfig;
    use crate::utils::executor::mock::MockExecutor;
    use std::sync::Arc;
    use std::time::Duration;

    pub fn context(config: SubConfig, executor: &MockExecutor) -> StorageContext {
        StorageContext {
            model: "test".to_string(),
            config,
            timeout: Duration::from_secs(30),
            executor: Arc::new(executor.clone()),
        }
    }
}
