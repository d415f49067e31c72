//! Built-in database dump adapters.
//!
//! Each adapter turns its options into a single external dump command and
//! writes into the directory given by [`DatabaseContext::dump_path`].

mod mongodb;
mod mysql;
mod postgresql;
mod redis;
mod sqlite;

pub use mongodb::MongoDb;
pub use mysql::{MySql, MySqlFlavor};
pub use postgresql::PostgreSql;
pub use redis::Redis;
pub use sqlite::Sqlite;

use super::{Database, DatabaseContext, DatabaseFactory};
use crate::registry::{Registry, RegistryError};

fn factory<D, F>(build: F) -> DatabaseFactory
where
    D: Database + 'static,
    F: Fn(DatabaseContext) -> anyhow::Result<D> + Send + Sync + 'static,
{
    Box::new(move |ctx: DatabaseContext| Ok(Box::new(build(ctx)?) as Box<dyn Database>))
}

/// Register every built-in database type
pub fn register_all(registry: &mut Registry<DatabaseFactory>) -> Result<(), RegistryError> {
    registry.register("postgresql", factory(PostgreSql::new))?;
    registry.register("mysql", factory(|ctx| MySql::new(ctx, MySqlFlavor::MySql)))?;
    registry.register("mariadb", factory(|ctx| MySql::new(ctx, MySqlFlavor::MariaDb)))?;
    registry.register("redis", factory(Redis::new))?;
    registry.register("mongodb", factory(MongoDb::new))?;
    registry.register("sqlite", factory(Sqlite::new))?;
    Ok(())
}
