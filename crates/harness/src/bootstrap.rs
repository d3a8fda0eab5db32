//! Schema bootstrap
//!
//! Creates the instance, the database and the one table every scenario
//! uses. Both admin calls are long-running operations and are awaited.

use crate::config::SchemaConfig;
use crate::error::SetupError;
use tracing::info;
use txmatrix_emulator::{AdminBackend, DatabasePath, InstanceMeta};

/// DDL for the scenario table: non-null integer key plus a nullable value
pub fn table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE {} (PK INT64 NOT NULL, Val INT64) PRIMARY KEY(PK)",
        table
    )
}

/// Create instance, database and table
pub fn bootstrap(
    admin: &dyn AdminBackend,
    schema: &SchemaConfig,
) -> Result<DatabasePath, SetupError> {
    let instance = schema.instance_path();
    let meta = InstanceMeta {
        config: format!("{}/instanceConfigs/emulator-config", instance.parent()),
        display_name: schema.instance.clone(),
        node_count: 1,
    };
    admin
        .create_instance(&instance, meta)
        .and_then(|op| op.wait())
        .map_err(SetupError::backend("create instance"))?;

    let database = admin
        .create_database(
            &instance,
            &format!("CREATE DATABASE `{}`", schema.database),
            &[table_ddl(&schema.table)],
        )
        .and_then(|op| op.wait())
        .map_err(SetupError::backend("create database"))?;

    info!(database = %database, table = %schema.table, "schema ready");
    Ok(database)
}
