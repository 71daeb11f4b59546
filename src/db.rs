use std::time::Duration;

use anyhow::Context;
use metrics::{counter, gauge};
use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::entities::{
    bom, bom_line, inventory_balance, inventory_reservation, inventory_txn, item, location,
    operation, production_order, routing, work_center,
};
use crate::errors::ServiceError;

/// Type alias for a database connection pool.
pub type DbPool = DatabaseConnection;

/// Configuration for establishing a database connection pool.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(?config, "configuring database connection");

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(true);

    gauge!("planner_db.max_connections", config.max_connections as f64);
    info!(max_connections = config.max_connections, "connecting to database");

    let db_pool = Database::connect(opt)
        .await
        .context("database connection establishment failed")
        .map_err(|_| ServiceError::Internal)?;

    info!("database connection pool established");
    Ok(db_pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

async fn ensure_core_tables(pool: &DbPool) -> Result<(), ServiceError> {
    let backend = pool.get_database_backend();
    if matches!(backend, DbBackend::Sqlite) {
        debug!("skipping core table auto-creation for SQLite; relying on migrations");
        return Ok(());
    }

    let schema = Schema::new(backend);
    for (name, mut table) in core_table_definitions(&schema) {
        table.if_not_exists();
        let statement = backend.build(&table);
        if let Err(err) = pool.execute(statement).await {
            warn!(table = name, error = %err, "failed to ensure table exists");
            return Err(ServiceError::from(err));
        }
    }

    Ok(())
}

fn core_table_definitions(schema: &Schema) -> Vec<(&'static str, TableCreateStatement)> {
    vec![
        ("item", schema.create_table_from_entity(item::Entity)),
        ("location", schema.create_table_from_entity(location::Entity)),
        ("inventory_balance", schema.create_table_from_entity(inventory_balance::Entity)),
        ("inventory_txn", schema.create_table_from_entity(inventory_txn::Entity)),
        ("inventory_reservation", schema.create_table_from_entity(inventory_reservation::Entity)),
        ("bom", schema.create_table_from_entity(bom::Entity)),
        ("bom_line", schema.create_table_from_entity(bom_line::Entity)),
        ("routing", schema.create_table_from_entity(routing::Entity)),
        ("operation", schema.create_table_from_entity(operation::Entity)),
        ("work_center", schema.create_table_from_entity(work_center::Entity)),
        ("production_order", schema.create_table_from_entity(production_order::Entity)),
    ]
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("running database migrations");
    let start = std::time::Instant::now();

    let migrate_result = crate::migrator::Migrator::up(pool, None).await;
    if let Err(e) = &migrate_result {
        error!(error = %e, elapsed = ?start.elapsed(), "embedded migrations failed");
    }

    let ensure_result = ensure_core_tables(pool).await;
    migrate_result.map_err(ServiceError::from)?;
    ensure_result?;

    info!(elapsed = ?start.elapsed(), "migrations complete");
    Ok(())
}

pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let start = std::time::Instant::now();
    let result = pool.ping().await.map_err(ServiceError::from);
    match &result {
        Ok(_) => gauge!("planner_db.connection_latency_ms", start.elapsed().as_millis() as f64),
        Err(_) => counter!("planner_db.connection_failures", 1),
    }
    result
}

pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("closing database connection pool");
    pool.close().await.map_err(ServiceError::from)
}

#[cfg(all(test, feature = "mock-tests"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn establish_and_close_an_in_memory_pool() {
        let pool = establish_connection("sqlite::memory:").await.unwrap();
        check_connection(&pool).await.unwrap();
        close_pool(pool).await.unwrap();
    }
}
