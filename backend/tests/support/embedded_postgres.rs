//! Per-test databases cloned from a migrated template.
//!
//! The template name embeds a hash of `migrations/`, so a schema change gets
//! a fresh template while unchanged runs reuse the existing one.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::MigrationHarness;
use pg_embedded_setup_unpriv::test_support::hash_directory;
use pg_embedded_setup_unpriv::{ClusterHandle, TemporaryDatabase};
use postgres::{Client, NoTls};
use tidewatch::domain::ports::ShipmentRepositoryError;
use tidewatch::outbound::persistence::MIGRATIONS;
use uuid::Uuid;

use super::format_postgres_error;

static TEMPLATE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const TEMPLATE_NAME_PREFIX: &str = "tidewatch_template";
const PROVISION_RETRIES: usize = 5;
const PROVISION_RETRY_DELAY: Duration = Duration::from_millis(500);

fn migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

fn template_database_name() -> Result<String, ShipmentRepositoryError> {
    let hash = hash_directory(migrations_dir())
        .map_err(|err| ShipmentRepositoryError::query(format!("hash migrations: {err}")))?;
    let short_hash = hash.get(..8).unwrap_or(&hash);
    Ok(format!("{TEMPLATE_NAME_PREFIX}_{short_hash}"))
}

fn ensure_template_database(cluster: &ClusterHandle) -> Result<String, ShipmentRepositoryError> {
    let template_name = template_database_name()?;
    let _lock = TEMPLATE_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner());

    let exists = cluster
        .database_exists(template_name.as_str())
        .map_err(|err| ShipmentRepositoryError::query(format!("template check: {err:?}")))?;
    if !exists {
        cluster
            .create_database(template_name.as_str())
            .map_err(|err| ShipmentRepositoryError::query(format!("create template: {err:?}")))?;
        migrate_schema(&cluster.connection().database_url(&template_name))?;
    }
    Ok(template_name)
}

/// Provision a fresh database cloned from the migrated template.
pub fn provision_template_database(
    cluster: &ClusterHandle,
) -> Result<TemporaryDatabase, ShipmentRepositoryError> {
    let mut last_error = None;
    for attempt in 1..=PROVISION_RETRIES {
        let result = ensure_template_database(cluster).and_then(|template| {
            cluster
                .temporary_database_from_template(
                    format!("test_{}", Uuid::new_v4()).as_str(),
                    template.as_str(),
                )
                .map_err(|err| {
                    ShipmentRepositoryError::query(format!(
                        "clone template: attempt {attempt}/{PROVISION_RETRIES}: {err:?}"
                    ))
                })
        });
        match result {
            Ok(database) => return Ok(database),
            Err(error) => last_error = Some(error),
        }
        if attempt < PROVISION_RETRIES {
            std::thread::sleep(PROVISION_RETRY_DELAY);
        }
    }
    Err(last_error
        .unwrap_or_else(|| ShipmentRepositoryError::query("clone template: exhausted retries")))
}

/// Apply every pending migration to `url`.
pub fn migrate_schema(url: &str) -> Result<(), ShipmentRepositoryError> {
    let mut conn = PgConnection::establish(url)
        .map_err(|err| ShipmentRepositoryError::connection(format!("{err:?}")))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| ShipmentRepositoryError::query(format!("migration: {err:?}")))?;
    Ok(())
}

/// Run a scalar `COUNT(*)` query through a raw client.
pub fn count_rows(url: &str, sql: &str) -> Result<i64, ShipmentRepositoryError> {
    let mut client = Client::connect(url, NoTls)
        .map_err(|err| ShipmentRepositoryError::connection(format_postgres_error(&err)))?;
    let row = client
        .query_one(sql, &[])
        .map_err(|err| ShipmentRepositoryError::query(format_postgres_error(&err)))?;
    Ok(row.get(0))
}
