//! Test database setup
#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Connect to a fresh in-memory SQLite database with the atlas schema.
///
/// Every in-memory SQLite connection is its own database, so the pool is
/// pinned to a single connection that lives for the whole test.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    init_logger();

    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    atlas::db::create_schema(&db).await?;
    Ok(db)
}
