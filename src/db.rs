//! Database connection setup and schema creation.

use crate::orm::{evidence, geographic_areas, infrastructure_assets, reports, verifications};
use sea_orm::sea_query::{Index, TableCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;

/// Open a connection pool.
pub async fn init_db(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .max_connections(max_connections.max(1))
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    log::info!("Database connection established ({:?})", db.get_database_backend());
    Ok(db)
}

/// Create every atlas table and index that does not exist yet.
///
/// Tables are created parents first so foreign keys resolve on PostgreSQL.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    create_entity(db, geographic_areas::Entity).await?;
    create_area_scope_index(db).await?;
    create_entity(db, infrastructure_assets::Entity).await?;
    create_entity(db, reports::Entity).await?;
    create_entity(db, evidence::Entity).await?;
    create_entity(db, verifications::Entity).await?;
    log::info!("Database schema ready");
    Ok(())
}

/// Siblings may not share a name at the same level. NULL parents never
/// collide in the index, so top-level areas rely on the application check.
async fn create_area_scope_index<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let index = Index::create()
        .name("idx_geographic_areas_scope")
        .table(geographic_areas::Entity)
        .col(geographic_areas::Column::Name)
        .col(geographic_areas::Column::CountryCode)
        .col(geographic_areas::Column::AdminLevel)
        .col(geographic_areas::Column::ParentId)
        .unique()
        .if_not_exists()
        .to_owned();
    let backend = db.get_database_backend();
    db.execute(backend.build(&index)).await?;
    Ok(())
}

async fn create_entity<C, E>(db: &C, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table: TableCreateStatement = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(E::default()) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }
    Ok(())
}
