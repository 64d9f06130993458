use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use atlas::app_config;
use atlas::storage::local::LocalStorage;
use atlas::storage::StorageBackend;
use env_logger::Env;
use std::path::PathBuf;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    app_config::init();

    let database = app_config::database();
    let url = database
        .resolved_url()
        .context("No database URL configured; set ATLAS_DATABASE__URL or DATABASE_URL")?;
    let db = atlas::db::init_db(&url, database.max_connections)
        .await
        .context("Failed to connect to the database")?;
    if database.create_schema {
        atlas::db::create_schema(&db)
            .await
            .context("Failed to create the database schema")?;
    }

    let storage_config = app_config::storage();
    let storage: Arc<dyn StorageBackend> = Arc::new(
        LocalStorage::new(PathBuf::from(&storage_config.local_path))
            .context("Failed to initialize evidence storage")?,
    );

    let server = app_config::server();
    let service = app_config::service();
    log::info!(
        "Starting {} {} on {}:{}",
        service.name,
        service.version,
        server.bind_address,
        server.port
    );

    HttpServer::new(move || {
        // Middleware wraps in reverse execution order.
        App::new()
            .app_data(Data::new(db.clone()))
            .app_data(Data::from(storage.clone()))
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .wrap(Logger::new("%a %r %s %T"))
            .configure(atlas::web::configure)
    })
    .bind((server.bind_address.as_str(), server.port))?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    // A missing .env file is normal outside development.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
