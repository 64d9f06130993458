use crate::app_config;
use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(health);
}

/// Liveness check. Does not touch the database.
#[get("/api/v1/health")]
pub async fn health() -> impl Responder {
    let service = app_config::service();
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": service.name,
        "version": service.version,
    }))
}
