use actix_web::{web, HttpResponse};

use super::error::ApiError;
use super::handlers;
use super::state::ApiState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health checks
        .route("/", web::get().to(handlers::liveness))
        .route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check))
        .route("/metrics", web::get().to(metrics_endpoint))

        // Invoice documents
        .route("/create-pdf", web::post().to(handlers::create_pdf))
        .route("/send-pdf", web::post().to(handlers::send_pdf))
        .route("/fetch-pdf", web::get().to(handlers::fetch_pdf))
        .route("/fetch-pdf/{id}", web::get().to(handlers::fetch_pdf_by_id));
}

/// JSON body limit and error shape for invoice payloads.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| ApiError::from(err).into())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    }))
}

async fn readiness_check(state: web::Data<ApiState>) -> HttpResponse {
    let db_healthy = sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .is_ok();

    if db_healthy {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "ready",
            "checks": { "database": "ok" }
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "not_ready",
            "checks": { "database": "failed" }
        }))
    }
}

async fn metrics_endpoint() -> HttpResponse {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}
