use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Result;
use invoice_delivery::api::{configure_routes, json_config, ApiState};
use invoice_delivery::core::AppConfig;
use std::time::Duration;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    tracing::info!("Starting invoice delivery API");

    prometheus::default_registry()
        .register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;

    // Nothing is served until the database answers
    let state = match ApiState::new(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    spawn_document_pruner(state.clone(), config.document_ttl);

    let db = state.db.clone();
    let state = web::Data::new(state);
    let max_json_bytes = config.max_json_bytes;

    tracing::info!("Server running on port: {}", config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config(max_json_bytes))
            .wrap(Cors::permissive())
            .wrap(middleware::Compress::default())
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    db.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

fn spawn_document_pruner(state: ApiState, ttl: Duration) {
    let period = ttl.min(Duration::from_secs(3600)).max(Duration::from_secs(1));

    actix_rt::spawn(async move {
        let mut interval = actix_rt::time::interval(period);
        loop {
            interval.tick().await;
            match state.workflow.store().prune_older_than(ttl).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Pruned expired invoice documents"),
                Err(e) => tracing::warn!(error = %e, "Failed to prune invoice documents"),
            }
        }
    });
}
