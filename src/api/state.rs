use std::sync::Arc;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::core::{AppConfig, StartupError};
use crate::delivery::DeliveryWorkflow;
use crate::generators::HtmlPdfRenderer;
use crate::mail::SmtpDispatcher;
use crate::storage::DocumentStore;
use crate::templates::TemplateEngine;

#[derive(Clone)]
pub struct ApiState {
    pub workflow: Arc<DeliveryWorkflow>,
    pub db: AnyPool,
}

impl ApiState {
    /// Wires the production dependencies. The database must answer before
    /// this returns.
    pub async fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let db = connect_database(&config.database_url).await?;
        tracing::info!("Database connection established");

        let store = Arc::new(DocumentStore::open(&config.documents_dir).await?);

        let dispatcher = SmtpDispatcher::new(&config.mail)
            .map_err(|e| StartupError::Mail(e.to_string()))?;
        match dispatcher.verify().await {
            Ok(true) => tracing::info!(host = %config.mail.host, "Mail relay reachable"),
            Ok(false) => tracing::warn!(host = %config.mail.host, "Mail relay refused test connection"),
            Err(e) => tracing::warn!(host = %config.mail.host, error = %e, "Mail relay unreachable"),
        }

        let templates = TemplateEngine::new().map_err(|e| StartupError::Config(e.to_string()))?;
        let renderer = HtmlPdfRenderer::new(config.renderer_bin.clone(), config.pdf.clone());

        let workflow = DeliveryWorkflow::new(
            Arc::new(templates),
            Arc::new(renderer),
            Arc::new(dispatcher),
            store,
        )
        .with_timeouts(config.render_timeout, config.send_timeout);

        Ok(Self::from_parts(Arc::new(workflow), db))
    }

    pub fn from_parts(workflow: Arc<DeliveryWorkflow>, db: AnyPool) -> Self {
        ApiState { workflow, db }
    }
}

pub async fn connect_database(url: &str) -> Result<AnyPool, StartupError> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(url)
        .await?;

    Ok(pool)
}
