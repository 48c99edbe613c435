use std::sync::Arc;
use std::time::Duration;

use crate::core::{DeliveryResult, RenderError, SendError};
use crate::generators::DocumentRenderer;
use crate::mail::{MailDispatcher, OutgoingMail};
use crate::metrics;
use crate::models::{DeliveryAck, DeliveryStage, DocumentId, InvoicePayload};
use crate::storage::{DocumentStore, PendingDocument};
use crate::templates::TemplateEngine;

/// Renders invoices and emails them.
///
/// Every render gets its own [`DocumentId`]; the id is what travels from
/// render to send to the response, so concurrent requests never share a file.
pub struct DeliveryWorkflow {
    templates: Arc<TemplateEngine>,
    renderer: Arc<dyn DocumentRenderer>,
    dispatcher: Arc<dyn MailDispatcher>,
    store: Arc<DocumentStore>,
    render_timeout: Duration,
    send_timeout: Duration,
}

impl DeliveryWorkflow {
    pub fn new(
        templates: Arc<TemplateEngine>,
        renderer: Arc<dyn DocumentRenderer>,
        dispatcher: Arc<dyn MailDispatcher>,
        store: Arc<DocumentStore>,
    ) -> Self {
        DeliveryWorkflow {
            templates,
            renderer,
            dispatcher,
            store,
            render_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeouts(mut self, render_timeout: Duration, send_timeout: Duration) -> Self {
        self.render_timeout = render_timeout;
        self.send_timeout = send_timeout;
        self
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Renders the invoice and stores it.
    pub async fn create_pdf(&self, payload: &InvoicePayload) -> DeliveryResult<DeliveryAck> {
        let id = self.render(payload).await?;
        Ok(DeliveryAck::new(DeliveryStage::Rendered, id))
    }

    /// Renders the invoice and emails it to `payload.email`.
    ///
    /// Nothing is sent unless the render committed a document.
    pub async fn send_pdf(&self, payload: &InvoicePayload) -> DeliveryResult<DeliveryAck> {
        let to = payload.recipient()?.to_string();
        let subject = payload.subject_line()?;
        let html = self.templates.render_email(payload, &subject)?;

        let id = self.render(payload).await?;

        tracing::info!(document_id = %id, stage = %DeliveryStage::Sending, recipient = %to, "Sending invoice");
        let mail = OutgoingMail {
            to,
            reply_to: payload.reply_to().map(str::to_string),
            text: subject.clone(),
            subject,
            html,
            attachment: self.store.path_of(id),
        };

        let result = match tokio::time::timeout(self.send_timeout, self.dispatcher.send(mail)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(self.send_timeout)),
        };
        metrics::record_send(result.is_ok());

        if let Err(e) = result {
            tracing::error!(document_id = %id, stage = %DeliveryStage::SendFailed, error = %e, "Invoice email failed");
            return Err(e.into());
        }

        tracing::info!(document_id = %id, stage = %DeliveryStage::Sent, "Invoice sent");
        Ok(DeliveryAck::new(DeliveryStage::Sent, id))
    }

    /// Bytes of the most recently rendered document.
    pub async fn fetch_latest(&self) -> DeliveryResult<(DocumentId, Vec<u8>)> {
        self.store.read_latest().await
    }

    pub async fn fetch(&self, id: DocumentId) -> DeliveryResult<Vec<u8>> {
        self.store.read(id).await
    }

    async fn render(&self, payload: &InvoicePayload) -> Result<DocumentId, RenderError> {
        let pending = self.store.reserve();
        let id = pending.id();
        tracing::debug!(document_id = %id, stage = %DeliveryStage::Rendering, "Rendering invoice");

        let result = self.render_into(payload, pending).await;
        metrics::record_render(result.is_ok());

        match &result {
            Ok(_) => tracing::info!(document_id = %id, stage = %DeliveryStage::Rendered, "Invoice rendered"),
            Err(e) => tracing::error!(
                document_id = %id,
                stage = %DeliveryStage::RenderFailed,
                error = %e,
                "Invoice render failed"
            ),
        }
        result
    }

    async fn render_into(
        &self,
        payload: &InvoicePayload,
        pending: PendingDocument,
    ) -> Result<DocumentId, RenderError> {
        let html = self.templates.render_invoice(payload)?;

        let rendered = self.renderer.render(&html, pending.path());
        match tokio::time::timeout(self.render_timeout, rendered).await {
            Ok(result) => result?,
            Err(_) => return Err(RenderError::Timeout(self.render_timeout)),
        }

        self.store.commit(pending).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeliveryError;
    use crate::generators::pdf::MockDocumentRenderer;
    use crate::mail::dispatcher::MockMailDispatcher;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn payload() -> InvoicePayload {
        serde_json::from_value(json!({
            "email": "client@example.com",
            "invoiceNumber": "INV-7",
            "company": { "name": "Acme", "businessName": "Acme LLC", "email": "billing@acme.test" }
        }))
        .unwrap()
    }

    fn writing_renderer() -> MockDocumentRenderer {
        let mut renderer = MockDocumentRenderer::new();
        renderer.expect_render().returning(|html, output| {
            std::fs::write(output, html)?;
            Ok(())
        });
        renderer
    }

    async fn workflow(
        renderer: MockDocumentRenderer,
        dispatcher: MockMailDispatcher,
    ) -> (DeliveryWorkflow, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).await.unwrap());
        let workflow = DeliveryWorkflow::new(
            Arc::new(TemplateEngine::new().unwrap()),
            Arc::new(renderer),
            Arc::new(dispatcher),
            store,
        );
        (workflow, dir)
    }

    #[tokio::test]
    async fn create_pdf_stores_rendered_document() {
        let mut dispatcher = MockMailDispatcher::new();
        dispatcher.expect_send().never();
        let (workflow, _dir) = workflow(writing_renderer(), dispatcher).await;

        let ack = workflow.create_pdf(&payload()).await.unwrap();

        assert_eq!(ack.stage, DeliveryStage::Rendered);
        let bytes = workflow.fetch(ack.document_id).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("INV-7"));
    }

    #[tokio::test]
    async fn render_failure_never_reaches_the_dispatcher() {
        let mut renderer = MockDocumentRenderer::new();
        renderer
            .expect_render()
            .returning(|_, _| Err(RenderError::Engine("exit status 1".into())));
        let mut dispatcher = MockMailDispatcher::new();
        dispatcher.expect_send().never();
        let (workflow, dir) = workflow(renderer, dispatcher).await;

        let err = workflow.send_pdf(&payload()).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Render(RenderError::Engine(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn send_pdf_attaches_the_committed_document() {
        let mut dispatcher = MockMailDispatcher::new();
        dispatcher
            .expect_send()
            .times(1)
            .withf(|mail| {
                mail.to == "client@example.com"
                    && mail.reply_to.as_deref() == Some("billing@acme.test")
                    && mail.subject == "Invoice from Acme LLC"
                    && mail.text == mail.subject
                    && mail.attachment.extension() == Some(std::ffi::OsStr::new("pdf"))
                    && std::fs::read_to_string(&mail.attachment)
                        .map(|body| body.contains("INV-7"))
                        .unwrap_or(false)
            })
            .returning(|_| Ok(()));
        let (workflow, _dir) = workflow(writing_renderer(), dispatcher).await;

        let ack = workflow.send_pdf(&payload()).await.unwrap();

        assert_eq!(ack.stage, DeliveryStage::Sent);
        assert!(workflow.store().path_of(ack.document_id).exists());
    }

    #[tokio::test]
    async fn relay_failure_is_a_send_error() {
        let mut dispatcher = MockMailDispatcher::new();
        dispatcher
            .expect_send()
            .returning(|_| Err(SendError::Relay("535 authentication failed".into())));
        let (workflow, _dir) = workflow(writing_renderer(), dispatcher).await;

        let err = workflow.send_pdf(&payload()).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Send(SendError::Relay(_))));
    }

    #[tokio::test]
    async fn missing_recipient_is_rejected_before_rendering() {
        let mut renderer = MockDocumentRenderer::new();
        renderer.expect_render().never();
        let mut dispatcher = MockMailDispatcher::new();
        dispatcher.expect_send().never();
        let (workflow, _dir) = workflow(renderer, dispatcher).await;

        let mut p = payload();
        p.email = None;

        assert!(matches!(
            workflow.send_pdf(&p).await,
            Err(DeliveryError::Validation(_))
        ));
    }

    struct SlowRenderer;

    #[async_trait::async_trait]
    impl DocumentRenderer for SlowRenderer {
        async fn render(&self, html: &str, output: &Path) -> Result<(), RenderError> {
            tokio::fs::write(output, html).await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_render_times_out_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).await.unwrap());
        let mut dispatcher = MockMailDispatcher::new();
        dispatcher.expect_send().never();
        let workflow = DeliveryWorkflow::new(
            Arc::new(TemplateEngine::new().unwrap()),
            Arc::new(SlowRenderer),
            Arc::new(dispatcher),
            store,
        )
        .with_timeouts(Duration::from_millis(50), Duration::from_secs(1));

        let err = workflow.send_pdf(&payload()).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Render(RenderError::Timeout(_))));
        assert!(err.is_timeout());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_engine_leaves_nothing_in_the_store() {
        use crate::core::PdfConfig;
        use crate::generators::HtmlPdfRenderer;
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = TempDir::new().unwrap();
        let engine = bin_dir.path().join("hanging-engine");
        std::fs::write(&engine, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        let dir = TempDir::new().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).await.unwrap());
        let workflow = DeliveryWorkflow::new(
            Arc::new(TemplateEngine::new().unwrap()),
            Arc::new(HtmlPdfRenderer::new(engine.to_string_lossy(), PdfConfig::default())),
            Arc::new(MockMailDispatcher::new()),
            store,
        )
        .with_timeouts(Duration::from_millis(200), Duration::from_secs(1));

        let err = workflow.create_pdf(&payload()).await.unwrap_err();

        assert!(err.is_timeout());
        let leftover: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(leftover.is_empty(), "leftover files: {:?}", leftover);
    }
}
