pub mod api;
pub mod core;
pub mod delivery;
pub mod generators;
pub mod mail;
pub mod metrics;
pub mod models;
pub mod storage;
pub mod templates;

// Re-export commonly used types
pub use models::{
    Company, DeliveryAck, DeliveryStage, DocumentId, InvoicePayload, LineItem,
};

pub use crate::core::{AppConfig, DeliveryError, RenderError, SendError, StartupError};
pub use delivery::DeliveryWorkflow;
pub use generators::{DocumentRenderer, HtmlPdfRenderer};
pub use mail::{MailDispatcher, OutgoingMail, SmtpDispatcher};
pub use storage::DocumentStore;
pub use templates::TemplateEngine;
