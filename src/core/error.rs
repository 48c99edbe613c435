use std::time::Duration;
use thiserror::Error;

/// Failure while turning an invoice payload into a stored PDF.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),

    #[error("renderer failed: {0}")]
    Engine(String),

    #[error("failed to write document: {0}")]
    Io(#[from] std::io::Error),

    #[error("render timed out after {0:?}")]
    Timeout(Duration),
}

impl From<minijinja::Error> for RenderError {
    fn from(error: minijinja::Error) -> Self {
        RenderError::Template(error.to_string())
    }
}

/// Failure while handing a rendered document to the mail relay.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid email address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("failed to read attachment: {0}")]
    Attachment(#[source] std::io::Error),

    #[error("mail relay error: {0}")]
    Relay(String),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid payload: {0}")]
    Validation(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("document not found: {0}")]
    NotFound(String),
}

impl DeliveryError {
    /// Short machine-readable label used in error bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Validation(_) => "validation",
            DeliveryError::Render(_) => "render",
            DeliveryError::Send(_) => "send",
            DeliveryError::NotFound(_) => "not_found",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DeliveryError::Render(RenderError::Timeout(_)) | DeliveryError::Send(SendError::Timeout(_))
        )
    }
}

/// Errors that stop the process before it starts serving traffic.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database unreachable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document storage unavailable: {0}")]
    Storage(#[from] std::io::Error),

    #[error("mail relay misconfigured: {0}")]
    Mail(String),
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_and_send_failures_have_distinct_kinds() {
        let render: DeliveryError = RenderError::Engine("exit 1".into()).into();
        let send: DeliveryError = SendError::Relay("535 auth failed".into()).into();

        assert_eq!(render.kind(), "render");
        assert_eq!(send.kind(), "send");
        assert!(!render.is_timeout());
    }

    #[test]
    fn timeouts_are_flagged() {
        let err: DeliveryError = SendError::Timeout(Duration::from_secs(1)).into();
        assert!(err.is_timeout());
        assert_eq!(err.kind(), "send");
    }
}
