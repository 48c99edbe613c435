use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::PathBuf;

use crate::core::{MailConfig, SendError};

pub const ATTACHMENT_NAME: &str = "invoice.pdf";

/// One invoice email, ready for the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    /// Read at send time.
    pub attachment: PathBuf,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), SendError>;
}

/// Dispatcher over a pooled, authenticated SMTP connection.
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpDispatcher {
    pub fn new(config: &MailConfig) -> Result<Self, SendError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| SendError::Address(format!("{}: {}", config.from, e)))?;

        let tls_parameters = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| SendError::Relay(e.to_string()))?;

        // 465 is implicit TLS; everything else negotiates STARTTLS when offered
        let tls = if config.port == 465 {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(tls)
            .timeout(Some(config.timeout));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Checks that the relay accepts a connection.
    pub async fn verify(&self) -> Result<bool, SendError> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| SendError::Relay(e.to_string()))
    }

    fn build_message(&self, mail: &OutgoingMail, pdf: Vec<u8>) -> Result<Message, SendError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| SendError::Address(format!("{}: {}", mail.to, e)))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone());

        if let Some(reply_to) = &mail.reply_to {
            let reply_to: Mailbox = reply_to
                .parse()
                .map_err(|e| SendError::Address(format!("{}: {}", reply_to, e)))?;
            builder = builder.reply_to(reply_to);
        }

        let content_type =
            ContentType::parse("application/pdf").map_err(|e| SendError::Build(e.to_string()))?;
        let attachment: SinglePart = Attachment::new(ATTACHMENT_NAME.to_string()).body(pdf, content_type);

        builder
            .multipart(
                MultiPart::mixed()
                    .multipart(MultiPart::alternative_plain_html(
                        mail.text.clone(),
                        mail.html.clone(),
                    ))
                    .singlepart(attachment),
            )
            .map_err(|e| SendError::Build(e.to_string()))
    }
}

#[async_trait]
impl MailDispatcher for SmtpDispatcher {
    async fn send(&self, mail: OutgoingMail) -> Result<(), SendError> {
        let pdf = tokio::fs::read(&mail.attachment)
            .await
            .map_err(SendError::Attachment)?;
        let message = self.build_message(&mail, pdf)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| SendError::Relay(e.to_string()))?;

        tracing::debug!(
            recipient = %mail.to,
            code = %response.code(),
            "Relay accepted message"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> MailConfig {
        MailConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            from: crate::core::DEFAULT_SENDER.to_string(),
            accept_invalid_certs: true,
            timeout: Duration::from_secs(1),
        }
    }

    fn mail(attachment: PathBuf) -> OutgoingMail {
        OutgoingMail {
            to: "client@example.com".to_string(),
            reply_to: Some("billing@acme.test".to_string()),
            subject: "Invoice from Acme".to_string(),
            text: "Invoice from Acme".to_string(),
            html: "<p>Invoice from Acme</p>".to_string(),
            attachment,
        }
    }

    #[tokio::test]
    async fn message_has_fixed_sender_reply_to_and_pdf_attachment() {
        let dispatcher = SmtpDispatcher::new(&config()).unwrap();
        let message = dispatcher
            .build_message(&mail(PathBuf::from("unused.pdf")), b"%PDF-1.4".to_vec())
            .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(raw.contains("From: Accountill <hello@accountill.com>"));
        assert!(raw.contains("Reply-To: billing@acme.test"));
        assert!(raw.contains("Subject: Invoice from Acme"));
        assert!(raw.contains("filename=\"invoice.pdf\""));
        assert!(raw.contains("application/pdf"));
    }

    #[tokio::test]
    async fn bad_recipient_is_an_address_error() {
        let dispatcher = SmtpDispatcher::new(&config()).unwrap();
        let mut bad = mail(PathBuf::from("unused.pdf"));
        bad.to = "not an address".to_string();

        assert!(matches!(
            dispatcher.build_message(&bad, Vec::new()),
            Err(SendError::Address(_))
        ));
    }

    #[tokio::test]
    async fn missing_attachment_fails_before_contacting_the_relay() {
        let dispatcher = SmtpDispatcher::new(&config()).unwrap();
        let err = dispatcher
            .send(mail(PathBuf::from("/nonexistent/invoice.pdf")))
            .await
            .unwrap_err();

        assert!(matches!(err, SendError::Attachment(_)));
    }
}
