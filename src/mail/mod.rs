pub mod dispatcher;

pub use dispatcher::{MailDispatcher, OutgoingMail, SmtpDispatcher, ATTACHMENT_NAME};
