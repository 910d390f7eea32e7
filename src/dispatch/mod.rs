//! Relays sanitized contact messages to a transactional email service.

mod sendgrid;

pub use sendgrid::{SendGridDispatcher, SENDGRID_ENDPOINT};

use crate::contact::ContactMessage;
use async_trait::async_trait;
use thiserror::Error;

pub const DEFAULT_RECIPIENT: &str = "hello@noart.gallery";
pub const FALLBACK_MAIL_SUBJECT: &str = "Neue Kontaktanfrage von NoArt.";

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(
        #[source]
        #[from]
        reqwest::Error,
    ),
    #[error("Email service answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// An email delivery service.
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    /// Deliver a single message, without retrying.
    async fn send(&self, message: &ContactMessage) -> Result<(), Error>;
}

/// The mail composed from a contact message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub from: String,
    pub reply_to: String,
    pub subject: String,
    pub text: String,
}

impl OutboundEmail {
    /// Compose the mail for `message`.
    ///
    /// Without a configured `sender` the visitor's own address is used as the sender.
    pub fn compose(message: &ContactMessage, recipient: &str, sender: Option<&str>) -> Self {
        let subject = if message.subject.is_empty() {
            FALLBACK_MAIL_SUBJECT
        } else {
            &message.subject
        };
        Self {
            to: recipient.to_owned(),
            from: sender.unwrap_or(&message.email).to_owned(),
            reply_to: message.email.clone(),
            subject: subject.to_owned(),
            text: format!(
                "Name: {}\nEmail: {}\n\nMessage:\n{}",
                message.name, message.email, message.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str) -> ContactMessage {
        ContactMessage {
            name: "Ada".to_owned(),
            email: "ada@example.com".to_owned(),
            subject: subject.to_owned(),
            message: "Hello\nthere".to_owned(),
        }
    }

    #[test]
    fn test_compose() {
        let email = OutboundEmail::compose(&message("Offer"), DEFAULT_RECIPIENT, None);
        assert_eq!(email.to, DEFAULT_RECIPIENT);
        assert_eq!(email.from, "ada@example.com");
        assert_eq!(email.reply_to, "ada@example.com");
        assert_eq!(email.subject, "Offer");
        assert_eq!(
            email.text,
            "Name: Ada\nEmail: ada@example.com\n\nMessage:\nHello\nthere"
        );
    }

    #[test]
    fn test_compose_overrides() {
        let email = OutboundEmail::compose(
            &message(""),
            "studio@example.org",
            Some("no-reply@example.org"),
        );
        assert_eq!(email.to, "studio@example.org");
        assert_eq!(email.from, "no-reply@example.org");
        assert_eq!(email.reply_to, "ada@example.com");
        assert_eq!(email.subject, FALLBACK_MAIL_SUBJECT);
    }
}
