use crate::error::ContactError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 254;
pub const MAX_MESSAGE_CHARS: usize = 5000;
pub const DEFAULT_SUBJECT: &str = "Kontaktanfrage";

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("Tag pattern is valid"));

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Email pattern is valid")
});

/// A contact submission exactly as posted by the browser.
///
/// Every field is optional here, validation happens in [ContactForm::validate].
#[derive(Debug, Default)]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    /// Hidden trap field, only ever filled in by bots.
    pub honeypot: Option<String>,
    /// `challengeToken`, or the legacy `recaptchaToken` when that is missing.
    pub challenge_token: Option<String>,
}

/// A sanitized contact submission, ready to be relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    /// Decode a request body. An empty body is an empty form.
    pub fn from_body(body: &[u8]) -> Result<Self, ContactError> {
        if body.is_empty() {
            return Ok(Self::default());
        }
        Self::from_value(serde_json::from_slice(body)?)
    }

    /// Read the form fields out of a decoded JSON document.
    ///
    /// A key that appears more than once keeps its last value. Arrays carry no named fields
    /// and decode to an empty form, any other non-object document is an error.
    pub fn from_value(value: Value) -> Result<Self, ContactError> {
        let fields = match value {
            Value::Object(fields) => fields,
            Value::Array(_) => return Ok(Self::default()),
            Value::Null => return Err(ContactError::NotAnObject("null")),
            Value::Bool(_) => return Err(ContactError::NotAnObject("boolean")),
            Value::Number(_) => return Err(ContactError::NotAnObject("number")),
            Value::String(_) => return Err(ContactError::NotAnObject("string")),
        };
        let field = |key: &str| lenient_string(fields.get(key));
        Ok(Self {
            name: field("name"),
            email: field("email"),
            subject: field("subject"),
            message: field("message"),
            honeypot: field("_hp"),
            challenge_token: field("challengeToken").or_else(|| field("recaptchaToken")),
        })
    }

    /// Strip markup from the free text fields and check them, the first failing field wins.
    pub fn validate(&self) -> Result<ContactMessage, ContactError> {
        let name = strip_tags(self.name.as_deref().unwrap_or_default());
        let email = self.email.as_deref().unwrap_or_default().trim().to_owned();
        let message = strip_tags(self.message.as_deref().unwrap_or_default());
        let subject = strip_tags(self.subject.as_deref().unwrap_or(DEFAULT_SUBJECT));

        if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
            return Err(ContactError::Validation("Invalid name"));
        }
        if !is_valid_email(&email) || email.chars().count() > MAX_EMAIL_CHARS {
            return Err(ContactError::Validation("Invalid email"));
        }
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ContactError::Validation("Invalid message"));
        }

        Ok(ContactMessage {
            name,
            email,
            subject,
            message,
        })
    }

    pub fn is_trapped(&self) -> bool {
        self.honeypot
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    pub fn challenge_token(&self) -> Option<&str> {
        self.challenge_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

pub fn strip_tags(input: &str) -> String {
    TAG.replace_all(input, "").trim().to_owned()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

// Browsers and scripts post all kinds of scalars; anything falsy counts as missing.
fn lenient_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_owned()),
        _ => None,
    }
}
