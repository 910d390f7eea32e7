//! Contact form payloads and their sanitization.

mod form;

pub use form::{
    is_valid_email, strip_tags, ContactForm, ContactMessage, DEFAULT_SUBJECT, MAX_EMAIL_CHARS,
    MAX_MESSAGE_CHARS, MAX_NAME_CHARS,
};
