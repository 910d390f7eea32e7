//! Human-origin verification of contact submissions.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub const RECAPTCHA_ENDPOINT: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(
        #[source]
        #[from]
        reqwest::Error,
    ),
}

/// A bot-verification service that judges challenge tokens.
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    /// Returns whether the service accepted `token`.
    async fn verify(&self, token: &str) -> Result<bool, Error>;
}

/// [ChallengeVerifier] backed by Google reCAPTCHA's `siteverify` API.
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SiteVerify {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl RecaptchaVerifier {
    /// The `client` is expected to carry the outbound timeout.
    pub fn new(client: reqwest::Client, secret: impl Into<String>) -> Self {
        Self {
            client,
            secret: secret.into(),
            endpoint: RECAPTCHA_ENDPOINT.to_owned(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ChallengeVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str) -> Result<bool, Error> {
        let reply: SiteVerify = self
            .client
            .post(&self.endpoint)
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await?
            .json()
            .await?;
        if !reply.success {
            log::debug!("reCAPTCHA rejected token: {:?}", reply.error_codes);
        }
        Ok(reply.success)
    }
}
