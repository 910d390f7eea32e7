//! Best-effort error monitoring.
//!
//! Reports are fire-and-forget: they are sent in the background and any failure to deliver one
//! is only logged.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid DSN: {0}")]
    Dsn(
        #[source]
        #[from]
        url::ParseError,
    ),
    #[error("DSN is missing its {0}")]
    IncompleteDsn(&'static str),
    #[error("HTTP error: {0}")]
    Http(
        #[source]
        #[from]
        reqwest::Error,
    ),
}

/// An error monitoring service.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn capture(&self, report: Report) -> Result<(), Error>;
}

/// A single error occurrence.
#[derive(Debug, Clone)]
pub struct Report {
    /// Stable name of the failing step.
    pub kind: &'static str,
    pub message: String,
}

impl Report {
    pub fn new(kind: &'static str, error: &dyn std::error::Error) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { kind, message }
    }
}

/// Send `report` in the background.
pub fn spawn_capture(reporter: Option<Arc<dyn ErrorReporter>>, report: Report) {
    let Some(reporter) = reporter else {
        return;
    };
    actix_web::rt::spawn(async move {
        if let Err(e) = reporter.capture(report).await {
            log::warn!("Error report could not be delivered: {e}");
        }
    });
}

/// [ErrorReporter] posting events to a Sentry project's store endpoint.
pub struct SentryReporter {
    client: reqwest::Client,
    store_url: Url,
    auth: String,
}

#[derive(Serialize)]
struct Event<'a> {
    message: &'a str,
    level: &'static str,
    platform: &'static str,
    logger: &'static str,
    timestamp: String,
    tags: Tags<'a>,
}

#[derive(Serialize)]
struct Tags<'a> {
    kind: &'a str,
}

impl SentryReporter {
    /// Parse a DSN of the form `scheme://public_key@host[:port]/[path/]project_id`.
    pub fn from_dsn(client: reqwest::Client, dsn: &str) -> Result<Self, Error> {
        let dsn = Url::parse(dsn)?;
        let key = dsn.username();
        if key.is_empty() {
            return Err(Error::IncompleteDsn("public key"));
        }
        let host = dsn.host_str().ok_or(Error::IncompleteDsn("host"))?;

        let path = dsn.path().trim_matches('/');
        let (prefix, project) = match path.rsplit_once('/') {
            Some((prefix, project)) => (format!("/{prefix}"), project),
            None => (String::new(), path),
        };
        if project.is_empty() {
            return Err(Error::IncompleteDsn("project id"));
        }

        let port = dsn.port().map(|port| format!(":{port}")).unwrap_or_default();
        let store_url = Url::parse(&format!(
            "{}://{host}{port}{prefix}/api/{project}/store/",
            dsn.scheme()
        ))?;
        let auth = format!(
            "Sentry sentry_version=7, sentry_client={}/{}, sentry_key={key}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        );
        Ok(Self {
            client,
            store_url,
            auth,
        })
    }
}

#[async_trait]
impl ErrorReporter for SentryReporter {
    async fn capture(&self, report: Report) -> Result<(), Error> {
        let event = Event {
            message: &report.message,
            level: "error",
            platform: "other",
            logger: env!("CARGO_PKG_NAME"),
            timestamp: chrono::Utc::now().to_rfc3339(),
            tags: Tags { kind: report.kind },
        };
        self.client
            .post(self.store_url.clone())
            .header("X-Sentry-Auth", &self.auth)
            .json(&event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
