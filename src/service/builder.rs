use crate::config::Config;
use crate::dispatch::{EmailDispatcher, SendGridDispatcher};
use crate::limiter::RateLimiter;
use crate::monitor::{ErrorReporter, SentryReporter};
use crate::service::{ContactService, CorsPolicy};
use crate::verify::{ChallengeVerifier, RecaptchaVerifier};
use std::sync::Arc;

pub struct ContactServiceBuilder {
    limiter: RateLimiter,
    dispatcher: Option<Arc<dyn EmailDispatcher>>,
    verifier: Option<Arc<dyn ChallengeVerifier>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    cors: CorsPolicy,
}

impl ContactServiceBuilder {
    pub(super) fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter,
            dispatcher: None,
            verifier: None,
            reporter: None,
            cors: CorsPolicy::default(),
        }
    }

    /// Where accepted submissions are delivered.
    ///
    /// Without a dispatcher the service runs in dev mode: submissions are logged and answered
    /// as if they had been delivered.
    pub fn dispatcher(mut self, dispatcher: Option<Arc<dyn EmailDispatcher>>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Require every submission to carry a challenge token accepted by `verifier`.
    ///
    /// By default no verification takes place.
    pub fn verifier(mut self, verifier: Option<Arc<dyn ChallengeVerifier>>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Report delivery failures and unexpected errors to error monitoring.
    pub fn reporter(mut self, reporter: Option<Arc<dyn ErrorReporter>>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Restrict `Access-Control-Allow-Origin` to these exact origins.
    ///
    /// Defaults to allowing every origin.
    pub fn allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsPolicy::new(origins);
        self
    }

    pub fn build(self) -> ContactService {
        ContactService {
            limiter: self.limiter,
            dispatcher: self.dispatcher,
            verifier: self.verifier,
            reporter: self.reporter,
            cors: self.cors,
        }
    }
}

impl ContactService {
    /// Wire up the service and its collaborators as described by `config`.
    ///
    /// Optional collaborators that are not configured, or whose configuration is unusable,
    /// are left out with a warning rather than failing startup.
    pub async fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.outbound_timeout)
            .build()?;

        let dispatcher = config.dispatcher_api_key.as_ref().map(|api_key| {
            Arc::new(SendGridDispatcher::new(
                client.clone(),
                api_key.clone(),
                config.recipient_address.clone(),
                config.sender_address.clone(),
            )) as Arc<dyn EmailDispatcher>
        });
        if dispatcher.is_none() {
            log::warn!("SENDGRID_API_KEY not set, contact submissions will only be logged");
        }

        let verifier = config.challenge_secret.as_ref().map(|secret| {
            Arc::new(RecaptchaVerifier::new(client.clone(), secret.clone()))
                as Arc<dyn ChallengeVerifier>
        });

        let reporter = config.error_monitoring_dsn.as_deref().and_then(|dsn| {
            match SentryReporter::from_dsn(client.clone(), dsn) {
                Ok(reporter) => Some(Arc::new(reporter) as Arc<dyn ErrorReporter>),
                Err(e) => {
                    log::warn!("Error monitoring disabled: {e}");
                    None
                }
            }
        });

        let limiter = select_limiter(config).await;
        log::info!(
            "Rate limit: {} submissions per {} seconds ({} store)",
            config.rate_max_count,
            config.rate_window_seconds,
            limiter.kind()
        );

        Ok(ContactService::builder(limiter)
            .dispatcher(dispatcher)
            .verifier(verifier)
            .reporter(reporter)
            .allowed_origins(config.allowed_origins.clone())
            .build())
    }
}

/// Use the shared store when one is configured and answering, the local map otherwise.
async fn select_limiter(config: &Config) -> RateLimiter {
    let policy = config.policy();
    let Some(url) = config.shared_store_url.as_deref() else {
        return RateLimiter::local(policy);
    };

    #[cfg(feature = "redis")]
    match crate::backend::redis::RedisStore::connect(url, config.outbound_timeout).await {
        Ok(store) => return RateLimiter::with_store(Box::new(store.build()), policy),
        Err(e) => {
            log::warn!("Shared rate limit store unavailable: {e}, falling back to in-memory limiter")
        }
    }

    #[cfg(not(feature = "redis"))]
    {
        let _ = url;
        log::warn!("REDIS_URL is set but redis support is not compiled in, using in-memory limiter");
    }

    RateLimiter::local(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StoreKind;

    #[actix_web::test]
    async fn test_dev_mode() {
        let service = ContactService::from_config(&Config::default()).await.unwrap();
        assert!(service.dispatcher.is_none());
        assert!(service.verifier.is_none());
        assert!(service.reporter.is_none());
        assert_eq!(service.limiter.kind(), StoreKind::Local);
        assert_eq!(service.limiter.policy(), &Config::default().policy());
    }

    #[actix_web::test]
    async fn test_live_collaborators() {
        let config = Config {
            dispatcher_api_key: Some("SG.key".to_owned()),
            challenge_secret: Some("secret".to_owned()),
            error_monitoring_dsn: Some("https://key@sentry.example/1".to_owned()),
            ..Config::default()
        };
        let service = ContactService::from_config(&config).await.unwrap();
        assert!(service.dispatcher.is_some());
        assert!(service.verifier.is_some());
        assert!(service.reporter.is_some());
    }

    #[actix_web::test]
    async fn test_invalid_dsn_disables_reporting() {
        let config = Config {
            error_monitoring_dsn: Some("not a dsn".to_owned()),
            ..Config::default()
        };
        let service = ContactService::from_config(&config).await.unwrap();
        assert!(service.reporter.is_none());
    }

    #[actix_web::test]
    async fn test_unreachable_store_falls_back() {
        let config = Config {
            // Nothing listens on the discard port
            shared_store_url: Some("redis://127.0.0.1:9/".to_owned()),
            outbound_timeout: std::time::Duration::from_secs(1),
            ..Config::default()
        };
        let service = ContactService::from_config(&config).await.unwrap();
        assert_eq!(service.limiter.kind(), StoreKind::Local);
    }
}
