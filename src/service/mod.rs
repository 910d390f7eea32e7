pub mod builder;
mod cors;

pub use cors::{CorsHeaders, CorsPolicy};

use crate::contact::ContactForm;
use crate::dispatch::EmailDispatcher;
use crate::error::{ContactError, Reply};
use crate::limiter::{client_key, RateLimiter};
use crate::monitor::{spawn_capture, ErrorReporter, Report};
use crate::verify::ChallengeVerifier;
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use builder::ContactServiceBuilder;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;

/// Largest request body accepted on `/contact`.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// The contact submission pipeline, shared by every request handler.
pub struct ContactService {
    limiter: RateLimiter,
    dispatcher: Option<Arc<dyn EmailDispatcher>>,
    verifier: Option<Arc<dyn ChallengeVerifier>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    cors: CorsPolicy,
}

/// How an accepted submission was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the email dispatcher.
    Relayed,
    /// No dispatcher configured, the message was only logged.
    Logged,
    /// The honeypot was filled in, the message was dropped.
    Discarded,
}

impl ContactService {
    /// # Arguments
    ///
    /// * `limiter`: The rate limiter every submission is counted against.
    pub fn builder(limiter: RateLimiter) -> ContactServiceBuilder {
        ContactServiceBuilder::new(limiter)
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Run a `POST /contact` request through the pipeline.
    pub async fn submit(
        &self,
        req: &HttpRequest,
        payload: web::Payload,
    ) -> Result<Outcome, ContactError> {
        let body = read_body(payload).await?;
        let form = ContactForm::from_body(&body)?;
        let message = form.validate()?;

        let status = self.limiter.check_and_increment(&client_key(req)).await;
        if status.decision.is_denied() {
            return Err(ContactError::RateLimited(status));
        }

        if form.is_trapped() {
            log::debug!("Honeypot filled in, discarding submission");
            return Ok(Outcome::Discarded);
        }

        if let Some(verifier) = &self.verifier {
            let token = form.challenge_token().ok_or(ContactError::MissingToken)?;
            if !verifier.verify(token).await? {
                return Err(ContactError::VerificationRejected);
            }
        }

        match &self.dispatcher {
            Some(dispatcher) => {
                dispatcher.send(&message).await?;
                Ok(Outcome::Relayed)
            }
            None => {
                log::info!("Contact payload (dev): {message:?}");
                Ok(Outcome::Logged)
            }
        }
    }

    fn reject(&self, error: ContactError) -> HttpResponse {
        match &error {
            ContactError::Validation(_)
            | ContactError::MissingToken
            | ContactError::VerificationRejected => log::debug!("Contact submission refused: {error}"),
            ContactError::RateLimited(_) | ContactError::MethodNotAllowed => {
                log::info!("Contact submission refused: {error}")
            }
            ContactError::Dispatch(_) | ContactError::Verification(_) => log::error!("{error}"),
            _ => log::error!("Contact API error: {error}"),
        }
        if error.is_reportable() {
            spawn_capture(self.reporter.clone(), Report::new("contact", &error));
        }
        error.error_response()
    }
}

async fn read_body(mut payload: web::Payload) -> Result<web::BytesMut, ContactError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(ContactError::Overflow(MAX_BODY_BYTES));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Handler for every method on `/contact`.
pub async fn contact(
    req: HttpRequest,
    payload: web::Payload,
    service: web::Data<ContactService>,
) -> HttpResponse {
    let headers = CorsHeaders::for_request(&service.cors, &req);

    let mut response = if req.method() == Method::OPTIONS {
        HttpResponse::NoContent().finish()
    } else if req.method() == Method::POST {
        match service.submit(&req, payload).await {
            Ok(_) => HttpResponse::Ok().json(Reply::ok()),
            Err(e) => service.reject(e),
        }
    } else {
        service.reject(ContactError::MethodNotAllowed)
    };

    headers.apply(response.headers_mut());
    response
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    rate_limit_backend: &'static str,
}

pub async fn health(service: web::Data<ContactService>) -> HttpResponse {
    HttpResponse::Ok().json(Health {
        status: "ok",
        rate_limit_backend: service.limiter.kind().as_str(),
    })
}

/// Mount `/contact` and `/health`; the [ContactService] must be registered as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/contact").to(contact))
        .service(web::resource("/health").route(web::get().to(health)));
}
