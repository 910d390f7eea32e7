use crate::contact::ContactMessage;
use crate::dispatch::{EmailDispatcher, Error, OutboundEmail};
use async_trait::async_trait;
use serde::Serialize;

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// [EmailDispatcher] backed by the SendGrid v3 `mail/send` API.
pub struct SendGridDispatcher {
    client: reqwest::Client,
    api_key: String,
    recipient: String,
    sender: Option<String>,
    endpoint: String,
}

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    reply_to: Address<'a>,
    content: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
    subject: &'a str,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

impl<'a> From<&'a OutboundEmail> for MailSend<'a> {
    fn from(email: &'a OutboundEmail) -> Self {
        Self {
            personalizations: [Personalization {
                to: [Address { email: &email.to }],
                subject: &email.subject,
            }],
            from: Address { email: &email.from },
            reply_to: Address {
                email: &email.reply_to,
            },
            content: [Content {
                kind: "text/plain",
                value: &email.text,
            }],
        }
    }
}

impl SendGridDispatcher {
    /// The `client` is expected to carry the outbound timeout.
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        recipient: impl Into<String>,
        sender: Option<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            recipient: recipient.into(),
            sender,
            endpoint: SENDGRID_ENDPOINT.to_owned(),
        }
    }

    /// Override the API endpoint, e.g. for a regional SendGrid host.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl EmailDispatcher for SendGridDispatcher {
    async fn send(&self, message: &ContactMessage) -> Result<(), Error> {
        let email = OutboundEmail::compose(message, &self.recipient, self.sender.as_deref());
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&MailSend::from(&email))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::ServerHandle;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};

    fn message() -> ContactMessage {
        ContactMessage {
            name: "Ada".to_owned(),
            email: "ada@example.com".to_owned(),
            subject: "Hi".to_owned(),
            message: "Hello".to_owned(),
        }
    }

    // Stand-in for the mail API: accepts only the bearer token "good-key".
    async fn mail_send(req: HttpRequest, body: web::Json<serde_json::Value>) -> HttpResponse {
        let authorized = req
            .headers()
            .get("authorization")
            .map_or(false, |value| value == "Bearer good-key");
        if !authorized {
            return HttpResponse::Unauthorized().body("bad api key");
        }
        if body["personalizations"][0]["to"][0]["email"] != "to@example.com" {
            return HttpResponse::BadRequest().body("wrong recipient");
        }
        HttpResponse::Accepted().finish()
    }

    fn start_mail_api() -> (String, ServerHandle) {
        let server = HttpServer::new(|| App::new().route("/v3/mail/send", web::post().to(mail_send)))
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
        let endpoint = format!("http://{}/v3/mail/send", server.addrs()[0]);
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (endpoint, handle)
    }

    #[test]
    fn test_request_body() {
        let email = OutboundEmail {
            to: "hello@noart.gallery".to_owned(),
            from: "ada@example.com".to_owned(),
            reply_to: "ada@example.com".to_owned(),
            subject: "Kontaktanfrage".to_owned(),
            text: "Name: Ada".to_owned(),
        };
        let body = serde_json::to_value(MailSend::from(&email)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "personalizations": [{
                    "to": [{"email": "hello@noart.gallery"}],
                    "subject": "Kontaktanfrage",
                }],
                "from": {"email": "ada@example.com"},
                "reply_to": {"email": "ada@example.com"},
                "content": [{"type": "text/plain", "value": "Name: Ada"}],
            })
        );
    }

    #[actix_web::test]
    async fn test_transport_error() {
        let dispatcher =
            SendGridDispatcher::new(reqwest::Client::new(), "key", "to@example.com", None)
                .endpoint("not a url");
        assert!(matches!(dispatcher.send(&message()).await, Err(Error::Http(_))));
    }

    #[actix_web::test]
    async fn test_accepted_and_rejected() {
        let (endpoint, handle) = start_mail_api();

        let dispatcher =
            SendGridDispatcher::new(reqwest::Client::new(), "good-key", "to@example.com", None)
                .endpoint(endpoint.clone());
        dispatcher.send(&message()).await.unwrap();

        let dispatcher =
            SendGridDispatcher::new(reqwest::Client::new(), "bad-key", "to@example.com", None)
                .endpoint(endpoint);
        match dispatcher.send(&message()).await {
            Err(Error::Rejected { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad api key");
            }
            other => panic!("expected a rejection, got {other:?}"),
        }

        handle.stop(true).await;
    }
}
