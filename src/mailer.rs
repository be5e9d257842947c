use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::MailConfig;

/// Outbound email transport. The service only ever needs fire-and-forget
/// plain-text messages; delivery failures surface as errors to the caller.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Mailer backed by an HTTP mail relay (JSON POST, bearer-authenticated).
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = OutboundMessage {
            from: &self.from,
            to,
            subject,
            text: body,
        };
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .context("mail relay request")?
            .error_for_status()
            .context("mail relay response")?;
        debug!(to = %to, subject = %subject, "email sent");
        Ok(())
    }
}
