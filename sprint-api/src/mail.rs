//! HTTP mail relay client

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use sprint_core::MailError;
use sprint_lifecycle::{Mail, MailSender};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// [`MailSender`] that posts each message as JSON to a relay endpoint.
pub struct HttpMailer {
    client: Client,
    url: String,
    token: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Unavailable {
                reason: format!("HTTP client setup failed: {}", e),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            token,
            from: from.into(),
        })
    }
}

#[async_trait]
impl MailSender for HttpMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        let message = RelayMessage {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.text,
            html: &mail.html,
        };

        let mut request = self.client.post(&self.url).json(&message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| MailError::Unavailable {
            reason: format!("HTTP request failed: {}", e),
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %mail.to, subject = %mail.subject, "Mail relayed");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MailError::SendFailed {
                to: mail.to,
                reason: format!("{}: {}", status, body),
            })
        }
    }
}

impl std::fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMailer")
            .field("url", &self.url)
            .field("from", &self.from)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
