//! Transactional mail.
//!
//! [`MailSender`] is the seam the account flows send codes through.
//! [`BrevoMailer`] talks to Brevo's transactional email API.
//! See: <https://developers.brevo.com/reference/sendtransacemail>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::{ItineraError, Result};

/// Default base URL for the Brevo API.
pub const DEFAULT_BREVO_BASE_URL: &str = "https://api.brevo.com";

/// Outgoing mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailContent {
    pub subject: String,
    pub html: String,
}

/// Registration code mail.
pub fn verification_mail(otp: &str) -> MailContent {
    MailContent {
        subject: "Verify your email".to_string(),
        html: format!(
            "<p>Your verification code is <strong>{otp}</strong>.</p>\
             <p>It expires in 5 minutes.</p>"
        ),
    }
}

/// Password reset code mail.
pub fn password_reset_mail(otp: &str) -> MailContent {
    MailContent {
        subject: "Reset your password".to_string(),
        html: format!(
            "<p>Your password reset code is <strong>{otp}</strong>.</p>\
             <p>It expires in 5 minutes. If you did not ask for a reset, ignore this mail.</p>"
        ),
    }
}

/// Sender identity shown to recipients.
#[derive(Debug, Clone)]
pub struct Sender {
    pub name: String,
    pub email: String,
}

/// Client for Brevo's `smtp/email` endpoint.
#[derive(Clone)]
pub struct BrevoMailer {
    api_key: String,
    sender: Sender,
    http: Client,
    base_url: String,
}

impl BrevoMailer {
    pub fn new(api_key: impl Into<String>, sender: Sender) -> Result<Self> {
        Self::with_base_url(api_key, sender, DEFAULT_BREVO_BASE_URL)
    }

    /// Create a mailer with a custom base URL (for testing with wiremock).
    pub fn with_base_url(
        api_key: impl Into<String>,
        sender: Sender,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ItineraError::Configuration(format!("mail HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            sender,
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl MailSender for BrevoMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let url = format!("{}/v3/smtp/email", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&BrevoRequest {
                sender: BrevoAddress {
                    name: Some(&self.sender.name),
                    email: &self.sender.email,
                },
                to: vec![BrevoAddress {
                    name: None,
                    email: to,
                }],
                subject,
                html_content: html,
            })
            .send()
            .await
            .map_err(|e| ItineraError::Mail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ItineraError::Mail(format!("brevo returned {status}: {body}")));
        }

        debug!(to, subject, "mail sent");
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoRequest<'a> {
    sender: BrevoAddress<'a>,
    to: Vec<BrevoAddress<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

#[derive(Serialize)]
struct BrevoAddress<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    email: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_embed_the_code() {
        let mail = verification_mail("123456");
        assert!(mail.html.contains("123456"));
        assert!(!mail.subject.is_empty());

        let mail = password_reset_mail("654321");
        assert!(mail.html.contains("654321"));
        assert_ne!(mail.subject, verification_mail("1").subject);
    }
}
