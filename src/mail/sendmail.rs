// mail/sendmail.rs
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Email has no recipients")]
    NoRecipients,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Email API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Email failed for some recipients: {0}")]
    PartialFailure(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmailPayload {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

/// Client for the transactional email provider. Each send is a single POST;
/// failures are reported to the caller and never retried.
#[derive(Debug, Clone)]
pub struct Mailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    sender: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            sender: config.email_sender.clone(),
        }
    }

    pub fn request_body(&self, api_key: &str, payload: &EmailPayload) -> Value {
        json!({
            "api_key": api_key,
            "sender": self.sender,
            "to": payload.to,
            "subject": payload.subject,
            "html_body": payload.html_body,
        })
    }

    pub async fn send(&self, payload: &EmailPayload) -> Result<(), MailError> {
        if payload.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let api_key = match self.api_key.as_deref() {
            Some(key) => key,
            None => {
                tracing::warn!(
                    to = %payload.to.join(", "),
                    subject = %payload.subject,
                    "EMAIL_API_KEY is not set, email not sent"
                );
                tracing::debug!("Email body:\n{}", payload.html_body);
                return Ok(());
            }
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(&self.request_body(api_key, payload))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = body
                .pointer("/data/error")
                .or_else(|| body.get("error_message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(MailError::Api { status: status.as_u16(), message });
        }

        if let Some(failures) = body.pointer("/data/failures").and_then(Value::as_array) {
            if !failures.is_empty() {
                return Err(MailError::PartialFailure(Value::Array(failures.clone()).to_string()));
            }
        }

        tracing::info!("Email \"{}\" sent to {}", payload.subject, payload.to.join(", "));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer(api_key: Option<&str>) -> Mailer {
        Mailer {
            client: reqwest::Client::new(),
            api_url: "http://127.0.0.1:9/unreachable".to_string(),
            api_key: api_key.map(str::to_string),
            sender: "Help Desk <noreply@example.com>".to_string(),
        }
    }

    fn payload() -> EmailPayload {
        EmailPayload {
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            subject: "Ticket #7 created".to_string(),
            html_body: "<p>hello</p>".to_string(),
        }
    }

    #[test]
    fn request_body_carries_key_sender_and_recipients() {
        let body = mailer(Some("k-123")).request_body("k-123", &payload());
        assert_eq!(body["api_key"], "k-123");
        assert_eq!(body["sender"], "Help Desk <noreply@example.com>");
        assert_eq!(body["to"], json!(["a@example.com", "b@example.com"]));
        assert_eq!(body["subject"], "Ticket #7 created");
        assert_eq!(body["html_body"], "<p>hello</p>");
    }

    #[tokio::test]
    async fn missing_api_key_logs_instead_of_sending() {
        assert!(mailer(None).send(&payload()).await.is_ok());
    }

    #[tokio::test]
    async fn empty_recipient_list_is_rejected() {
        let mut p = payload();
        p.to.clear();
        assert!(matches!(mailer(None).send(&p).await, Err(MailError::NoRecipients)));
    }
}
