//! Outbound "your turn" notifications.
//!
//! Delivery is best-effort: every implementation reports success as a plain
//! `bool` and never returns an error, so a failed send cannot abort the
//! queue transition that triggered it.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &str, name: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct MailApiConfig {
    pub url: String,
    pub token: Option<String>,
    pub from: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct MailMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: String,
}

const CALL_SUBJECT: &str = "It's your turn - clinic queue";

/// Posts a JSON mail message to an HTTP mail relay.
pub struct MailApiNotifier {
    client: reqwest::Client,
    config: MailApiConfig,
}

impl MailApiNotifier {
    pub fn new(config: MailApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for MailApiNotifier {
    async fn send(&self, email: &str, name: &str) -> bool {
        let message = MailMessage {
            from: &self.config.from,
            to: email,
            subject: CALL_SUBJECT,
            html: call_message_html(name),
        };

        let mut request = self.client.post(&self.config.url).json(&message);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(to = email, "call notification sent");
                true
            }
            Ok(response) => {
                tracing::warn!(to = email, status = %response.status(), "mail relay rejected call notification");
                false
            }
            Err(err) => {
                tracing::warn!(to = email, error = %err, "call notification failed");
                false
            }
        }
    }
}

/// Used when no mail relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, email: &str, _name: &str) -> bool {
        tracing::info!(to = email, "notifications disabled; call notification skipped");
        false
    }
}

pub fn call_message_html(name: &str) -> String {
    format!(
        "<h1>Hello {}!</h1>\
         <p>It is your turn to be seen.</p>\
         <p>Please head to the consultation room.</p>\
         <p>Kind regards,<br>Medical team</p>",
        escape_html(name)
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_message_escapes_name() {
        let html = call_message_html("Ana <b>");
        assert!(html.contains("Hello Ana &lt;b&gt;!"));
        assert!(!html.contains("<b>"));
    }

    #[tokio::test]
    async fn disabled_notifier_reports_not_sent() {
        assert!(!DisabledNotifier.send("ana@example.com", "Ana").await);
    }

    #[tokio::test]
    async fn mail_api_notifier_reports_transport_failure() {
        let notifier = MailApiNotifier::new(MailApiConfig {
            // Port 9 (discard) is not listening on loopback in test environments.
            url: "http://127.0.0.1:9/send".to_string(),
            token: Some("token".to_string()),
            from: "no-reply@clinic.local".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        assert!(!notifier.send("ana@example.com", "Ana").await);
    }
}
