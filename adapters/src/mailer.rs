//! Notification senders for activation emails.
//!
//! `HttpMailer` posts to a transactional email API (Brevo-style JSON body),
//! `LogNotifier` only writes the link to the log for local development, and
//! `RecordingNotifier` captures deliveries so tests can pick up the link.

use crate::errors::NotifyError;
use crate::NotificationSender;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

const ACTIVATION_SUBJECT: &str = "Activate your account";

fn activation_text(link: &str) -> String {
    format!(
        "Welcome!\n\nConfirm your email address to activate your account:\n\n{}\n\n\
         If you did not create an account you can ignore this message.",
        link
    )
}

fn activation_html(link: &str) -> String {
    format!(
        "<p>Welcome!</p><p>Confirm your email address to activate your account:</p>\
         <p><a href=\"{link}\">{link}</a></p>\
         <p>If you did not create an account you can ignore this message.</p>"
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    html_content: String,
    text_content: String,
}

/// Settings for [`HttpMailer`].
#[derive(Clone)]
pub struct HttpMailerConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpMailerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMailerConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Delivers activation emails through a JSON HTTP email API.
pub struct HttpMailer {
    client: reqwest::Client,
    config: HttpMailerConfig,
}

impl HttpMailer {
    pub fn new(config: HttpMailerConfig) -> Result<Self, NotifyError> {
        if config.api_url.trim().is_empty() {
            return Err(NotifyError::Config("MAIL_API_URL is required".to_string()));
        }
        if config.api_key.trim().is_empty() {
            return Err(NotifyError::Config("MAIL_API_KEY is required".to_string()));
        }
        if config.from_email.trim().is_empty() {
            return Err(NotifyError::Config("MAIL_FROM_EMAIL is required".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl NotificationSender for HttpMailer {
    async fn send_activation(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: self.config.from_email.clone(),
                name: self.config.from_name.clone(),
            },
            to: vec![EmailAddress {
                email: email.to_string(),
                name: None,
            }],
            subject: ACTIVATION_SUBJECT.to_string(),
            html_content: activation_html(link),
            text_content: activation_text(link),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::Delivery(format!(
                "email API returned {}: {}",
                status, detail
            )));
        }

        tracing::debug!("activation email accepted by provider");
        Ok(())
    }
}

/// Writes activation links to the log instead of sending mail.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send_activation(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        tracing::info!(%email, %link, "activation email (log delivery)");
        Ok(())
    }
}

/// A delivery captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentActivation {
    pub email: String,
    pub link: String,
}

/// Test double that remembers every delivery and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentActivation>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentActivation> {
        self.sent.lock().await.clone()
    }

    /// The most recent link delivered to `email`.
    pub async fn last_link_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|s| s.email == email)
            .map(|s| s.link.clone())
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send_activation(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("recording notifier set to fail".to_string()));
        }
        self.sent.lock().await.push(SentActivation {
            email: email.to_string(),
            link: link.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer_config() -> HttpMailerConfig {
        HttpMailerConfig {
            api_url: "https://mail.example.com/v3/smtp/email".to_string(),
            api_key: "key".to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: Some("Keygate".to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_http_mailer_requires_settings() {
        let mut config = mailer_config();
        config.api_key = String::new();
        assert!(matches!(HttpMailer::new(config), Err(NotifyError::Config(_))));
        assert!(HttpMailer::new(mailer_config()).is_ok());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = mailer_config();
        config.api_key = "super-secret-key".to_string();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret-key"));
    }

    #[test]
    fn test_email_body_shape() {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: "noreply@example.com".to_string(),
                name: None,
            },
            to: vec![EmailAddress {
                email: "a@b.com".to_string(),
                name: None,
            }],
            subject: ACTIVATION_SUBJECT.to_string(),
            html_content: activation_html("http://x/activate/t"),
            text_content: activation_text("http://x/activate/t"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"][0]["email"], "a@b.com");
        assert!(json["sender"].get("name").is_none());
        assert!(json["textContent"]
            .as_str()
            .unwrap()
            .contains("http://x/activate/t"));
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.send_activation("a@b.com", "link-1").await.unwrap();
        notifier.send_activation("a@b.com", "link-2").await.unwrap();
        assert_eq!(notifier.sent().await.len(), 2);
        assert_eq!(notifier.last_link_for("a@b.com").await.as_deref(), Some("link-2"));

        notifier.set_failing(true);
        assert!(notifier.send_activation("a@b.com", "link-3").await.is_err());
        assert_eq!(notifier.sent().await.len(), 2);
    }
}
