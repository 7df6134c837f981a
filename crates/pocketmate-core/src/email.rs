//! Email delivery
//!
//! The core renders plain-text subject/body pairs and hands them to a
//! `Notifier`. The production notifier posts to a Resend-compatible HTTP API;
//! tests use `MockNotifier` to capture what would have been sent.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Delivers a rendered message to an email address. May fail transiently;
/// callers retry via the scheduler's backoff policy.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

/// HTTP notifier for Resend-compatible email APIs
pub struct EmailClient {
    http_client: Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl EmailClient {
    pub fn new(api_url: &str, api_key: &str, from_address: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from_address: from_address.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// Requires `POCKETMATE_EMAIL_API_KEY`; `POCKETMATE_EMAIL_FROM` and
    /// `POCKETMATE_EMAIL_URL` have sensible defaults. Returns None when the
    /// key is absent, in which case email features are disabled.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("POCKETMATE_EMAIL_API_KEY").ok()?;
        let from_address = std::env::var("POCKETMATE_EMAIL_FROM")
            .unwrap_or_else(|_| "Pocket Mate <noreply@pocketmate.app>".to_string());
        let api_url = std::env::var("POCKETMATE_EMAIL_URL")
            .unwrap_or_else(|_| "https://api.resend.com/emails".to_string());
        Some(Self::new(&api_url, &api_key, &from_address))
    }
}

#[async_trait]
impl Notifier for EmailClient {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let payload = EmailPayload {
            from: &self.from_address,
            to: [to],
            subject,
            text: body,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Email(format!(
                "email API returned {}: {}",
                status, detail
            )));
        }

        debug!(to, subject, "email dispatched");
        Ok(())
    }
}

/// A message captured by `MockNotifier`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Test notifier that records messages instead of sending them
#[derive(Default)]
pub struct MockNotifier {
    sent: std::sync::Mutex<Vec<SentEmail>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail, to exercise retry paths
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::Email("mock notifier set to fail".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_notifier_records_and_fails() {
        let notifier = MockNotifier::new();
        notifier.send("a@b.c", "Hi", "Body").await.unwrap();
        assert_eq!(notifier.sent_count(), 1);
        assert_eq!(notifier.sent()[0].subject, "Hi");

        notifier.set_failing(true);
        assert!(notifier.send("a@b.c", "Hi", "Body").await.is_err());
        assert_eq!(notifier.sent_count(), 1);
    }
}
