use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// Outbound channel for confirmation codes. Injected into the app state so
/// the core never touches mail transport configuration directly.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation_code(&self, email: &str, name: &str, code: &str) -> Result<()>;
}

/// Development notifier: writes the code to the log instead of mailing it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_confirmation_code(&self, email: &str, _name: &str, code: &str) -> Result<()> {
        info!("Confirmation code for {}: {}", email, code);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MailApiConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailBody<'a> {
    sender: MailAddress<'a>,
    to: Vec<MailAddress<'a>>,
    subject: &'a str,
    text_content: String,
}

/// Sends codes through a transactional-mail HTTP API (JSON body, `api-key`
/// header). Any non-2xx answer counts as a failed dispatch.
pub struct MailApiNotifier {
    client: reqwest::Client,
    config: MailApiConfig,
}

impl MailApiNotifier {
    pub fn new(config: MailApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for MailApiNotifier {
    async fn send_confirmation_code(&self, email: &str, name: &str, code: &str) -> Result<()> {
        let body = SendMailBody {
            sender: MailAddress {
                email: &self.config.sender_email,
                name: self.config.sender_name.as_deref(),
            },
            to: vec![MailAddress {
                email,
                name: Some(name),
            }],
            subject: "Your confirmation code",
            text_content: format!("Your confirmation code is: {code}"),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("mail API returned {}: {}", status, detail));
        }

        info!("Confirmation code mailed to {}", email);
        Ok(())
    }
}
