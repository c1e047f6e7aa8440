use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{MailMessage, NotifyError};

/// Fire-and-forget sink for outbound email.
#[async_trait]
pub trait MailSink: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), NotifyError>;
}

/// Client for the transactional mail HTTP API.
/// POST {base_url}/messages with a bearer key.
pub struct HttpMailClient {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
    configured: bool,
}

impl HttpMailClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
            configured: config.is_mail_configured(),
        }
    }
}

#[async_trait]
impl MailSink for HttpMailClient {
    async fn send(&self, message: MailMessage) -> Result<(), NotifyError> {
        if !self.configured {
            warn!("Mail channel not configured, dropping message to {}", message.to);
            return Err(NotifyError::NotConfigured);
        }

        let url = format!("{}/messages", self.base_url);
        debug!("Sending mail via {}", url);

        let body = json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
            "template": message.template,
            "context": message.context,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Mail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Mail(format!("({}) {}", status, error_text)));
        }

        info!("Mail '{}' sent to {}", message.subject, message.to);
        Ok(())
    }
}
