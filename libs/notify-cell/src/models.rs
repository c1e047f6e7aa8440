use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A stored in-app notification row. Written once on booking; the
/// notification store owns it from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Outbound email handed to the mail provider. Template rendering happens
/// on the provider side; `context` travels with the request body.
#[derive(Debug, Clone, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub template: String,
    pub context: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification store error: {0}")]
    Store(String),

    #[error("Mail delivery error: {0}")]
    Mail(String),

    #[error("Mail channel not configured")]
    NotConfigured,
}
