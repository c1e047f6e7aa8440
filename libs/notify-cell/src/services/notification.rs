use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Notification, NotifyError};

/// Fire-and-forget sink for in-app notifications. Callers log failures and
/// move on; a lost notification never fails the operation that produced it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create(
        &self,
        content: &str,
        target_user_id: Uuid,
        auth_token: &str,
    ) -> Result<Notification, NotifyError>;
}

pub struct SupabaseNotificationSink {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseNotificationSink {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl NotificationSink for SupabaseNotificationSink {
    async fn create(
        &self,
        content: &str,
        target_user_id: Uuid,
        auth_token: &str,
    ) -> Result<Notification, NotifyError> {
        debug!("Storing notification for user {}", target_user_id);

        let body = json!({
            "content": content,
            "user_id": target_user_id,
            "read": false,
        });

        let inserted: Vec<Notification> = self
            .supabase
            .insert("/rest/v1/notifications", body, auth_token)
            .await
            .map_err(|e| NotifyError::Store(e.to_string()))?;

        inserted
            .into_iter()
            .next()
            .ok_or_else(|| NotifyError::Store("insert returned no row".to_string()))
    }
}
