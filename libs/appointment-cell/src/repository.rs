// libs/appointment-cell/src/repository.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DbError, SupabaseClient};

use crate::models::{Appointment, AppointmentError, NewAppointment, PublicUser};

// ==============================================================================
// REPOSITORY INTERFACES
// ==============================================================================

/// Read access to the `users` table.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PublicUser>, AppointmentError>;

    /// Like `find_by_id` but only matches users with the provider flag set.
    async fn find_provider_by_id(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PublicUser>, AppointmentError>;
}

/// Access to the `appointments` table. All reads exclude cancelled rows.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Non-cancelled appointments for a provider at an exact hour-aligned time.
    async fn find_by_provider_and_hour(
        &self,
        provider_id: Uuid,
        hour_start: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// A client's non-cancelled appointments, ascending by date.
    async fn find_by_client_paged(
        &self,
        client_id: Uuid,
        limit: i64,
        offset: i64,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// A provider's non-cancelled appointments with `date` in `[from, to)`,
    /// ascending by date.
    async fn find_by_provider_and_date_range(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn insert(
        &self,
        appointment: NewAppointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError>;

    async fn set_cancelled(
        &self,
        id: Uuid,
        cancelled_at: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError>;
}

// ==============================================================================
// SUPABASE IMPLEMENTATIONS
// ==============================================================================

pub struct SupabaseUserRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseUserRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn find_one(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Option<PublicUser>, AppointmentError> {
        let rows: Vec<PublicUser> = self
            .supabase
            .select(path, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl UserRepository for SupabaseUserRepository {
    async fn find_by_id(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PublicUser>, AppointmentError> {
        let path = format!("/rest/v1/users?id=eq.{}&select=id,name,email,provider", id);
        self.find_one(&path, auth_token).await
    }

    async fn find_provider_by_id(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PublicUser>, AppointmentError> {
        let path = format!(
            "/rest/v1/users?id=eq.{}&provider=eq.true&select=id,name,email,provider",
            id
        );
        self.find_one(&path, auth_token).await
    }
}

pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn encode_ts(ts: DateTime<Utc>) -> String {
        // PostgREST wants timestamp filter values URL-encoded
        urlencoding::encode(&ts.to_rfc3339()).into_owned()
    }

    async fn select_rows(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.supabase
            .select(path, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn find_by_id(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.select_rows(&path, auth_token).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_provider_and_hour(
        &self,
        provider_id: Uuid,
        hour_start: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&cancelled_at=is.null&date=eq.{}",
            provider_id,
            Self::encode_ts(hour_start)
        );
        self.select_rows(&path, auth_token).await
    }

    async fn find_by_client_paged(
        &self,
        client_id: Uuid,
        limit: i64,
        offset: i64,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?client_id=eq.{}&cancelled_at=is.null&order=date.asc&limit={}&offset={}",
            client_id, limit, offset
        );
        self.select_rows(&path, auth_token).await
    }

    async fn find_by_provider_and_date_range(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&cancelled_at=is.null&date=gte.{}&date=lt.{}&order=date.asc",
            provider_id,
            Self::encode_ts(from),
            Self::encode_ts(to)
        );
        self.select_rows(&path, auth_token).await
    }

    async fn insert(
        &self,
        appointment: NewAppointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Inserting appointment for provider {} at {}",
            appointment.provider_id, appointment.date
        );

        let body = json!({
            "client_id": appointment.client_id,
            "provider_id": appointment.provider_id,
            "date": appointment.date.to_rfc3339(),
            "cancelled_at": null,
        });

        let rows: Vec<Appointment> = self
            .supabase
            .insert("/rest/v1/appointments", body, auth_token)
            .await
            .map_err(|e| match e {
                // The partial unique index on (provider_id, date) surfaces a
                // concurrent double-booking here as a 409.
                DbError::Conflict(_) => AppointmentError::SlotTaken,
                other => AppointmentError::Database(other.to_string()),
            })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("insert returned no row".to_string()))
    }

    async fn set_cancelled(
        &self,
        id: Uuid,
        cancelled_at: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let body = json!({ "cancelled_at": cancelled_at.to_rfc3339() });

        let rows: Vec<Appointment> = self
            .supabase
            .update(&path, body, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }
}
