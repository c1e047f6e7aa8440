// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use notify_cell::{HttpMailClient, MailMessage, MailSink, NotificationSink, SupabaseNotificationSink};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{Appointment, AppointmentError, NewAppointment};
use crate::repository::{
    AppointmentRepository, SupabaseAppointmentRepository, SupabaseUserRepository, UserRepository,
};
use crate::services::policy;

pub const PAGE_SIZE: i64 = 20;

/// Orchestrates create/list/cancel for appointments. Stateless; built from
/// injected repositories and sinks so tests can substitute in-memory fakes.
pub struct AppointmentService {
    users: Arc<dyn UserRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    notifications: Arc<dyn NotificationSink>,
    mail: Arc<dyn MailSink>,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            users: Arc::new(SupabaseUserRepository::new(Arc::clone(&supabase))),
            appointments: Arc::new(SupabaseAppointmentRepository::new(Arc::clone(&supabase))),
            notifications: Arc::new(SupabaseNotificationSink::new(supabase)),
            mail: Arc::new(HttpMailClient::new(config)),
        }
    }

    pub fn with_parts(
        users: Arc<dyn UserRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        notifications: Arc<dyn NotificationSink>,
        mail: Arc<dyn MailSink>,
    ) -> Self {
        Self {
            users,
            appointments,
            notifications,
            mail,
        }
    }

    /// A client's upcoming appointments: non-cancelled only, ascending by
    /// date, twenty per page.
    pub async fn list(
        &self,
        client_id: Uuid,
        page: i64,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if page < 1 {
            return Err(AppointmentError::Validation(
                "page must be 1 or greater".to_string(),
            ));
        }

        let offset = (page - 1) * PAGE_SIZE;
        debug!("Listing appointments for client {} (page {})", client_id, page);

        self.appointments
            .find_by_client_paged(client_id, PAGE_SIZE, offset, auth_token)
            .await
    }

    /// Book an hour-aligned slot with a provider.
    pub async fn create(
        &self,
        client_id: Uuid,
        raw_provider_id: &str,
        raw_date: &str,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        // Step 1: validate raw input
        let provider_id = Uuid::parse_str(raw_provider_id).map_err(|_| {
            AppointmentError::Validation("provider_id must be a valid id".to_string())
        })?;
        let date = DateTime::parse_from_rfc3339(raw_date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| {
                AppointmentError::Validation("date must be a valid RFC 3339 timestamp".to_string())
            })?;

        // Step 2: slots are hour-aligned
        let hour_start = policy::hour_start(date);

        // Step 3: the target must be a registered provider
        self.users
            .find_provider_by_id(provider_id, auth_token)
            .await?
            .ok_or(AppointmentError::NotAProvider)?;

        // Step 4: no booking in the past
        if !policy::is_future_slot(hour_start, now) {
            return Err(AppointmentError::PastDate);
        }

        // Step 5: the slot must be free. This pre-check gives a friendly
        // error for the common case; the store's unique index is what rules
        // out the concurrent double-booking.
        let existing = self
            .appointments
            .find_by_provider_and_hour(provider_id, hour_start, auth_token)
            .await?;
        if !policy::is_slot_free(provider_id, hour_start, &existing) {
            return Err(AppointmentError::SlotTaken);
        }

        // Step 6: persist
        let appointment = self
            .appointments
            .insert(
                NewAppointment {
                    client_id,
                    provider_id,
                    date: hour_start,
                },
                auth_token,
            )
            .await?;

        // Step 7: notify the provider. Best effort; the booking stands even
        // if the notification is lost.
        self.notify_provider(&appointment, auth_token).await;

        info!(
            "Appointment {} booked with provider {} at {}",
            appointment.id, provider_id, hour_start
        );
        Ok(appointment)
    }

    /// Cancel an appointment. Only the booking client may cancel, and only
    /// up to two hours before the slot.
    pub async fn cancel(
        &self,
        requester_id: Uuid,
        appointment_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        let appointment = self
            .appointments
            .find_by_id(appointment_id, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.client_id != requester_id {
            return Err(AppointmentError::NotOwner);
        }

        if appointment.is_cancelled() {
            return Err(AppointmentError::AlreadyCancelled);
        }

        if !policy::is_cancellable(appointment.date, now) {
            return Err(AppointmentError::TooLateToCancel);
        }

        let cancelled = self
            .appointments
            .set_cancelled(appointment.id, now, auth_token)
            .await?;

        // Best-effort cancellation email to the provider.
        self.mail_provider_about_cancellation(&cancelled, auth_token)
            .await;

        info!("Appointment {} cancelled", cancelled.id);
        Ok(cancelled)
    }

    async fn notify_provider(&self, appointment: &Appointment, auth_token: &str) {
        let client_name = match self.users.find_by_id(appointment.client_id, auth_token).await {
            Ok(Some(client)) => client.name,
            Ok(None) => "a client".to_string(),
            Err(e) => {
                warn!("Skipping booking notification, client lookup failed: {}", e);
                return;
            }
        };

        let content = format!(
            "New appointment from {} on {}",
            client_name,
            format_slot(appointment.date)
        );

        if let Err(e) = self
            .notifications
            .create(&content, appointment.provider_id, auth_token)
            .await
        {
            warn!(
                "Failed to store booking notification for provider {}: {}",
                appointment.provider_id, e
            );
        }
    }

    async fn mail_provider_about_cancellation(&self, appointment: &Appointment, auth_token: &str) {
        let provider = match self
            .users
            .find_by_id(appointment.provider_id, auth_token)
            .await
        {
            Ok(Some(provider)) => provider,
            Ok(None) => {
                warn!(
                    "Skipping cancellation mail, provider {} not found",
                    appointment.provider_id
                );
                return;
            }
            Err(e) => {
                warn!("Skipping cancellation mail, provider lookup failed: {}", e);
                return;
            }
        };

        let client_name = match self.users.find_by_id(appointment.client_id, auth_token).await {
            Ok(Some(client)) => client.name,
            _ => "a client".to_string(),
        };

        let message = MailMessage {
            to: format!("{} <{}>", provider.name, provider.email),
            subject: "Appointment cancelled".to_string(),
            template: "cancellation".to_string(),
            context: json!({
                "provider": provider.name,
                "client": client_name,
                "date": format_slot(appointment.date),
            }),
        };

        if let Err(e) = self.mail.send(message).await {
            warn!(
                "Failed to send cancellation mail for appointment {}: {}",
                appointment.id, e
            );
        }
    }
}

/// Human-readable slot time used in notifications and mail.
fn format_slot(date: DateTime<Utc>) -> String {
    date.format("%B %-d at %H:%M").to_string()
}
