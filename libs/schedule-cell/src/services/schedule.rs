// libs/schedule-cell/src/services/schedule.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError};
use appointment_cell::repository::{
    AppointmentRepository, SupabaseAppointmentRepository, SupabaseUserRepository, UserRepository,
};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::ScheduleError;

/// Read-only view of a provider's bookings for one calendar day.
pub struct ScheduleService {
    users: Arc<dyn UserRepository>,
    appointments: Arc<dyn AppointmentRepository>,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            users: Arc::new(SupabaseUserRepository::new(Arc::clone(&supabase))),
            appointments: Arc::new(SupabaseAppointmentRepository::new(supabase)),
        }
    }

    pub fn with_parts(
        users: Arc<dyn UserRepository>,
        appointments: Arc<dyn AppointmentRepository>,
    ) -> Self {
        Self {
            users,
            appointments,
        }
    }

    /// The provider's non-cancelled appointments whose slot falls on the
    /// given day, ascending by date. Callers that are not registered
    /// providers are rejected.
    pub async fn daily_schedule(
        &self,
        provider_id: Uuid,
        raw_date: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        self.users
            .find_provider_by_id(provider_id, auth_token)
            .await
            .map_err(into_schedule_error)?
            .ok_or(ScheduleError::NotAProvider)?;

        let day = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            ScheduleError::Validation("date must be a valid YYYY-MM-DD day".to_string())
        })?;

        let start_of_day = day.and_time(NaiveTime::MIN).and_utc();
        let end_of_day = start_of_day + Duration::days(1);

        debug!(
            "Fetching schedule for provider {} on {}",
            provider_id, day
        );

        self.appointments
            .find_by_provider_and_date_range(provider_id, start_of_day, end_of_day, auth_token)
            .await
            .map_err(into_schedule_error)
    }
}

fn into_schedule_error(e: AppointmentError) -> ScheduleError {
    match e {
        AppointmentError::Database(msg) => ScheduleError::Database(msg),
        other => ScheduleError::Database(other.to_string()),
    }
}
