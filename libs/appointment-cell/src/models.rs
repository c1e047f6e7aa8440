// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CORE MODELS
// ==============================================================================

/// Public view of a row in the `users` table. The `provider` flag is
/// authoritative: it decides who may be booked and who may read a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub provider: bool,
}

/// An hour-aligned booking of a provider's time by a client.
///
/// Per provider, at most one non-cancelled appointment exists per distinct
/// hour-aligned `date`; the store enforces this with a partial unique index
/// on `(provider_id, date) WHERE cancelled_at IS NULL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub date: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}

/// Insert payload for a new appointment. `cancelled_at` starts NULL.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub date: DateTime<Utc>,
}

// ==============================================================================
// REQUEST TYPES
// ==============================================================================

/// Booking request body. Both fields arrive as strings and are validated in
/// the service so malformed input maps to a 400 rather than a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub provider_id: String,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct ListAppointmentsQuery {
    pub page: Option<i64>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("You can only create appointments with providers")]
    NotAProvider,

    #[error("Past dates are not permitted")]
    PastDate,

    #[error("Appointment slot is already taken")]
    SlotTaken,

    #[error("You do not have permission to cancel this appointment")]
    NotOwner,

    #[error("Appointment is already cancelled")]
    AlreadyCancelled,

    #[error("Appointments can only be cancelled up to two hours in advance")]
    TooLateToCancel,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound(e.to_string()),
            AppointmentError::NotAProvider | AppointmentError::NotOwner => {
                AppError::Auth(e.to_string())
            }
            AppointmentError::PastDate | AppointmentError::Validation(_) => {
                AppError::ValidationError(e.to_string())
            }
            AppointmentError::SlotTaken
            | AppointmentError::AlreadyCancelled
            | AppointmentError::TooLateToCancel => AppError::Conflict(e.to_string()),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}
