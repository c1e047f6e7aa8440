// libs/schedule-cell/src/models.rs
use serde::Deserialize;
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Deserialize)]
pub struct DailyScheduleQuery {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("User is not a provider")]
    NotAProvider,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::NotAProvider => AppError::Auth(e.to_string()),
            ScheduleError::Validation(_) => AppError::ValidationError(e.to_string()),
            ScheduleError::Database(msg) => AppError::Database(msg),
        }
    }
}
