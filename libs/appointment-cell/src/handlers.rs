// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateAppointmentRequest, ListAppointmentsQuery};
use crate::services::booking::AppointmentService;

fn caller_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

/// GET / - a client's upcoming appointments, paginated.
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(params): Query<ListAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let client_id = caller_id(&user)?;
    let page = params.page.unwrap_or(1);

    let service = AppointmentService::new(&state);
    let appointments = service
        .list(client_id, page, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(appointments)))
}

/// POST / - book a provider's slot for the authenticated client.
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let client_id = caller_id(&user)?;
    let now = Utc::now();

    let service = AppointmentService::new(&state);
    let appointment = service
        .create(client_id, &request.provider_id, &request.date, now, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// POST /{appointment_id}/cancel - soft-cancel an appointment the caller owns.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let requester_id = caller_id(&user)?;
    let now = Utc::now();

    let service = AppointmentService::new(&state);
    let appointment = service
        .cancel(requester_id, appointment_id, now, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
