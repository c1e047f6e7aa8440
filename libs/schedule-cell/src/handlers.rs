// libs/schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::DailyScheduleQuery;
use crate::services::schedule::ScheduleService;

/// GET /?date=YYYY-MM-DD - the authenticated provider's bookings for a day.
#[axum::debug_handler]
pub async fn get_daily_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(params): Query<DailyScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let provider_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = ScheduleService::new(&state);
    let appointments = service
        .daily_schedule(provider_id, &params.date, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(appointments)))
}
