// libs/appointment-cell/src/services/policy.rs
//
// Pure timeslot predicates. No store access; callers fetch whatever rows the
// predicate needs and pass a single `now` captured at the start of the
// operation, so every rule here is testable in isolation.
use chrono::{DateTime, Duration, DurationRound, Utc};
use uuid::Uuid;

use crate::models::Appointment;

/// Cancellations must happen at least this many hours before the slot.
pub const CANCEL_CUTOFF_HOURS: i64 = 2;

/// Truncate a timestamp to the start of its hour. Slots are hour-aligned.
pub fn hour_start(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(Duration::hours(1)).unwrap_or(t)
}

/// True iff the hour-truncated candidate time is strictly after `now`.
pub fn is_future_slot(candidate: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    hour_start(candidate) > now
}

/// True iff no non-cancelled appointment for `provider_id` in `existing`
/// occupies the candidate's truncated hour.
pub fn is_slot_free(
    provider_id: Uuid,
    candidate: DateTime<Utc>,
    existing: &[Appointment],
) -> bool {
    let slot = hour_start(candidate);
    !existing.iter().any(|a| {
        a.provider_id == provider_id && !a.is_cancelled() && hour_start(a.date) == slot
    })
}

/// True iff the appointment may still be cancelled: exactly at the cutoff is
/// allowed, one second past it is not.
pub fn is_cancellable(appointment_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    appointment_date - Duration::hours(CANCEL_CUTOFF_HOURS) >= now
}
