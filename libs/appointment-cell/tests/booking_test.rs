use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, NewAppointment, PublicUser};
use appointment_cell::repository::{AppointmentRepository, UserRepository};
use appointment_cell::services::booking::{AppointmentService, PAGE_SIZE};
use notify_cell::{MailMessage, MailSink, Notification, NotificationSink, NotifyError};

const TOKEN: &str = "test-token";

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

// ==============================================================================
// IN-MEMORY FAKES
// ==============================================================================

struct InMemoryUserRepository {
    users: Vec<PublicUser>,
}

impl InMemoryUserRepository {
    fn new(users: Vec<PublicUser>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(
        &self,
        id: Uuid,
        _auth_token: &str,
    ) -> Result<Option<PublicUser>, AppointmentError> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_provider_by_id(
        &self,
        id: Uuid,
        _auth_token: &str,
    ) -> Result<Option<PublicUser>, AppointmentError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.id == id && u.provider)
            .cloned())
    }
}

#[derive(Default)]
struct InMemoryAppointmentRepository {
    rows: Mutex<Vec<Appointment>>,
}

impl InMemoryAppointmentRepository {
    fn with_rows(rows: Vec<Appointment>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    fn all(&self) -> Vec<Appointment> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn find_by_id(
        &self,
        id: Uuid,
        _auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.rows.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_provider_and_hour(
        &self,
        provider_id: Uuid,
        hour_start: DateTime<Utc>,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.provider_id == provider_id && a.cancelled_at.is_none() && a.date == hour_start
            })
            .cloned()
            .collect())
    }

    async fn find_by_client_paged(
        &self,
        client_id: Uuid,
        limit: i64,
        offset: i64,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut rows: Vec<Appointment> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.client_id == client_id && a.cancelled_at.is_none())
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.date);
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn find_by_provider_and_date_range(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut rows: Vec<Appointment> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.provider_id == provider_id
                    && a.cancelled_at.is_none()
                    && a.date >= from
                    && a.date < to
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.date);
        Ok(rows)
    }

    async fn insert(
        &self,
        appointment: NewAppointment,
        _auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.lock().unwrap();

        // Behaves like the partial unique index on (provider_id, date).
        let taken = rows.iter().any(|a| {
            a.provider_id == appointment.provider_id
                && a.cancelled_at.is_none()
                && a.date == appointment.date
        });
        if taken {
            return Err(AppointmentError::SlotTaken);
        }

        let row = Appointment {
            id: Uuid::new_v4(),
            client_id: appointment.client_id,
            provider_id: appointment.provider_id,
            date: appointment.date,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn set_cancelled(
        &self,
        id: Uuid,
        cancelled_at: DateTime<Utc>,
        _auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AppointmentError::NotFound)?;
        row.cancelled_at = Some(cancelled_at);
        row.updated_at = cancelled_at;
        Ok(row.clone())
    }
}

#[derive(Default)]
struct RecordingNotificationSink {
    created: Mutex<Vec<(String, Uuid)>>,
    fail: bool,
}

impl RecordingNotificationSink {
    fn failing() -> Self {
        Self {
            created: Mutex::new(vec![]),
            fail: true,
        }
    }

    fn contents(&self) -> Vec<(String, Uuid)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn create(
        &self,
        content: &str,
        target_user_id: Uuid,
        _auth_token: &str,
    ) -> Result<Notification, NotifyError> {
        if self.fail {
            return Err(NotifyError::Store("notification store is down".to_string()));
        }
        self.created
            .lock()
            .unwrap()
            .push((content.to_string(), target_user_id));
        Ok(Notification {
            id: Uuid::new_v4(),
            content: content.to_string(),
            user_id: target_user_id,
            read: false,
            created_at: Utc::now(),
        })
    }
}

#[derive(Default)]
struct RecordingMailSink {
    sent: Mutex<Vec<MailMessage>>,
    fail: bool,
}

impl RecordingMailSink {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail: true,
        }
    }

    fn messages(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSink for RecordingMailSink {
    async fn send(&self, message: MailMessage) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Mail("mail gateway is down".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

// ==============================================================================
// FIXTURE
// ==============================================================================

struct Fixture {
    client: PublicUser,
    provider: PublicUser,
    appointments: Arc<InMemoryAppointmentRepository>,
    notifications: Arc<RecordingNotificationSink>,
    mail: Arc<RecordingMailSink>,
    service: AppointmentService,
}

impl Fixture {
    fn new() -> Self {
        Self::build(
            Arc::new(InMemoryAppointmentRepository::default()),
            Arc::new(RecordingNotificationSink::default()),
            Arc::new(RecordingMailSink::default()),
        )
    }

    fn build(
        appointments: Arc<InMemoryAppointmentRepository>,
        notifications: Arc<RecordingNotificationSink>,
        mail: Arc<RecordingMailSink>,
    ) -> Self {
        let client = PublicUser {
            id: Uuid::new_v4(),
            name: "Carla Client".to_string(),
            email: "carla@example.com".to_string(),
            provider: false,
        };
        let provider = PublicUser {
            id: Uuid::new_v4(),
            name: "Pete Provider".to_string(),
            email: "pete@example.com".to_string(),
            provider: true,
        };

        let users = Arc::new(InMemoryUserRepository::new(vec![
            client.clone(),
            provider.clone(),
        ]));

        let service = AppointmentService::with_parts(
            users,
            Arc::clone(&appointments) as Arc<dyn AppointmentRepository>,
            Arc::clone(&notifications) as Arc<dyn NotificationSink>,
            Arc::clone(&mail) as Arc<dyn MailSink>,
        );

        Self {
            client,
            provider,
            appointments,
            notifications,
            mail,
            service,
        }
    }

    async fn book(
        &self,
        date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.service
            .create(
                self.client.id,
                &self.provider.id.to_string(),
                &date.to_rfc3339(),
                now,
                TOKEN,
            )
            .await
    }
}

// ==============================================================================
// CREATE
// ==============================================================================

#[tokio::test]
async fn create_truncates_to_hour_start_and_notifies_provider() {
    let fx = Fixture::new();
    let now = at(2024, 6, 1, 9, 0, 0);

    let appointment = fx.book(at(2024, 6, 10, 14, 30, 0), now).await.unwrap();

    assert_eq!(appointment.date, at(2024, 6, 10, 14, 0, 0));
    assert_eq!(appointment.client_id, fx.client.id);
    assert_eq!(appointment.provider_id, fx.provider.id);
    assert!(appointment.cancelled_at.is_none());

    let notes = fx.notifications.contents();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].1, fx.provider.id);
    assert!(notes[0].0.contains("Carla Client"));
}

#[tokio::test]
async fn create_rejects_same_truncated_hour_but_allows_next_hour() {
    let fx = Fixture::new();
    let now = at(2024, 6, 1, 9, 0, 0);

    fx.book(at(2024, 6, 10, 14, 0, 0), now).await.unwrap();

    // 14:30 shares the 14:00 slot
    let err = fx.book(at(2024, 6, 10, 14, 30, 0), now).await.unwrap_err();
    assert_matches!(err, AppointmentError::SlotTaken);

    // 15:00 is a different slot
    fx.book(at(2024, 6, 10, 15, 0, 0), now).await.unwrap();
}

#[tokio::test]
async fn create_rejects_past_dates_even_for_valid_providers() {
    let fx = Fixture::new();
    let now = at(2024, 6, 10, 14, 0, 0);

    let err = fx.book(at(2024, 6, 10, 13, 0, 0), now).await.unwrap_err();
    assert_matches!(err, AppointmentError::PastDate);

    // Same hour truncates to exactly `now`: still not in the future.
    let err = fx.book(at(2024, 6, 10, 14, 59, 0), now).await.unwrap_err();
    assert_matches!(err, AppointmentError::PastDate);
}

#[tokio::test]
async fn create_rejects_targets_that_are_not_providers() {
    let fx = Fixture::new();
    let now = at(2024, 6, 1, 9, 0, 0);

    // Another client is not bookable
    let err = fx
        .service
        .create(
            fx.provider.id,
            &fx.client.id.to_string(),
            &at(2024, 6, 10, 14, 0, 0).to_rfc3339(),
            now,
            TOKEN,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::NotAProvider);

    // Neither is an unknown id
    let err = fx
        .service
        .create(
            fx.client.id,
            &Uuid::new_v4().to_string(),
            &at(2024, 6, 10, 14, 0, 0).to_rfc3339(),
            now,
            TOKEN,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::NotAProvider);
}

#[tokio::test]
async fn create_validates_raw_input_before_touching_the_store() {
    let fx = Fixture::new();
    let now = at(2024, 6, 1, 9, 0, 0);

    let err = fx
        .service
        .create(fx.client.id, "not-a-uuid", "2024-06-10T14:00:00Z", now, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Validation(_));

    let err = fx
        .service
        .create(
            fx.client.id,
            &fx.provider.id.to_string(),
            "next tuesday",
            now,
            TOKEN,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Validation(_));

    assert!(fx.appointments.all().is_empty());
}

#[tokio::test]
async fn notification_failure_does_not_roll_back_the_booking() {
    let fx = Fixture::build(
        Arc::new(InMemoryAppointmentRepository::default()),
        Arc::new(RecordingNotificationSink::failing()),
        Arc::new(RecordingMailSink::default()),
    );
    let now = at(2024, 6, 1, 9, 0, 0);

    let appointment = fx.book(at(2024, 6, 10, 14, 0, 0), now).await.unwrap();

    let stored = fx.appointments.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, appointment.id);
}

// ==============================================================================
// LIST
// ==============================================================================

#[tokio::test]
async fn list_rejects_pages_below_one() {
    let fx = Fixture::new();

    let err = fx.service.list(fx.client.id, 0, TOKEN).await.unwrap_err();
    assert_matches!(err, AppointmentError::Validation(_));

    let err = fx.service.list(fx.client.id, -3, TOKEN).await.unwrap_err();
    assert_matches!(err, AppointmentError::Validation(_));
}

#[tokio::test]
async fn list_paginates_ascending_and_skips_cancelled() {
    let base = at(2024, 7, 1, 8, 0, 0);
    let client_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();

    // 45 bookings, one per hour, inserted newest-first; every third cancelled.
    let mut rows = Vec::new();
    for i in (0..45).rev() {
        let date = base + Duration::hours(i);
        rows.push(Appointment {
            id: Uuid::new_v4(),
            client_id,
            provider_id,
            date,
            cancelled_at: (i % 3 == 2).then(|| date - Duration::hours(4)),
            created_at: base,
            updated_at: base,
        });
    }
    let repo = Arc::new(InMemoryAppointmentRepository::with_rows(rows));

    let fx = Fixture::build(
        repo,
        Arc::new(RecordingNotificationSink::default()),
        Arc::new(RecordingMailSink::default()),
    );

    let page1 = fx.service.list(client_id, 1, TOKEN).await.unwrap();
    let page2 = fx.service.list(client_id, 2, TOKEN).await.unwrap();

    // 30 of 45 survive the cancellation filter
    assert_eq!(page1.len(), PAGE_SIZE as usize);
    assert_eq!(page2.len(), 10);

    assert!(page1.iter().all(|a| a.cancelled_at.is_none()));
    let mut all: Vec<_> = page1.iter().chain(page2.iter()).map(|a| a.date).collect();
    let sorted = {
        let mut s = all.clone();
        s.sort();
        s
    };
    assert_eq!(all, sorted);

    // Page 2 starts where page 1 stopped
    assert!(page2[0].date > page1[page1.len() - 1].date);
    all.dedup();
    assert_eq!(all.len(), 30);
}

// ==============================================================================
// CANCEL
// ==============================================================================

#[tokio::test]
async fn cancel_sets_cancelled_at_and_mails_the_provider() {
    let fx = Fixture::new();
    let booked_at = at(2024, 6, 1, 9, 0, 0);
    let appointment = fx.book(at(2024, 6, 10, 10, 0, 0), booked_at).await.unwrap();

    let now = at(2024, 6, 10, 7, 0, 0);
    let cancelled = fx
        .service
        .cancel(fx.client.id, appointment.id, now, TOKEN)
        .await
        .unwrap();

    assert_eq!(cancelled.cancelled_at, Some(now));

    let messages = fx.mail.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].to.contains("pete@example.com"));
    assert_eq!(messages[0].template, "cancellation");
    assert_eq!(messages[0].context["client"], "Carla Client");
}

#[tokio::test]
async fn cancel_boundary_is_exactly_two_hours() {
    let fx = Fixture::new();
    let booked_at = at(2024, 6, 1, 9, 0, 0);
    let slot = at(2024, 6, 10, 10, 0, 0);

    // One second inside the window: rejected
    let appointment = fx.book(slot, booked_at).await.unwrap();
    let err = fx
        .service
        .cancel(fx.client.id, appointment.id, at(2024, 6, 10, 8, 0, 1), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::TooLateToCancel);

    // Exactly two hours before: allowed
    fx.service
        .cancel(fx.client.id, appointment.id, at(2024, 6, 10, 8, 0, 0), TOKEN)
        .await
        .unwrap();
}

#[tokio::test]
async fn cancel_requires_ownership_regardless_of_timing() {
    let fx = Fixture::new();
    let appointment = fx
        .book(at(2024, 6, 10, 10, 0, 0), at(2024, 6, 1, 9, 0, 0))
        .await
        .unwrap();

    // Generous window, wrong requester (even the provider is refused)
    let err = fx
        .service
        .cancel(fx.provider.id, appointment.id, at(2024, 6, 1, 10, 0, 0), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::NotOwner);
}

#[tokio::test]
async fn cancel_unknown_appointment_is_not_found() {
    let fx = Fixture::new();

    let err = fx
        .service
        .cancel(fx.client.id, Uuid::new_v4(), at(2024, 6, 1, 9, 0, 0), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::NotFound);
}

#[tokio::test]
async fn cancel_is_terminal() {
    let fx = Fixture::new();
    let appointment = fx
        .book(at(2024, 6, 10, 10, 0, 0), at(2024, 6, 1, 9, 0, 0))
        .await
        .unwrap();

    let now = at(2024, 6, 1, 10, 0, 0);
    fx.service
        .cancel(fx.client.id, appointment.id, now, TOKEN)
        .await
        .unwrap();

    let err = fx
        .service
        .cancel(fx.client.id, appointment.id, now, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::AlreadyCancelled);
}

#[tokio::test]
async fn mail_failure_does_not_undo_the_cancellation() {
    let fx = Fixture::build(
        Arc::new(InMemoryAppointmentRepository::default()),
        Arc::new(RecordingNotificationSink::default()),
        Arc::new(RecordingMailSink::failing()),
    );
    let appointment = fx
        .book(at(2024, 6, 10, 10, 0, 0), at(2024, 6, 1, 9, 0, 0))
        .await
        .unwrap();

    let now = at(2024, 6, 1, 10, 0, 0);
    let cancelled = fx
        .service
        .cancel(fx.client.id, appointment.id, now, TOKEN)
        .await
        .unwrap();

    assert_eq!(cancelled.cancelled_at, Some(now));
    assert_eq!(fx.appointments.all()[0].cancelled_at, Some(now));
}

#[tokio::test]
async fn cancelled_slot_can_be_rebooked() {
    let fx = Fixture::new();
    let booked_at = at(2024, 6, 1, 9, 0, 0);
    let slot = at(2024, 6, 10, 10, 0, 0);

    let appointment = fx.book(slot, booked_at).await.unwrap();
    fx.service
        .cancel(fx.client.id, appointment.id, booked_at, TOKEN)
        .await
        .unwrap();

    // Soft-cancelled rows no longer block the slot
    fx.book(slot, booked_at).await.unwrap();
}
