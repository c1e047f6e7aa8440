pub mod models;
pub mod services;

pub use models::{MailMessage, Notification, NotifyError};
pub use services::mail::{HttpMailClient, MailSink};
pub use services::notification::{NotificationSink, SupabaseNotificationSink};
