pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use models::{
    Appointment, AppointmentError, CreateAppointmentRequest, NewAppointment, PublicUser,
};
pub use repository::{AppointmentRepository, UserRepository};
pub use router::appointment_routes;
pub use services::booking::AppointmentService;
pub use services::policy;
