pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::ScheduleError;
pub use router::schedule_routes;
pub use services::schedule::ScheduleService;
