pub mod mail;
pub mod notification;
